//! Lifecycle transitions for students and employees.
//!
//! Students: ACTIVE -> GRADUATED | DROPPED, no way back.
//! Employees: ACTIVE -> RESIGNED | TERMINATED | RETIRED, and rejoin back to
//! ACTIVE. Every transition appends one `StatusChangeRecord`; nothing is ever
//! removed from history.

use crate::db;
use crate::employees;
use crate::error::{EngineError, EngineResult};
use crate::model::{
    date_column, now_timestamp, parse_date, EmployeeStatus, EntityType, StatusChangeRecord,
    StudentStatus,
};
use crate::setup::StatusSettings;
use crate::students;
use chrono::NaiveDate;
use rusqlite::{Connection, Row};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StudentStatusChange {
    pub student_id: String,
    pub to_status: StudentStatus,
    pub reason: String,
    /// `YYYY-MM-DD`; never defaulted so back-dated actions stay explicit.
    pub effective_date: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EmployeeStatusChange {
    pub employee_id: String,
    pub to_status: EmployeeStatus,
    pub reason: String,
    pub effective_date: Option<String>,
}

fn parse_effective_date(raw: Option<&str>, joining_date: NaiveDate) -> EngineResult<NaiveDate> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty());
    let Some(raw) = raw else {
        return Err(EngineError::MissingEffectiveDate);
    };
    let date = parse_date(raw).ok_or_else(|| EngineError::InvalidDate(raw.to_string()))?;
    if date < joining_date {
        return Err(EngineError::InvalidDate(format!(
            "effectiveDate {} precedes joining date {}",
            date, joining_date
        )));
    }
    Ok(date)
}

fn append_record(
    conn: &Connection,
    entity_id: &str,
    entity_type: EntityType,
    from: &str,
    to: &str,
    effective_date: NaiveDate,
    reason: &str,
) -> EngineResult<StatusChangeRecord> {
    let record = StatusChangeRecord {
        id: Uuid::new_v4().to_string(),
        entity_id: entity_id.to_string(),
        entity_type,
        from_status: from.to_string(),
        to_status: to.to_string(),
        effective_date,
        reason: reason.to_string(),
        created_at: now_timestamp(),
    };
    conn.execute(
        "INSERT INTO status_changes(
           id,
           entity_id,
           entity_type,
           from_status,
           to_status,
           effective_date,
           reason,
           created_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &record.id,
            &record.entity_id,
            entity_type.as_str(),
            &record.from_status,
            &record.to_status,
            effective_date.to_string(),
            &record.reason,
            &record.created_at,
        ),
    )?;
    Ok(record)
}

fn guard_changed(changed: usize, entity: &str, id: &str) -> EngineResult<()> {
    if changed != 1 {
        return Err(EngineError::Conflict(format!(
            "{} {} changed while its status was being updated",
            entity, id
        )));
    }
    Ok(())
}

pub fn change_student_status(
    conn: &Connection,
    req: &StudentStatusChange,
) -> EngineResult<StatusChangeRecord> {
    let tx = db::begin_immediate(conn)?;
    let student = students::get_student(&tx, &req.student_id)?;
    let effective_date = parse_effective_date(req.effective_date.as_deref(), student.joining_date)?;

    if !req.to_status.is_terminal() || student.status != StudentStatus::Active {
        warn!(
            student_id = %student.id,
            from = student.status.as_str(),
            to = req.to_status.as_str(),
            "student transition rejected"
        );
        return Err(EngineError::InvalidTransition {
            from: student.status.as_str().to_string(),
            to: req.to_status.as_str().to_string(),
        });
    }

    let changed = tx.execute(
        "UPDATE students
         SET status = ?, leaving_date = ?, updated_at = ?
         WHERE id = ? AND status = 'ACTIVE'",
        (
            req.to_status.as_str(),
            effective_date.to_string(),
            now_timestamp(),
            &student.id,
        ),
    )?;
    guard_changed(changed, "student", &student.id)?;
    let record = append_record(
        &tx,
        &student.id,
        EntityType::Student,
        student.status.as_str(),
        req.to_status.as_str(),
        effective_date,
        req.reason.trim(),
    )?;
    tx.commit()?;

    info!(
        student_id = %student.id,
        to = req.to_status.as_str(),
        %effective_date,
        "student status changed"
    );
    Ok(record)
}

pub fn change_employee_status(
    conn: &Connection,
    settings: &StatusSettings,
    req: &EmployeeStatusChange,
) -> EngineResult<StatusChangeRecord> {
    let tx = db::begin_immediate(conn)?;
    let employee = employees::get_employee(&tx, &req.employee_id)?;
    let effective_date =
        parse_effective_date(req.effective_date.as_deref(), employee.joining_date)?;

    let rejoin = req.to_status == EmployeeStatus::Active;
    let allowed = if rejoin {
        employee.status.is_terminal()
    } else {
        employee.status == EmployeeStatus::Active
    };
    if !allowed {
        warn!(
            employee_id = %employee.id,
            from = employee.status.as_str(),
            to = req.to_status.as_str(),
            "employee transition rejected"
        );
        return Err(EngineError::InvalidTransition {
            from: employee.status.as_str().to_string(),
            to: req.to_status.as_str().to_string(),
        });
    }
    if let Some(left) = employee.leaving_date.filter(|left| rejoin && effective_date < *left) {
        return Err(EngineError::InvalidDate(format!(
            "rejoin date {} precedes leaving date {}",
            effective_date, left
        )));
    }

    let reason = match req.reason.trim() {
        "" if rejoin => settings.default_rejoin_reason.clone(),
        r => r.to_string(),
    };
    let leaving_date = if rejoin {
        None
    } else {
        Some(effective_date.to_string())
    };

    let changed = tx.execute(
        "UPDATE employees
         SET status = ?, leaving_date = ?, updated_at = ?
         WHERE id = ? AND status = ?",
        (
            req.to_status.as_str(),
            leaving_date,
            now_timestamp(),
            &employee.id,
            employee.status.as_str(),
        ),
    )?;
    guard_changed(changed, "employee", &employee.id)?;
    let record = append_record(
        &tx,
        &employee.id,
        EntityType::Employee,
        employee.status.as_str(),
        req.to_status.as_str(),
        effective_date,
        &reason,
    )?;
    tx.commit()?;

    info!(
        employee_id = %employee.id,
        from = employee.status.as_str(),
        to = req.to_status.as_str(),
        rejoin,
        "employee status changed"
    );
    Ok(record)
}

fn record_from_row(r: &Row<'_>) -> rusqlite::Result<StatusChangeRecord> {
    let entity_type: String = r.get(2)?;
    Ok(StatusChangeRecord {
        id: r.get(0)?,
        entity_id: r.get(1)?,
        entity_type: EntityType::parse(&entity_type).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown entity type {}", entity_type).into(),
            )
        })?,
        from_status: r.get(3)?,
        to_status: r.get(4)?,
        effective_date: date_column(r, 5)?,
        reason: r.get(6)?,
        created_at: r.get(7)?,
    })
}

/// Status changes of one entity, oldest first.
pub fn status_history(
    conn: &Connection,
    entity_id: &str,
    entity_type: EntityType,
) -> EngineResult<Vec<StatusChangeRecord>> {
    match entity_type {
        EntityType::Student => {
            students::get_student(conn, entity_id)?;
        }
        EntityType::Employee => {
            employees::get_employee(conn, entity_id)?;
        }
    }
    let mut stmt = conn.prepare(
        "SELECT id, entity_id, entity_type, from_status, to_status, effective_date, reason, created_at
         FROM status_changes
         WHERE entity_type = ? AND entity_id = ?
         ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map((entity_type.as_str(), entity_id), record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
