use crate::error::{is_unique_violation, EngineError, EngineResult};
use crate::model::{
    date_column, now_timestamp, optional_date_column, parse_date, Employee, EmployeeStatus,
};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

const EMPLOYEE_COLUMNS: &str =
    "id, registration_no, name, designation, status, joining_date, leaving_date";

#[derive(Debug, Clone)]
pub struct NewEmployee {
    pub registration_no: String,
    pub name: String,
    pub designation: Option<String>,
    pub joining_date: String,
}

fn employee_from_row(r: &Row<'_>) -> rusqlite::Result<Employee> {
    let status: String = r.get(4)?;
    Ok(Employee {
        id: r.get(0)?,
        registration_no: r.get(1)?,
        name: r.get(2)?,
        designation: r.get(3)?,
        status: EmployeeStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("unknown employee status {}", status).into(),
            )
        })?,
        joining_date: date_column(r, 5)?,
        leaving_date: optional_date_column(r, 6)?,
    })
}

pub fn create_employee(conn: &Connection, new: NewEmployee) -> EngineResult<Employee> {
    let registration_no = new.registration_no.trim().to_string();
    let name = new.name.trim().to_string();
    if registration_no.is_empty() || name.is_empty() {
        return Err(EngineError::InvalidRequest(
            "registrationNo/name must not be empty".into(),
        ));
    }
    let designation = new
        .designation
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let joining_date = parse_date(&new.joining_date)
        .ok_or_else(|| EngineError::InvalidDate(new.joining_date.clone()))?;

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO employees(
           id,
           registration_no,
           name,
           designation,
           status,
           joining_date,
           leaving_date,
           updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, NULL, ?)",
        (
            &id,
            &registration_no,
            &name,
            designation.as_deref(),
            EmployeeStatus::Active.as_str(),
            joining_date.to_string(),
            now_timestamp(),
        ),
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            EngineError::Duplicate {
                entity: "employee",
                key: registration_no.clone(),
            }
        } else {
            e.into()
        }
    })?;
    info!(employee_id = %id, "employee created");

    Ok(Employee {
        id,
        registration_no,
        name,
        designation,
        status: EmployeeStatus::Active,
        joining_date,
        leaving_date: None,
    })
}

pub fn get_employee(conn: &Connection, employee_id: &str) -> EngineResult<Employee> {
    let sql = format!("SELECT {} FROM employees WHERE id = ?", EMPLOYEE_COLUMNS);
    conn.query_row(&sql, [employee_id], employee_from_row)
        .optional()?
        .ok_or_else(|| EngineError::not_found("employee", employee_id))
}

pub fn list_employees(
    conn: &Connection,
    status: Option<EmployeeStatus>,
) -> EngineResult<Vec<Employee>> {
    let sql = format!(
        "SELECT {}
         FROM employees
         WHERE (?1 IS NULL OR status = ?1)
         ORDER BY registration_no",
        EMPLOYEE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([status.map(|s| s.as_str())], employee_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn create_and_filter_by_status() {
        let dir = tempfile::tempdir().unwrap();
        let conn = db::open_db(dir.path()).unwrap();
        let e = create_employee(
            &conn,
            NewEmployee {
                registration_no: "EMP-1".into(),
                name: "A. Teacher".into(),
                designation: Some("  ".into()),
                joining_date: "2020-08-01".into(),
            },
        )
        .unwrap();
        assert_eq!(e.status, EmployeeStatus::Active);
        assert_eq!(e.designation, None);

        assert_eq!(list_employees(&conn, Some(EmployeeStatus::Active)).unwrap().len(), 1);
        assert!(list_employees(&conn, Some(EmployeeStatus::Retired)).unwrap().is_empty());
        assert_eq!(get_employee(&conn, "missing").unwrap_err().code(), "not_found");
    }
}
