use crate::catalog;
use crate::error::{is_unique_violation, EngineError, EngineResult};
use crate::model::{
    date_column, is_valid_session_label, now_timestamp, optional_date_column, parse_date, Student,
    StudentStatus,
};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

pub const STUDENT_COLUMNS: &str = "id, registration_no, roll_no, name, status, class_id, section_id, session, joining_date, leaving_date";

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub registration_no: String,
    pub roll_no: String,
    pub name: String,
    pub class_id: String,
    pub section_id: Option<String>,
    pub session: String,
    pub joining_date: String,
}

pub fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    let status: String = r.get(4)?;
    Ok(Student {
        id: r.get(0)?,
        registration_no: r.get(1)?,
        roll_no: r.get(2)?,
        name: r.get(3)?,
        status: StudentStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("unknown student status {}", status).into(),
            )
        })?,
        class_id: r.get(5)?,
        section_id: r.get(6)?,
        session: r.get(7)?,
        joining_date: date_column(r, 8)?,
        leaving_date: optional_date_column(r, 9)?,
    })
}

pub fn create_student(conn: &Connection, new: NewStudent) -> EngineResult<Student> {
    let registration_no = new.registration_no.trim().to_string();
    let roll_no = new.roll_no.trim().to_string();
    let name = new.name.trim().to_string();
    if registration_no.is_empty() || roll_no.is_empty() || name.is_empty() {
        return Err(EngineError::InvalidRequest(
            "registrationNo/rollNo/name must not be empty".into(),
        ));
    }
    let session = new.session.trim().to_string();
    if !is_valid_session_label(&session) {
        return Err(EngineError::InvalidSession(session));
    }
    let joining_date = parse_date(&new.joining_date)
        .ok_or_else(|| EngineError::InvalidDate(new.joining_date.clone()))?;

    catalog::get_class(conn, &new.class_id)?;
    if let Some(section_id) = new.section_id.as_deref() {
        let section = catalog::get_section(conn, section_id)?;
        if section.class_id != new.class_id {
            return Err(EngineError::InvalidTarget(format!(
                "section {} does not belong to class {}",
                section_id, new.class_id
            )));
        }
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(
           id,
           registration_no,
           roll_no,
           name,
           status,
           class_id,
           section_id,
           session,
           joining_date,
           leaving_date,
           updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?)",
        (
            &id,
            &registration_no,
            &roll_no,
            &name,
            StudentStatus::Active.as_str(),
            &new.class_id,
            new.section_id.as_deref(),
            &session,
            joining_date.to_string(),
            now_timestamp(),
        ),
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            EngineError::Duplicate {
                entity: "student",
                key: format!("registrationNo={} rollNo={}", registration_no, roll_no),
            }
        } else {
            e.into()
        }
    })?;
    info!(student_id = %id, class_id = %new.class_id, "student enrolled");

    Ok(Student {
        id,
        registration_no,
        roll_no,
        name,
        status: StudentStatus::Active,
        class_id: new.class_id,
        section_id: new.section_id,
        session,
        joining_date,
        leaving_date: None,
    })
}

pub fn find_student(conn: &Connection, student_id: &str) -> EngineResult<Option<Student>> {
    let sql = format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS);
    let student = conn
        .query_row(&sql, [student_id], student_from_row)
        .optional()?;
    Ok(student)
}

pub fn get_student(conn: &Connection, student_id: &str) -> EngineResult<Student> {
    find_student(conn, student_id)?.ok_or_else(|| EngineError::not_found("student", student_id))
}

/// ACTIVE students of a class, optionally narrowed to one section.
pub fn list_active_students(
    conn: &Connection,
    class_id: &str,
    section_id: Option<&str>,
) -> EngineResult<Vec<Student>> {
    let sql = format!(
        "SELECT {}
         FROM students
         WHERE class_id = ?1 AND status = 'ACTIVE' AND (?2 IS NULL OR section_id = ?2)
         ORDER BY roll_no, id",
        STUDENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map((class_id, section_id), student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn new_student(class_id: &str, section_id: Option<&str>, reg: &str) -> NewStudent {
        NewStudent {
            registration_no: reg.to_string(),
            roll_no: format!("R-{}", reg),
            name: format!("Student {}", reg),
            class_id: class_id.to_string(),
            section_id: section_id.map(|s| s.to_string()),
            session: "2024-2025".to_string(),
            joining_date: "2024-04-01".to_string(),
        }
    }

    #[test]
    fn registration_and_roll_numbers_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let conn = db::open_db(dir.path()).unwrap();
        catalog::create_program(&conn, "Primary").unwrap();
        let class = catalog::create_class(&conn, "Grade 1", "Primary").unwrap();

        create_student(&conn, new_student(&class.id, None, "001")).unwrap();
        let e = create_student(&conn, new_student(&class.id, None, "001")).unwrap_err();
        assert_eq!(e.code(), "duplicate");
    }

    #[test]
    fn unreadable_dates_fail_instead_of_defaulting() {
        let dir = tempfile::tempdir().unwrap();
        let conn = db::open_db(dir.path()).unwrap();
        catalog::create_program(&conn, "Primary").unwrap();
        let class = catalog::create_class(&conn, "Grade 1", "Primary").unwrap();
        let st = create_student(&conn, new_student(&class.id, None, "001")).unwrap();

        conn.execute(
            "UPDATE students SET leaving_date = 'last spring' WHERE id = ?",
            [&st.id],
        )
        .unwrap();
        assert!(matches!(get_student(&conn, &st.id), Err(EngineError::Db(_))));
    }

    #[test]
    fn section_must_belong_to_class() {
        let dir = tempfile::tempdir().unwrap();
        let conn = db::open_db(dir.path()).unwrap();
        catalog::create_program(&conn, "Primary").unwrap();
        let g1 = catalog::create_class(&conn, "Grade 1", "Primary").unwrap();
        let g2 = catalog::create_class(&conn, "Grade 2", "Primary").unwrap();
        let a2 = catalog::create_section(&conn, &g2.id, "A").unwrap();

        let e = create_student(&conn, new_student(&g1.id, Some(&a2.id), "001")).unwrap_err();
        assert_eq!(e.code(), "invalid_target");
    }

    #[test]
    fn list_active_filters_by_section() {
        let dir = tempfile::tempdir().unwrap();
        let conn = db::open_db(dir.path()).unwrap();
        catalog::create_program(&conn, "Primary").unwrap();
        let class = catalog::create_class(&conn, "Grade 1", "Primary").unwrap();
        let a = catalog::create_section(&conn, &class.id, "A").unwrap();
        let b = catalog::create_section(&conn, &class.id, "B").unwrap();
        create_student(&conn, new_student(&class.id, Some(&a.id), "001")).unwrap();
        create_student(&conn, new_student(&class.id, Some(&b.id), "002")).unwrap();
        create_student(&conn, new_student(&class.id, Some(&b.id), "003")).unwrap();

        assert_eq!(list_active_students(&conn, &class.id, None).unwrap().len(), 3);
        assert_eq!(
            list_active_students(&conn, &class.id, Some(&b.id)).unwrap().len(),
            2
        );
    }
}
