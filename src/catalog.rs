//! Programs, classes, sections and sessions.
//!
//! Leaf data owned by configuration collaborators; the engines only read it.
//! Section occupancy is never stored here, see `query`.

use crate::db;
use crate::error::{is_unique_violation, EngineError, EngineResult};
use crate::model::{is_valid_session_label, Class, Program, Section, Session};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

fn non_empty(field: &str, value: &str) -> EngineResult<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(EngineError::InvalidRequest(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(v.to_string())
}

pub fn create_program(conn: &Connection, name: &str) -> EngineResult<Program> {
    let name = non_empty("name", name)?;
    let id = Uuid::new_v4().to_string();
    conn.execute("INSERT INTO programs(id, name) VALUES(?, ?)", (&id, &name))
        .map_err(|e| {
            if is_unique_violation(&e) {
                EngineError::Duplicate {
                    entity: "program",
                    key: name.clone(),
                }
            } else {
                e.into()
            }
        })?;
    Ok(Program { id, name })
}

pub fn list_programs(conn: &Connection) -> EngineResult<Vec<Program>> {
    let mut stmt = conn.prepare("SELECT id, name FROM programs ORDER BY name")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Program {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn require_program(conn: &Connection, program: &str) -> EngineResult<()> {
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM programs WHERE name = ?", [program], |r| {
            r.get(0)
        })
        .optional()?;
    if exists.is_none() {
        return Err(EngineError::not_found("program", program));
    }
    Ok(())
}

fn class_from_row(r: &Row<'_>) -> rusqlite::Result<Class> {
    Ok(Class {
        id: r.get(0)?,
        name: r.get(1)?,
        program: r.get(2)?,
    })
}

pub fn create_class(conn: &Connection, name: &str, program: &str) -> EngineResult<Class> {
    let name = non_empty("name", name)?;
    let program = non_empty("program", program)?;
    require_program(conn, &program)?;

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO classes(id, name, program) VALUES(?, ?, ?)",
        (&id, &name, &program),
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            EngineError::Duplicate {
                entity: "class",
                key: format!("{}/{}", program, name),
            }
        } else {
            e.into()
        }
    })?;
    info!(class_id = %id, %name, %program, "class created");
    Ok(Class { id, name, program })
}

pub fn find_class(conn: &Connection, class_id: &str) -> EngineResult<Option<Class>> {
    let class = conn
        .query_row(
            "SELECT id, name, program FROM classes WHERE id = ?",
            [class_id],
            class_from_row,
        )
        .optional()?;
    Ok(class)
}

pub fn get_class(conn: &Connection, class_id: &str) -> EngineResult<Class> {
    find_class(conn, class_id)?.ok_or_else(|| EngineError::not_found("class", class_id))
}

pub fn list_classes(conn: &Connection, program: Option<&str>) -> EngineResult<Vec<Class>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, program
         FROM classes
         WHERE (?1 IS NULL OR program = ?1)
         ORDER BY program, name",
    )?;
    let rows = stmt
        .query_map([program], class_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn section_from_row(r: &Row<'_>) -> rusqlite::Result<Section> {
    Ok(Section {
        id: r.get(0)?,
        class_id: r.get(1)?,
        name: r.get(2)?,
        sort_order: r.get(3)?,
    })
}

pub fn create_section(conn: &Connection, class_id: &str, name: &str) -> EngineResult<Section> {
    let name = non_empty("name", name)?;
    get_class(conn, class_id)?;

    let sort_order: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM sections WHERE class_id = ?",
        [class_id],
        |r| r.get(0),
    )?;
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO sections(id, class_id, name, sort_order) VALUES(?, ?, ?, ?)",
        (&id, class_id, &name, sort_order),
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            EngineError::Duplicate {
                entity: "section",
                key: name.clone(),
            }
        } else {
            e.into()
        }
    })?;
    Ok(Section {
        id,
        class_id: class_id.to_string(),
        name,
        sort_order,
    })
}

pub fn get_section(conn: &Connection, section_id: &str) -> EngineResult<Section> {
    conn.query_row(
        "SELECT id, class_id, name, sort_order FROM sections WHERE id = ?",
        [section_id],
        section_from_row,
    )
    .optional()?
    .ok_or_else(|| EngineError::not_found("section", section_id))
}

pub fn list_sections(conn: &Connection, class_id: &str) -> EngineResult<Vec<Section>> {
    let mut stmt = conn.prepare(
        "SELECT id, class_id, name, sort_order
         FROM sections
         WHERE class_id = ?
         ORDER BY sort_order",
    )?;
    let rows = stmt
        .query_map([class_id], section_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn section_count(conn: &Connection, class_id: &str) -> EngineResult<i64> {
    let n = conn.query_row(
        "SELECT COUNT(*) FROM sections WHERE class_id = ?",
        [class_id],
        |r| r.get(0),
    )?;
    Ok(n)
}

fn session_from_row(r: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: r.get(0)?,
        label: r.get(1)?,
        program: r.get(2)?,
        is_current: r.get::<_, i64>(3)? != 0,
    })
}

pub fn create_session(
    conn: &Connection,
    label: &str,
    program: &str,
    is_current: bool,
) -> EngineResult<Session> {
    let label = label.trim().to_string();
    if !is_valid_session_label(&label) {
        return Err(EngineError::InvalidSession(label));
    }
    let program = non_empty("program", program)?;
    require_program(conn, &program)?;

    let tx = db::begin_immediate(conn)?;
    if is_current {
        tx.execute(
            "UPDATE sessions SET is_current = 0 WHERE program = ? AND is_current = 1",
            [&program],
        )?;
    }
    let id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO sessions(id, label, program, is_current) VALUES(?, ?, ?, ?)",
        (&id, &label, &program, is_current as i64),
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            EngineError::Duplicate {
                entity: "session",
                key: format!("{}/{}", program, label),
            }
        } else {
            e.into()
        }
    })?;
    tx.commit()?;

    Ok(Session {
        id,
        label,
        program,
        is_current,
    })
}

pub fn get_session(conn: &Connection, session_id: &str) -> EngineResult<Session> {
    conn.query_row(
        "SELECT id, label, program, is_current FROM sessions WHERE id = ?",
        [session_id],
        session_from_row,
    )
    .optional()?
    .ok_or_else(|| EngineError::not_found("session", session_id))
}

/// Marks `session_id` current and clears the flag on every other session of
/// the same program, in one transaction.
pub fn set_current_session(conn: &Connection, session_id: &str) -> EngineResult<Session> {
    let tx = db::begin_immediate(conn)?;
    let mut session = get_session(&tx, session_id)?;
    tx.execute(
        "UPDATE sessions SET is_current = 0 WHERE program = ? AND is_current = 1",
        [&session.program],
    )?;
    tx.execute("UPDATE sessions SET is_current = 1 WHERE id = ?", [session_id])?;
    tx.commit()?;

    info!(session_id, program = %session.program, label = %session.label, "current session changed");
    session.is_current = true;
    Ok(session)
}

pub fn get_current_session(conn: &Connection, program: &str) -> EngineResult<Option<Session>> {
    let session = conn
        .query_row(
            "SELECT id, label, program, is_current
             FROM sessions
             WHERE program = ? AND is_current = 1",
            [program],
            session_from_row,
        )
        .optional()?;
    Ok(session)
}

pub fn list_sessions(conn: &Connection, program: Option<&str>) -> EngineResult<Vec<Session>> {
    let mut stmt = conn.prepare(
        "SELECT id, label, program, is_current
         FROM sessions
         WHERE (?1 IS NULL OR program = ?1)
         ORDER BY program, label",
    )?;
    let rows = stmt
        .query_map([program], session_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
