//! Read-only views for the admin UI. Counts are computed on every call from
//! the student table; nothing here is cached or persisted.

use crate::catalog;
use crate::error::EngineResult;
use crate::model::{EmployeeStatus, Section, StudentStatus};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSummary {
    #[serde(flatten)]
    pub section: Section,
    pub active_students_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassWithSections {
    pub id: String,
    pub name: String,
    pub program: String,
    pub active_students_count: i64,
    pub sections: Vec<SectionSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassOccupancy {
    pub class_id: String,
    pub sections: Vec<SectionSummary>,
    pub unsectioned_active_count: i64,
    pub total_active_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub students: BTreeMap<&'static str, i64>,
    pub employees: BTreeMap<&'static str, i64>,
}

/// ACTIVE students per section id of one class; `None` collects students
/// without a section.
fn active_counts_by_section(
    conn: &Connection,
    class_id: &str,
) -> EngineResult<HashMap<Option<String>, i64>> {
    let mut stmt = conn.prepare(
        "SELECT section_id, COUNT(*)
         FROM students
         WHERE class_id = ? AND status = 'ACTIVE'
         GROUP BY section_id",
    )?;
    let rows = stmt
        .query_map([class_id], |r| Ok((r.get::<_, Option<String>>(0)?, r.get(1)?)))?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(rows)
}

pub fn section_occupancy(conn: &Connection, class_id: &str) -> EngineResult<ClassOccupancy> {
    catalog::get_class(conn, class_id)?;
    let counts = active_counts_by_section(conn, class_id)?;
    let sections: Vec<SectionSummary> = catalog::list_sections(conn, class_id)?
        .into_iter()
        .map(|section| SectionSummary {
            active_students_count: counts.get(&Some(section.id.clone())).copied().unwrap_or(0),
            section,
        })
        .collect();
    Ok(ClassOccupancy {
        class_id: class_id.to_string(),
        unsectioned_active_count: counts.get(&None).copied().unwrap_or(0),
        total_active_count: counts.values().sum(),
        sections,
    })
}

pub fn list_classes_with_sections(
    conn: &Connection,
    program: Option<&str>,
) -> EngineResult<Vec<ClassWithSections>> {
    let mut out = Vec::new();
    for class in catalog::list_classes(conn, program)? {
        let occupancy = section_occupancy(conn, &class.id)?;
        out.push(ClassWithSections {
            id: class.id,
            name: class.name,
            program: class.program,
            active_students_count: occupancy.total_active_count,
            sections: occupancy.sections,
        });
    }
    Ok(out)
}

pub fn status_counts(conn: &Connection, program: Option<&str>) -> EngineResult<StatusCounts> {
    let mut students: BTreeMap<&'static str, i64> =
        StudentStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    let mut stmt = conn.prepare(
        "SELECT s.status, COUNT(*)
         FROM students s
         JOIN classes c ON c.id = s.class_id
         WHERE (?1 IS NULL OR c.program = ?1)
         GROUP BY s.status",
    )?;
    let rows = stmt
        .query_map([program], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    for (status, n) in rows {
        if let Some(s) = StudentStatus::parse(&status) {
            students.insert(s.as_str(), n);
        }
    }

    let mut employees: BTreeMap<&'static str, i64> =
        EmployeeStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM employees GROUP BY status")?;
    let rows = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    for (status, n) in rows {
        if let Some(s) = EmployeeStatus::parse(&status) {
            employees.insert(s.as_str(), n);
        }
    }

    Ok(StatusCounts {
        students,
        employees,
    })
}
