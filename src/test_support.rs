//! Fixtures shared by unit tests.

use crate::catalog;
use crate::db;
use crate::model::{Class, Section, Student};
use crate::students::{self, NewStudent};
use rusqlite::Connection;

pub struct School {
    pub dir: tempfile::TempDir,
    pub conn: Connection,
    pub grade1: Class,
    pub grade2: Class,
    pub sec_a: Section,
    pub sec_b: Section,
    pub sec_a2: Section,
}

impl School {
    pub fn reopen(&self) -> Connection {
        db::open_db(self.dir.path()).expect("reopen db")
    }

    pub fn enroll(&self, class: &Class, section: Option<&Section>, reg: &str) -> Student {
        students::create_student(
            &self.conn,
            NewStudent {
                registration_no: reg.to_string(),
                roll_no: format!("R-{}", reg),
                name: format!("Student {}", reg),
                class_id: class.id.clone(),
                section_id: section.map(|s| s.id.clone()),
                session: "2024-2025".to_string(),
                joining_date: "2024-04-01".to_string(),
            },
        )
        .expect("enroll student")
    }
}

/// "Grade 1" with sections A and B, "Grade 2" with section A2, all in "Primary".
pub fn school() -> School {
    let dir = tempfile::tempdir().expect("tempdir");
    let conn = db::open_db(dir.path()).expect("open db");
    catalog::create_program(&conn, "Primary").expect("program");
    let grade1 = catalog::create_class(&conn, "Grade 1", "Primary").expect("grade 1");
    let grade2 = catalog::create_class(&conn, "Grade 2", "Primary").expect("grade 2");
    let sec_a = catalog::create_section(&conn, &grade1.id, "A").expect("section A");
    let sec_b = catalog::create_section(&conn, &grade1.id, "B").expect("section B");
    let sec_a2 = catalog::create_section(&conn, &grade2.id, "A2").expect("section A2");
    School {
        dir,
        conn,
        grade1,
        grade2,
        sec_a,
        sec_b,
        sec_a2,
    }
}

/// Scenario fixture: 5 students in Grade 1/A and 3 in Grade 1/B.
pub fn school_with_cohort() -> (School, Vec<Student>, Vec<Student>) {
    let s = school();
    let in_a = (1..=5)
        .map(|i| s.enroll(&s.grade1, Some(&s.sec_a), &format!("A{:02}", i)))
        .collect();
    let in_b = (1..=3)
        .map(|i| s.enroll(&s.grade1, Some(&s.sec_b), &format!("B{:02}", i)))
        .collect();
    (s, in_a, in_b)
}
