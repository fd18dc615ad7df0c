//! Batch promotion of a cohort between classes, sections and sessions.
//!
//! A request is validated and its cohort resolved inside the same IMMEDIATE
//! transaction that applies it, so two requests over overlapping students are
//! serialized and the later one re-resolves against committed state. Either
//! every eligible student moves and gets one `PromotionRecord`, or nothing
//! changes.

use crate::catalog;
use crate::db;
use crate::error::{EngineError, EngineResult};
use crate::model::{
    is_valid_session_label, now_timestamp, Class, PromotionAction, PromotionRecord, Student,
    StudentStatus,
};
use crate::setup::PromotionSettings;
use crate::students;
use rusqlite::{Connection, Row};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cohort {
    All,
    Selected(BTreeSet<String>),
}

#[derive(Debug, Clone)]
pub struct PromotionRequest {
    pub current_class_id: String,
    pub action: PromotionAction,
    /// Required for PROMOTE, ignored for REPEAT.
    pub next_class_id: Option<String>,
    pub new_session_label: String,
    pub cohort: Cohort,
    /// Narrows `Cohort::All`; empty means every section of the class.
    pub source_section_ids: Vec<String>,
    pub target_section_id: Option<String>,
}

/// A validated request with its cohort resolved, ready to apply.
#[derive(Debug, Clone)]
pub struct PromotionPlan {
    pub action: PromotionAction,
    pub source_class: Class,
    pub destination_class: Class,
    pub target_section_id: Option<String>,
    pub new_session: String,
    pub students: Vec<Student>,
}

impl PromotionPlan {
    /// Section a student lands in. REPEAT without an explicit target keeps
    /// the student's current section.
    fn destination_section_for(&self, student: &Student) -> Option<String> {
        match (self.action, &self.target_section_id) {
            (_, Some(target)) => Some(target.clone()),
            (PromotionAction::Promote, None) => None,
            (PromotionAction::Repeat, None) => student.section_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionResult {
    pub promoted_count: usize,
    pub action: PromotionAction,
    pub class_id: String,
    pub section_id: Option<String>,
    pub session: String,
    pub student_ids: Vec<String>,
    pub promotion_record_ids: Vec<String>,
}

fn resolve_destination(
    conn: &Connection,
    settings: &PromotionSettings,
    req: &PromotionRequest,
    source: &Class,
) -> EngineResult<Class> {
    match req.action {
        PromotionAction::Repeat => Ok(source.clone()),
        PromotionAction::Promote => {
            let Some(next_id) = req.next_class_id.as_deref() else {
                return Err(EngineError::InvalidTarget(
                    "nextClassId is required for PROMOTE".into(),
                ));
            };
            if next_id == source.id {
                return Err(EngineError::InvalidTarget(
                    "nextClassId must differ from currentClassId".into(),
                ));
            }
            let next = catalog::get_class(conn, next_id)?;
            if !settings.allow_cross_program && next.program != source.program {
                return Err(EngineError::InvalidTarget(format!(
                    "cross-program promotion from {} to {} is disabled",
                    source.program, next.program
                )));
            }
            Ok(next)
        }
    }
}

fn validate_source_sections(
    conn: &Connection,
    source: &Class,
    section_ids: &[String],
) -> EngineResult<HashSet<String>> {
    let mut out = HashSet::new();
    for id in section_ids {
        let section = catalog::get_section(conn, id)?;
        if section.class_id != source.id {
            return Err(EngineError::InvalidTarget(format!(
                "source section {} does not belong to class {}",
                id, source.id
            )));
        }
        out.insert(section.id);
    }
    Ok(out)
}

fn resolve_target_section(
    conn: &Connection,
    req: &PromotionRequest,
    destination: &Class,
) -> EngineResult<Option<String>> {
    if let Some(id) = req.target_section_id.as_deref() {
        let section = catalog::get_section(conn, id)?;
        if section.class_id != destination.id {
            return Err(EngineError::InvalidTarget(format!(
                "target section {} does not belong to class {}",
                id, destination.id
            )));
        }
        return Ok(Some(section.id));
    }
    if req.action == PromotionAction::Promote && catalog::section_count(conn, &destination.id)? > 0
    {
        return Err(EngineError::InvalidTarget(format!(
            "targetSectionId is required: class {} has sections",
            destination.name
        )));
    }
    Ok(None)
}

fn resolve_cohort(
    conn: &Connection,
    req: &PromotionRequest,
    source: &Class,
    source_sections: &HashSet<String>,
) -> EngineResult<Vec<Student>> {
    let students = match &req.cohort {
        Cohort::Selected(ids) => {
            if ids.is_empty() {
                return Err(EngineError::EmptyCohort("no students selected".into()));
            }
            let mut out = Vec::with_capacity(ids.len());
            for id in ids {
                let student = students::get_student(conn, id)?;
                if student.class_id != source.id {
                    return Err(EngineError::CrossClassSelection {
                        student_id: student.id,
                        class_id: source.id.clone(),
                    });
                }
                if student.status != StudentStatus::Active {
                    return Err(EngineError::InactiveStudent {
                        student_id: student.id,
                        status: student.status.as_str().to_string(),
                    });
                }
                out.push(student);
            }
            out
        }
        Cohort::All => students::list_active_students(conn, &source.id, None)?
            .into_iter()
            .filter(|s| {
                source_sections.is_empty()
                    || s.section_id
                        .as_ref()
                        .is_some_and(|sid| source_sections.contains(sid))
            })
            .collect(),
    };
    if students.is_empty() {
        return Err(EngineError::EmptyCohort(format!(
            "no ACTIVE students eligible in class {}",
            source.name
        )));
    }
    Ok(students)
}

/// Validates `req` and resolves its cohort without mutating anything.
pub fn plan(
    conn: &Connection,
    settings: &PromotionSettings,
    req: &PromotionRequest,
) -> EngineResult<PromotionPlan> {
    let new_session = req.new_session_label.trim().to_string();
    if new_session.is_empty() || !is_valid_session_label(&new_session) {
        return Err(EngineError::InvalidSession(new_session));
    }

    let source = catalog::get_class(conn, &req.current_class_id)?;
    let destination = resolve_destination(conn, settings, req, &source)?;
    let source_sections = validate_source_sections(conn, &source, &req.source_section_ids)?;
    let target_section_id = resolve_target_section(conn, req, &destination)?;
    let students = resolve_cohort(conn, req, &source, &source_sections)?;

    Ok(PromotionPlan {
        action: req.action,
        source_class: source,
        destination_class: destination,
        target_section_id,
        new_session,
        students,
    })
}

fn apply_plan(conn: &Connection, plan: &PromotionPlan) -> EngineResult<PromotionResult> {
    let created_at = now_timestamp();
    let resulting = plan.action.resulting_status();
    // (student id, record id); reported sorted by student id.
    let mut applied = Vec::with_capacity(plan.students.len());

    let mut update = conn.prepare(
        "UPDATE students
         SET class_id = ?, section_id = ?, session = ?, updated_at = ?
         WHERE id = ? AND class_id = ? AND status = 'ACTIVE'",
    )?;
    let mut insert = conn.prepare(
        "INSERT INTO promotion_records(
           id,
           student_id,
           old_class_id,
           old_session,
           old_section_id,
           new_class_id,
           new_session,
           new_section_id,
           resulting_status,
           created_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )?;

    for student in &plan.students {
        let new_section = plan.destination_section_for(student);
        let changed = update.execute((
            &plan.destination_class.id,
            new_section.as_deref(),
            &plan.new_session,
            &created_at,
            &student.id,
            &plan.source_class.id,
        ))?;
        if changed != 1 {
            return Err(EngineError::Conflict(format!(
                "student {} changed while the promotion was being applied",
                student.id
            )));
        }

        let record_id = Uuid::new_v4().to_string();
        insert.execute((
            &record_id,
            &student.id,
            &student.class_id,
            &student.session,
            student.section_id.as_deref(),
            &plan.destination_class.id,
            &plan.new_session,
            new_section.as_deref(),
            resulting.as_str(),
            &created_at,
        ))?;
        debug!(student_id = %student.id, record_id = %record_id, "promotion record appended");

        applied.push((student.id.clone(), record_id));
    }
    applied.sort();
    let (student_ids, record_ids): (Vec<String>, Vec<String>) = applied.into_iter().unzip();

    Ok(PromotionResult {
        promoted_count: student_ids.len(),
        action: plan.action,
        class_id: plan.destination_class.id.clone(),
        section_id: plan.target_section_id.clone(),
        session: plan.new_session.clone(),
        student_ids,
        promotion_record_ids: record_ids,
    })
}

/// Applies `req` as one transaction. On any error the store is unchanged.
pub fn promote(
    conn: &Connection,
    settings: &PromotionSettings,
    req: &PromotionRequest,
) -> EngineResult<PromotionResult> {
    let tx = db::begin_immediate(conn)?;
    let outcome = plan(&tx, settings, req).and_then(|p| apply_plan(&tx, &p));
    let result = match outcome {
        Ok(r) => r,
        Err(e) => {
            // Dropping the transaction rolls back whatever was applied.
            warn!(
                class_id = %req.current_class_id,
                code = e.code(),
                error = %e,
                "promotion rejected"
            );
            return Err(e);
        }
    };
    tx.commit()?;

    info!(
        from_class = %req.current_class_id,
        to_class = %result.class_id,
        session = %result.session,
        count = result.promoted_count,
        action = ?result.action,
        "promotion committed"
    );
    Ok(result)
}

fn record_from_row(r: &Row<'_>) -> rusqlite::Result<PromotionRecord> {
    let status: String = r.get(8)?;
    Ok(PromotionRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        old_class_id: r.get(2)?,
        old_session: r.get(3)?,
        old_section_id: r.get(4)?,
        new_class_id: r.get(5)?,
        new_session: r.get(6)?,
        new_section_id: r.get(7)?,
        resulting_status: StudentStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                8,
                rusqlite::types::Type::Text,
                format!("unknown resulting status {}", status).into(),
            )
        })?,
        created_at: r.get(9)?,
    })
}

/// Promotion records of a student, oldest first.
pub fn promotion_history(conn: &Connection, student_id: &str) -> EngineResult<Vec<PromotionRecord>> {
    students::get_student(conn, student_id)?;
    let mut stmt = conn.prepare(
        "SELECT id, student_id, old_class_id, old_session, old_section_id,
                new_class_id, new_session, new_section_id, resulting_status, created_at
         FROM promotion_records
         WHERE student_id = ?
         ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([student_id], record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{school, school_with_cohort};
    use std::sync::{Arc, Barrier};

    fn promote_req(s: &crate::test_support::School) -> PromotionRequest {
        PromotionRequest {
            current_class_id: s.grade1.id.clone(),
            action: PromotionAction::Promote,
            next_class_id: Some(s.grade2.id.clone()),
            new_session_label: "2025-2026".into(),
            cohort: Cohort::All,
            source_section_ids: Vec::new(),
            target_section_id: Some(s.sec_a2.id.clone()),
        }
    }

    fn ids(students: &[Student]) -> BTreeSet<String> {
        students.iter().map(|s| s.id.clone()).collect()
    }

    fn record_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM promotion_records", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn promote_single_section_leaves_other_sections_untouched() {
        let (s, in_a, in_b) = school_with_cohort();
        let mut req = promote_req(&s);
        req.source_section_ids = vec![s.sec_a.id.clone()];

        let res = promote(&s.conn, &PromotionSettings::default(), &req).unwrap();
        assert_eq!(res.promoted_count, 5);
        assert_eq!(res.student_ids.iter().cloned().collect::<BTreeSet<_>>(), ids(&in_a));

        for st in &in_a {
            let now = students::get_student(&s.conn, &st.id).unwrap();
            assert_eq!(now.class_id, s.grade2.id);
            assert_eq!(now.section_id.as_deref(), Some(s.sec_a2.id.as_str()));
            assert_eq!(now.session, "2025-2026");
            assert_eq!(now.status, StudentStatus::Active);
            let history = promotion_history(&s.conn, &st.id).unwrap();
            assert_eq!(history.len(), 1);
            assert_eq!(history[0].resulting_status, StudentStatus::Promoted);
            assert_eq!(history[0].old_class_id, s.grade1.id);
            assert_eq!(history[0].old_section_id.as_deref(), Some(s.sec_a.id.as_str()));
            assert_eq!(history[0].old_session, "2024-2025");
        }
        for st in &in_b {
            let now = students::get_student(&s.conn, &st.id).unwrap();
            assert_eq!(now.class_id, s.grade1.id);
            assert_eq!(now.session, "2024-2025");
            assert!(promotion_history(&s.conn, &st.id).unwrap().is_empty());
        }
    }

    #[test]
    fn repeat_selected_students_keeps_class_and_section() {
        let (s, in_a, _) = school_with_cohort();
        let picked: BTreeSet<String> = in_a.iter().take(2).map(|st| st.id.clone()).collect();
        let req = PromotionRequest {
            current_class_id: s.grade1.id.clone(),
            action: PromotionAction::Repeat,
            next_class_id: Some(s.grade2.id.clone()),
            new_session_label: "2025-2026".into(),
            cohort: Cohort::Selected(picked.clone()),
            source_section_ids: Vec::new(),
            target_section_id: None,
        };

        let res = promote(&s.conn, &PromotionSettings::default(), &req).unwrap();
        assert_eq!(res.promoted_count, 2);
        assert_eq!(res.class_id, s.grade1.id);

        for id in &picked {
            let now = students::get_student(&s.conn, id).unwrap();
            assert_eq!(now.class_id, s.grade1.id);
            assert_eq!(now.section_id.as_deref(), Some(s.sec_a.id.as_str()));
            assert_eq!(now.session, "2025-2026");
            let history = promotion_history(&s.conn, id).unwrap();
            assert_eq!(history.len(), 1);
            assert_eq!(history[0].old_class_id, history[0].new_class_id);
            assert_eq!(history[0].resulting_status, StudentStatus::Repeated);
        }
        let untouched = students::get_student(&s.conn, &in_a[4].id).unwrap();
        assert_eq!(untouched.session, "2024-2025");
    }

    #[test]
    fn missing_target_section_is_rejected_without_mutation() {
        let (s, in_a, _) = school_with_cohort();
        let mut req = promote_req(&s);
        req.target_section_id = None;

        let e = promote(&s.conn, &PromotionSettings::default(), &req).unwrap_err();
        assert!(matches!(e, EngineError::InvalidTarget(_)));
        assert_eq!(e.category(), "validation");
        assert_eq!(record_count(&s.conn), 0);
        let st = students::get_student(&s.conn, &in_a[0].id).unwrap();
        assert_eq!(st.class_id, s.grade1.id);
    }

    #[test]
    fn promote_into_class_without_sections_needs_no_target() {
        let s = school();
        let grade3 = catalog::create_class(&s.conn, "Grade 3", "Primary").unwrap();
        let st = s.enroll(&s.grade2, Some(&s.sec_a2), "X1");
        let req = PromotionRequest {
            current_class_id: s.grade2.id.clone(),
            action: PromotionAction::Promote,
            next_class_id: Some(grade3.id.clone()),
            new_session_label: "2025-2026".into(),
            cohort: Cohort::All,
            source_section_ids: Vec::new(),
            target_section_id: None,
        };
        promote(&s.conn, &PromotionSettings::default(), &req).unwrap();
        let now = students::get_student(&s.conn, &st.id).unwrap();
        assert_eq!(now.class_id, grade3.id);
        assert_eq!(now.section_id, None);
    }

    #[test]
    fn promote_rejects_same_or_missing_next_class() {
        let (s, _, _) = school_with_cohort();
        let mut req = promote_req(&s);
        req.next_class_id = Some(s.grade1.id.clone());
        assert!(matches!(
            promote(&s.conn, &PromotionSettings::default(), &req).unwrap_err(),
            EngineError::InvalidTarget(_)
        ));
        req.next_class_id = None;
        assert!(matches!(
            promote(&s.conn, &PromotionSettings::default(), &req).unwrap_err(),
            EngineError::InvalidTarget(_)
        ));
    }

    #[test]
    fn target_section_must_belong_to_destination() {
        let (s, _, _) = school_with_cohort();
        let mut req = promote_req(&s);
        req.target_section_id = Some(s.sec_b.id.clone());
        assert_eq!(
            promote(&s.conn, &PromotionSettings::default(), &req)
                .unwrap_err()
                .code(),
            "invalid_target"
        );
    }

    #[test]
    fn source_section_must_belong_to_current_class() {
        let (s, _, _) = school_with_cohort();
        let mut req = promote_req(&s);
        req.source_section_ids = vec![s.sec_a.id.clone(), s.sec_a2.id.clone()];
        let e = promote(&s.conn, &PromotionSettings::default(), &req).unwrap_err();
        assert!(matches!(e, EngineError::InvalidTarget(_)));
        assert_eq!(record_count(&s.conn), 0);
    }

    #[test]
    fn repeat_with_target_section_moves_students_into_it() {
        let (s, in_a, in_b) = school_with_cohort();
        let req = PromotionRequest {
            current_class_id: s.grade1.id.clone(),
            action: PromotionAction::Repeat,
            next_class_id: None,
            new_session_label: "2025-2026".into(),
            cohort: Cohort::Selected(ids(&in_a[..2])),
            source_section_ids: Vec::new(),
            target_section_id: Some(s.sec_b.id.clone()),
        };

        let res = promote(&s.conn, &PromotionSettings::default(), &req).unwrap();
        assert_eq!(res.promoted_count, 2);
        assert_eq!(res.section_id.as_deref(), Some(s.sec_b.id.as_str()));
        for st in &in_a[..2] {
            let now = students::get_student(&s.conn, &st.id).unwrap();
            assert_eq!(now.class_id, s.grade1.id);
            assert_eq!(now.section_id.as_deref(), Some(s.sec_b.id.as_str()));
            let history = promotion_history(&s.conn, &st.id).unwrap();
            assert_eq!(history[0].old_section_id.as_deref(), Some(s.sec_a.id.as_str()));
            assert_eq!(history[0].new_section_id.as_deref(), Some(s.sec_b.id.as_str()));
            assert_eq!(history[0].resulting_status, StudentStatus::Repeated);
        }
        let untouched = students::get_student(&s.conn, &in_a[2].id).unwrap();
        assert_eq!(untouched.section_id.as_deref(), Some(s.sec_a.id.as_str()));
        assert_eq!(
            students::list_active_students(&s.conn, &s.grade1.id, Some(s.sec_b.id.as_str()))
                .unwrap()
                .len(),
            in_b.len() + 2
        );
    }

    #[test]
    fn selection_from_another_class_rejects_whole_request() {
        let (s, in_a, _) = school_with_cohort();
        let other = s.enroll(&s.grade2, Some(&s.sec_a2), "Z1");
        let mut selected = ids(&in_a[..2]);
        selected.insert(other.id.clone());
        let mut req = promote_req(&s);
        req.cohort = Cohort::Selected(selected);

        let e = promote(&s.conn, &PromotionSettings::default(), &req).unwrap_err();
        assert!(matches!(e, EngineError::CrossClassSelection { .. }));
        assert_eq!(record_count(&s.conn), 0);
    }

    #[test]
    fn unknown_selected_student_is_not_found() {
        let (s, _, _) = school_with_cohort();
        let mut req = promote_req(&s);
        req.cohort = Cohort::Selected(BTreeSet::from(["ghost".to_string()]));
        assert_eq!(
            promote(&s.conn, &PromotionSettings::default(), &req)
                .unwrap_err()
                .category(),
            "not_found"
        );
    }

    #[test]
    fn empty_selection_and_empty_class_are_empty_cohort() {
        let s = school();
        let mut req = promote_req(&s);
        assert!(matches!(
            promote(&s.conn, &PromotionSettings::default(), &req).unwrap_err(),
            EngineError::EmptyCohort(_)
        ));
        req.cohort = Cohort::Selected(BTreeSet::new());
        assert!(matches!(
            promote(&s.conn, &PromotionSettings::default(), &req).unwrap_err(),
            EngineError::EmptyCohort(_)
        ));
    }

    #[test]
    fn graduated_students_are_not_eligible() {
        let (s, in_a, _) = school_with_cohort();
        s.conn
            .execute(
                "UPDATE students SET status = 'GRADUATED' WHERE id = ?",
                [&in_a[0].id],
            )
            .unwrap();
        let mut req = promote_req(&s);
        req.cohort = Cohort::Selected(ids(&in_a[..1]));
        assert_eq!(
            promote(&s.conn, &PromotionSettings::default(), &req)
                .unwrap_err()
                .code(),
            "inactive_student"
        );

        req.cohort = Cohort::All;
        req.source_section_ids = vec![s.sec_a.id.clone()];
        let res = promote(&s.conn, &PromotionSettings::default(), &req).unwrap();
        assert_eq!(res.promoted_count, 4);
    }

    #[test]
    fn invalid_session_label_is_rejected() {
        let (s, _, _) = school_with_cohort();
        let mut req = promote_req(&s);
        req.new_session_label = "  ".into();
        assert_eq!(
            promote(&s.conn, &PromotionSettings::default(), &req)
                .unwrap_err()
                .code(),
            "invalid_session"
        );
    }

    #[test]
    fn cross_program_promotion_follows_setting() {
        let (s, _, _) = school_with_cohort();
        catalog::create_program(&s.conn, "Secondary").unwrap();
        let g7 = catalog::create_class(&s.conn, "Grade 7", "Secondary").unwrap();
        let mut req = promote_req(&s);
        req.next_class_id = Some(g7.id.clone());
        req.target_section_id = None;

        let strict = PromotionSettings {
            allow_cross_program: false,
        };
        assert_eq!(promote(&s.conn, &strict, &req).unwrap_err().code(), "invalid_target");
        let res = promote(&s.conn, &PromotionSettings::default(), &req).unwrap();
        assert_eq!(res.promoted_count, 8);
    }

    #[test]
    fn failure_mid_batch_rolls_back_every_student() {
        let (s, in_a, in_b) = school_with_cohort();
        // The fourth student's update fails after the first three were applied.
        s.conn
            .execute_batch(&format!(
                "CREATE TRIGGER fail_one BEFORE UPDATE ON students
                 WHEN OLD.id = '{}'
                 BEGIN SELECT RAISE(ABORT, 'simulated failure'); END;",
                in_a[3].id
            ))
            .unwrap();
        let before: Vec<Student> = in_a
            .iter()
            .chain(in_b.iter())
            .map(|st| students::get_student(&s.conn, &st.id).unwrap())
            .collect();

        let req = promote_req(&s);
        let e = promote(&s.conn, &PromotionSettings::default(), &req).unwrap_err();
        assert_eq!(e.category(), "storage");

        assert_eq!(record_count(&s.conn), 0);
        for st in &before {
            let now = students::get_student(&s.conn, &st.id).unwrap();
            assert_eq!(now.class_id, st.class_id);
            assert_eq!(now.section_id, st.section_id);
            assert_eq!(now.session, st.session);
        }
    }

    #[test]
    fn history_only_grows_and_records_never_change() {
        let (s, in_a, _) = school_with_cohort();
        let mut req = promote_req(&s);
        req.source_section_ids = vec![s.sec_a.id.clone()];
        promote(&s.conn, &PromotionSettings::default(), &req).unwrap();
        let first = promotion_history(&s.conn, &in_a[0].id).unwrap();

        let grade3 = catalog::create_class(&s.conn, "Grade 3", "Primary").unwrap();
        let again = PromotionRequest {
            current_class_id: s.grade2.id.clone(),
            action: PromotionAction::Promote,
            next_class_id: Some(grade3.id.clone()),
            new_session_label: "2026-2027".into(),
            cohort: Cohort::All,
            source_section_ids: Vec::new(),
            target_section_id: None,
        };
        promote(&s.conn, &PromotionSettings::default(), &again).unwrap();

        let second = promotion_history(&s.conn, &in_a[0].id).unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second[0], first[0]);
        assert_eq!(second[1].old_class_id, s.grade2.id);
        assert_eq!(second[1].new_class_id, grade3.id);
        assert!(s
            .conn
            .execute("DELETE FROM promotion_records", [])
            .is_err());
    }

    #[test]
    fn concurrent_promotions_of_same_cohort_commit_once() {
        let (s, in_a, _) = school_with_cohort();
        let mut req = promote_req(&s);
        req.cohort = Cohort::Selected(ids(&in_a));

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let conn = s.reopen();
                let req = req.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    promote(&conn, &PromotionSettings::default(), &req)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let loser = results.into_iter().find_map(|r| r.err()).unwrap();
        assert!(
            matches!(loser, EngineError::CrossClassSelection { .. }),
            "unexpected error: {loser:?}"
        );
        for st in &in_a {
            assert_eq!(promotion_history(&s.conn, &st.id).unwrap().len(), 1);
        }
    }

    #[test]
    fn plan_does_not_mutate() {
        let (s, in_a, _) = school_with_cohort();
        let mut req = promote_req(&s);
        req.source_section_ids = vec![s.sec_a.id.clone()];
        let p = plan(&s.conn, &PromotionSettings::default(), &req).unwrap();
        assert_eq!(p.students.len(), 5);
        assert_eq!(p.destination_class.id, s.grade2.id);
        assert_eq!(record_count(&s.conn), 0);
        assert_eq!(
            students::get_student(&s.conn, &in_a[0].id).unwrap().class_id,
            s.grade1.id
        );
    }
}
