use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{get_optional_str, get_required_str, get_str_array, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::PromotionAction;
use crate::promotion::{self, Cohort, PromotionRequest};
use crate::setup::PromotionSettings;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::collections::BTreeSet;

/// Builds a typed request from the wire payload:
/// `{ currentClassId, action, nextClassId?, newSessionLabel, cohort: "ALL"|"SELECTED",
///    studentIds?, sourceSectionIds?, targetSectionId? }`.
fn parse_promotion_request(params: &Value) -> Result<PromotionRequest, HandlerErr> {
    let current_class_id = get_required_str(params, "currentClassId")?;
    let action_raw = get_required_str(params, "action")?;
    let action = PromotionAction::parse(&action_raw)
        .ok_or_else(|| HandlerErr::bad_params("action must be one of: PROMOTE, REPEAT"))?;

    let cohort_raw = get_required_str(params, "cohort")?;
    let cohort = match cohort_raw.to_ascii_uppercase().as_str() {
        "ALL" => Cohort::All,
        "SELECTED" => {
            let ids = get_str_array(params, "studentIds")?.unwrap_or_default();
            Cohort::Selected(ids.into_iter().collect::<BTreeSet<_>>())
        }
        _ => return Err(HandlerErr::bad_params("cohort must be one of: ALL, SELECTED")),
    };

    Ok(PromotionRequest {
        current_class_id,
        action,
        next_class_id: get_optional_str(params, "nextClassId")?,
        new_session_label: get_optional_str(params, "newSessionLabel")?.unwrap_or_default(),
        cohort,
        source_section_ids: get_str_array(params, "sourceSectionIds")?.unwrap_or_default(),
        target_section_id: get_optional_str(params, "targetSectionId")?,
    })
}

fn load_request<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<(&'a Connection, PromotionRequest, PromotionSettings), Value> {
    let Some(conn) = state.db.as_ref() else {
        return Err(err(&req.id, "no_workspace", "select a workspace first", None));
    };
    let parsed = parse_promotion_request(&req.params).map_err(|e| e.response(&req.id))?;
    let settings = PromotionSettings::load(conn)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    Ok((conn, parsed, settings))
}

fn handle_promote(state: &mut AppState, req: &Request) -> Value {
    let (conn, parsed, settings) = match load_request(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match promotion::promote(conn, &settings, &parsed) {
        Ok(result) => ok(&req.id, json!(result)),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_preview(state: &mut AppState, req: &Request) -> Value {
    let (conn, parsed, settings) = match load_request(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match promotion::plan(conn, &settings, &parsed) {
        Ok(plan) => ok(
            &req.id,
            json!({
                "action": plan.action,
                "classId": plan.destination_class.id,
                "className": plan.destination_class.name,
                "sectionId": plan.target_section_id,
                "session": plan.new_session,
                "eligibleCount": plan.students.len(),
                "students": plan.students,
            }),
        ),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_history(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match promotion::promotion_history(conn, &student_id) {
        Ok(records) => ok(&req.id, json!({ "records": records })),
        Err(e) => engine_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "promotion.promote" => Some(handle_promote(state, req)),
        "promotion.preview" => Some(handle_preview(state, req)),
        "promotion.history" => Some(handle_history(state, req)),
        _ => None,
    }
}
