use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{get_optional_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::query;
use serde_json::{json, Value};

fn handle_section_occupancy(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match get_required_str(&req.params, "classId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match query::section_occupancy(conn, &class_id) {
        Ok(occ) => ok(&req.id, json!(occ)),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_status_counts(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let program = match get_optional_str(&req.params, "program") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match query::status_counts(conn, program.as_deref()) {
        Ok(counts) => ok(&req.id, json!(counts)),
        Err(e) => engine_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "reports.sectionOccupancy" => Some(handle_section_occupancy(state, req)),
        "reports.statusCounts" => Some(handle_status_counts(state, req)),
        _ => None,
    }
}
