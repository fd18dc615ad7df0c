use crate::catalog;
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{get_optional_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::query;
use serde_json::{json, Value};

fn handle_programs_create(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let name = match get_required_str(&req.params, "name") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match catalog::create_program(conn, &name) {
        Ok(p) => ok(&req.id, json!({ "program": p })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_programs_list(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "programs": [] }));
    };
    match catalog::list_programs(conn) {
        Ok(programs) => ok(&req.id, json!({ "programs": programs })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let name = match get_required_str(&req.params, "name") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let program = match get_required_str(&req.params, "program") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match catalog::create_class(conn, &name, &program) {
        Ok(c) => ok(&req.id, json!({ "classId": c.id, "class": c })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_classes_list(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };
    let program = match get_optional_str(&req.params, "program") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match query::list_classes_with_sections(conn, program.as_deref()) {
        Ok(classes) => ok(&req.id, json!({ "classes": classes })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_sections_create(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match get_required_str(&req.params, "classId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let name = match get_required_str(&req.params, "name") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match catalog::create_section(conn, &class_id, &name) {
        Ok(s) => ok(&req.id, json!({ "sectionId": s.id, "section": s })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_sessions_create(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let label = match get_required_str(&req.params, "label") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let program = match get_required_str(&req.params, "program") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let is_current = req
        .params
        .get("isCurrent")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    match catalog::create_session(conn, &label, &program, is_current) {
        Ok(s) => ok(&req.id, json!({ "sessionId": s.id, "session": s })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_sessions_set_current(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let session_id = match get_required_str(&req.params, "sessionId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match catalog::set_current_session(conn, &session_id) {
        Ok(s) => ok(&req.id, json!({ "session": s })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_sessions_current(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let program = match get_required_str(&req.params, "program") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match catalog::get_current_session(conn, &program) {
        Ok(s) => ok(&req.id, json!({ "session": s })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_sessions_list(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "sessions": [] }));
    };
    let program = match get_optional_str(&req.params, "program") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match catalog::list_sessions(conn, program.as_deref()) {
        Ok(sessions) => ok(&req.id, json!({ "sessions": sessions })),
        Err(e) => engine_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "programs.create" => Some(handle_programs_create(state, req)),
        "programs.list" => Some(handle_programs_list(state, req)),
        "classes.create" => Some(handle_classes_create(state, req)),
        "classes.list" => Some(handle_classes_list(state, req)),
        "sections.create" => Some(handle_sections_create(state, req)),
        "sessions.create" => Some(handle_sessions_create(state, req)),
        "sessions.setCurrent" => Some(handle_sessions_set_current(state, req)),
        "sessions.current" => Some(handle_sessions_current(state, req)),
        "sessions.list" => Some(handle_sessions_list(state, req)),
        _ => None,
    }
}
