use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{get_optional_str, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::students::{self, NewStudent};
use serde_json::{json, Value};

fn parse_new_student(params: &Value) -> Result<NewStudent, HandlerErr> {
    Ok(NewStudent {
        registration_no: get_required_str(params, "registrationNo")?,
        roll_no: get_required_str(params, "rollNo")?,
        name: get_required_str(params, "name")?,
        class_id: get_required_str(params, "classId")?,
        section_id: get_optional_str(params, "sectionId")?,
        session: get_required_str(params, "session")?,
        joining_date: get_required_str(params, "joiningDate")?,
    })
}

fn handle_students_create(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let new = match parse_new_student(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match students::create_student(conn, new) {
        Ok(s) => ok(&req.id, json!({ "studentId": s.id, "student": s })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_students_get(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match students::get_student(conn, &student_id) {
        Ok(s) => ok(&req.id, json!({ "student": s })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_students_list_active(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "students": [] }));
    };
    let class_id = match get_required_str(&req.params, "classId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let section_id = match get_optional_str(&req.params, "sectionId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match students::list_active_students(conn, &class_id, section_id.as_deref()) {
        Ok(rows) => ok(&req.id, json!({ "students": rows })),
        Err(e) => engine_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "students.create" => Some(handle_students_create(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        "students.listActive" => Some(handle_students_list_active(state, req)),
        _ => None,
    }
}
