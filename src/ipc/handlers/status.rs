use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{get_optional_str, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{EmployeeStatus, EntityType, StudentStatus};
use crate::setup::StatusSettings;
use crate::status::{self, EmployeeStatusChange, StudentStatusChange};
use serde_json::{json, Value};

fn parse_reason(params: &Value) -> Result<String, HandlerErr> {
    Ok(get_optional_str(params, "reason")?.unwrap_or_default())
}

fn parse_student_change(params: &Value) -> Result<StudentStatusChange, HandlerErr> {
    let raw = get_required_str(params, "toStatus")?;
    let to_status = StudentStatus::parse(&raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown student status: {}", raw)))?;
    Ok(StudentStatusChange {
        student_id: get_required_str(params, "studentId")?,
        to_status,
        reason: parse_reason(params)?,
        effective_date: get_optional_str(params, "effectiveDate")?,
    })
}

fn parse_employee_change(params: &Value) -> Result<EmployeeStatusChange, HandlerErr> {
    let raw = get_required_str(params, "toStatus")?;
    let to_status = EmployeeStatus::parse(&raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown employee status: {}", raw)))?;
    Ok(EmployeeStatusChange {
        employee_id: get_required_str(params, "employeeId")?,
        to_status,
        reason: parse_reason(params)?,
        effective_date: get_optional_str(params, "effectiveDate")?,
    })
}

fn handle_change_student(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let change = match parse_student_change(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match status::change_student_status(conn, &change) {
        Ok(record) => ok(&req.id, json!({ "record": record })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_change_employee(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let change = match parse_employee_change(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let settings = match StatusSettings::load(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    match status::change_employee_status(conn, &settings, &change) {
        Ok(record) => ok(&req.id, json!({ "record": record })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_history(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let entity_id = match get_required_str(&req.params, "entityId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let entity_type = match get_required_str(&req.params, "entityType") {
        Ok(raw) => match EntityType::parse(&raw) {
            Some(t) => t,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "entityType must be one of: STUDENT, EMPLOYEE",
                    None,
                )
            }
        },
        Err(e) => return e.response(&req.id),
    };
    match status::status_history(conn, &entity_id, entity_type) {
        Ok(records) => ok(&req.id, json!({ "records": records })),
        Err(e) => engine_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "status.changeStudent" => Some(handle_change_student(state, req)),
        "status.changeEmployee" => Some(handle_change_employee(state, req)),
        "status.history" => Some(handle_history(state, req)),
        _ => None,
    }
}
