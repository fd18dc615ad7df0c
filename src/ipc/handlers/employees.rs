use crate::employees::{self, NewEmployee};
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{get_optional_str, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::EmployeeStatus;
use serde_json::{json, Value};

fn parse_new_employee(params: &Value) -> Result<NewEmployee, HandlerErr> {
    Ok(NewEmployee {
        registration_no: get_required_str(params, "registrationNo")?,
        name: get_required_str(params, "name")?,
        designation: get_optional_str(params, "designation")?,
        joining_date: get_required_str(params, "joiningDate")?,
    })
}

fn handle_employees_create(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let new = match parse_new_employee(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match employees::create_employee(conn, new) {
        Ok(emp) => ok(&req.id, json!({ "employeeId": emp.id, "employee": emp })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_employees_get(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let employee_id = match get_required_str(&req.params, "employeeId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match employees::get_employee(conn, &employee_id) {
        Ok(emp) => ok(&req.id, json!({ "employee": emp })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_employees_list(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "employees": [] }));
    };
    let status = match get_optional_str(&req.params, "status") {
        Ok(None) => None,
        Ok(Some(raw)) => match EmployeeStatus::parse(&raw) {
            Some(s) => Some(s),
            None => return err(&req.id, "bad_params", format!("unknown status: {}", raw), None),
        },
        Err(e) => return e.response(&req.id),
    };
    match employees::list_employees(conn, status) {
        Ok(rows) => ok(&req.id, json!({ "employees": rows })),
        Err(e) => engine_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "employees.create" => Some(handle_employees_create(state, req)),
        "employees.get" => Some(handle_employees_get(state, req)),
        "employees.list" => Some(handle_employees_list(state, req)),
        _ => None,
    }
}
