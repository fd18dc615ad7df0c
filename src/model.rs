use chrono::NaiveDate;
use rusqlite::Row;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudentStatus {
    Active,
    Promoted,
    Repeated,
    Graduated,
    Dropped,
}

impl StudentStatus {
    pub const ALL: [StudentStatus; 5] = [
        Self::Active,
        Self::Promoted,
        Self::Repeated,
        Self::Graduated,
        Self::Dropped,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Promoted => "PROMOTED",
            Self::Repeated => "REPEATED",
            Self::Graduated => "GRADUATED",
            Self::Dropped => "DROPPED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(Self::Active),
            "PROMOTED" => Some(Self::Promoted),
            "REPEATED" => Some(Self::Repeated),
            "GRADUATED" => Some(Self::Graduated),
            "DROPPED" => Some(Self::Dropped),
            _ => None,
        }
    }

    /// Statuses that close a student's enrolment and carry a leaving date.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Graduated | Self::Dropped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmployeeStatus {
    Active,
    Resigned,
    Terminated,
    Retired,
}

impl EmployeeStatus {
    pub const ALL: [EmployeeStatus; 4] = [
        Self::Active,
        Self::Resigned,
        Self::Terminated,
        Self::Retired,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Resigned => "RESIGNED",
            Self::Terminated => "TERMINATED",
            Self::Retired => "RETIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(Self::Active),
            "RESIGNED" => Some(Self::Resigned),
            "TERMINATED" => Some(Self::Terminated),
            "RETIRED" => Some(Self::Retired),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Student,
    Employee,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "STUDENT",
            Self::Employee => "EMPLOYEE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STUDENT" => Some(Self::Student),
            "EMPLOYEE" => Some(Self::Employee),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromotionAction {
    Promote,
    Repeat,
}

impl PromotionAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PROMOTE" => Some(Self::Promote),
            "REPEAT" => Some(Self::Repeat),
            _ => None,
        }
    }

    /// Label written to the promotion record; the live status stays ACTIVE.
    pub fn resulting_status(self) -> StudentStatus {
        match self {
            Self::Promote => StudentStatus::Promoted,
            Self::Repeat => StudentStatus::Repeated,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub class_id: String,
    pub name: String,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: String,
    pub name: String,
    pub program: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub label: String,
    pub program: String,
    pub is_current: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub registration_no: String,
    pub roll_no: String,
    pub name: String,
    pub status: StudentStatus,
    pub class_id: String,
    pub section_id: Option<String>,
    pub session: String,
    pub joining_date: NaiveDate,
    pub leaving_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: String,
    pub registration_no: String,
    pub name: String,
    pub designation: Option<String>,
    pub status: EmployeeStatus,
    pub joining_date: NaiveDate,
    pub leaving_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionRecord {
    pub id: String,
    pub student_id: String,
    pub old_class_id: String,
    pub old_session: String,
    pub old_section_id: Option<String>,
    pub new_class_id: String,
    pub new_session: String,
    pub new_section_id: Option<String>,
    pub resulting_status: StudentStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeRecord {
    pub id: String,
    pub entity_id: String,
    pub entity_type: EntityType,
    pub from_status: String,
    pub to_status: String,
    pub effective_date: NaiveDate,
    pub reason: String,
    pub created_at: String,
}

/// Session labels are academic years such as `2025-2026`.
pub fn is_valid_session_label(label: &str) -> bool {
    let Some((start, end)) = label.split_once('-') else {
        return false;
    };
    let is_year = |y: &str| y.len() == 4 && y.bytes().all(|b| b.is_ascii_digit());
    if !is_year(start) || !is_year(end) {
        return false;
    }
    match (start.parse::<u32>(), end.parse::<u32>()) {
        (Ok(a), Ok(b)) => b == a + 1,
        _ => false,
    }
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Reads a `YYYY-MM-DD` column; anything else is a conversion failure.
pub fn date_column(r: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = r.get(idx)?;
    parse_date(&raw).ok_or_else(|| bad_date(idx, &raw))
}

pub fn optional_date_column(r: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = r.get(idx)?;
    raw.map(|s| parse_date(&s).ok_or_else(|| bad_date(idx, &s)))
        .transpose()
}

fn bad_date(idx: usize, raw: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("invalid date {}", raw).into(),
    )
}

pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
