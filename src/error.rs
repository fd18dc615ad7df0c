use thiserror::Error;

/// Errors surfaced by the catalog, record stores and the two engines.
///
/// Every variant maps to a stable wire `code()` and a `category()` so
/// collaborators can tell caller bugs from state problems without parsing
/// messages. Nothing here is retried.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error("empty cohort: {0}")]
    EmptyCohort(String),
    #[error("student {student_id} is not in class {class_id}")]
    CrossClassSelection { student_id: String, class_id: String },
    #[error("invalid session label: {0}")]
    InvalidSession(String),
    #[error("effectiveDate is required")]
    MissingEffectiveDate,
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("{entity} already exists: {key}")]
    Duplicate { entity: &'static str, key: String },
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("student {student_id} is {status}, expected ACTIVE")]
    InactiveStudent { student_id: String, status: String },
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("concurrent update: {0}")]
    Conflict(String),
    #[error("database is busy")]
    Busy,
    #[error("sqlite error: {0}")]
    Db(#[source] rusqlite::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTarget(_) => "invalid_target",
            Self::EmptyCohort(_) => "empty_cohort",
            Self::CrossClassSelection { .. } => "cross_class_selection",
            Self::InvalidSession(_) => "invalid_session",
            Self::MissingEffectiveDate => "missing_effective_date",
            Self::InvalidDate(_) => "invalid_date",
            Self::InvalidRequest(_) => "bad_params",
            Self::Duplicate { .. } => "duplicate",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::InactiveStudent { .. } => "inactive_student",
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) => "concurrent_update",
            Self::Busy => "busy",
            Self::Db(_) => "db_error",
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidTarget(_)
            | Self::EmptyCohort(_)
            | Self::CrossClassSelection { .. }
            | Self::InvalidSession(_)
            | Self::MissingEffectiveDate
            | Self::InvalidDate(_)
            | Self::InvalidRequest(_)
            | Self::Duplicate { .. } => "validation",
            Self::InvalidTransition { .. } | Self::InactiveStudent { .. } => "precondition",
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) | Self::Busy => "conflict",
            Self::Db(_) => "storage",
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(f, _)
                if matches!(
                    f.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                Self::Busy
            }
            _ => Self::Db(e),
        }
    }
}

/// True when `e` is a UNIQUE constraint violation.
pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(f, _) => {
            f.code == rusqlite::ErrorCode::ConstraintViolation
                && f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_taxonomy() {
        assert_eq!(EngineError::EmptyCohort("x".into()).category(), "validation");
        assert_eq!(
            EngineError::InvalidTransition {
                from: "GRADUATED".into(),
                to: "DROPPED".into()
            }
            .category(),
            "precondition"
        );
        assert_eq!(EngineError::not_found("student", "s1").category(), "not_found");
        assert_eq!(EngineError::MissingEffectiveDate.code(), "missing_effective_date");
    }

    #[test]
    fn storage_errors_keep_their_source() {
        use std::error::Error as _;
        let e = EngineError::from(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(e.category(), "storage");
        let source = e.source().expect("source");
        assert!(source.downcast_ref::<rusqlite::Error>().is_some());
    }
}
