//! Per-workspace settings sections.
//!
//! Each section is a JSON object stored under `setup.<name>` in
//! `workspace_settings`. Reads start from the defaults and apply whatever was
//! saved, so older workspaces pick up new fields automatically.

use crate::db;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupSection {
    Promotion,
    Status,
    Engine,
}

impl SetupSection {
    pub const ALL: [SetupSection; 3] = [Self::Promotion, Self::Status, Self::Engine];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "promotion" => Some(Self::Promotion),
            "status" => Some(Self::Status),
            "engine" => Some(Self::Engine),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Promotion => "promotion",
            Self::Status => "status",
            Self::Engine => "engine",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Promotion => "setup.promotion",
            Self::Status => "setup.status",
            Self::Engine => "setup.engine",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Promotion => json!({
            "allowCrossProgram": true
        }),
        SetupSection::Status => json!({
            "defaultRejoinReason": "Rejoined"
        }),
        SetupSection::Engine => json!({
            "busyTimeoutMs": 5000
        }),
    }
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

pub fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "section must be an object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Promotion => match k.as_str() {
                "allowCrossProgram" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                _ => return Err(format!("unknown promotion field: {}", k)),
            },
            SetupSection::Status => match k.as_str() {
                "defaultRejoinReason" => {
                    let s = parse_string_max(v, k, 120)?;
                    if s.is_empty() {
                        return Err(format!("{} must not be empty", k));
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                _ => return Err(format!("unknown status field: {}", k)),
            },
            SetupSection::Engine => match k.as_str() {
                "busyTimeoutMs" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 60_000)?));
                }
                _ => return Err(format!("unknown engine field: {}", k)),
            },
        }
    }
    Ok(())
}

pub fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed saved values fall back to defaults instead of blocking reads.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

pub fn update_section(
    conn: &rusqlite::Connection,
    section: SetupSection,
    patch: &Map<String, Value>,
) -> anyhow::Result<Result<Value, String>> {
    let mut current = load_section(conn, section)?;
    if let Err(msg) = merge_section_patch(section, &mut current, patch) {
        return Ok(Err(msg));
    }
    db::settings_set_json(conn, section.key(), &current)?;
    if section == SetupSection::Engine {
        db::set_busy_timeout(conn, EngineSettings::from_value(&current).busy_timeout_ms)?;
    }
    Ok(Ok(current))
}

#[derive(Debug, Clone)]
pub struct PromotionSettings {
    pub allow_cross_program: bool,
}

impl Default for PromotionSettings {
    fn default() -> Self {
        Self {
            allow_cross_program: true,
        }
    }
}

impl PromotionSettings {
    pub fn load(conn: &rusqlite::Connection) -> anyhow::Result<Self> {
        let v = load_section(conn, SetupSection::Promotion)?;
        Ok(Self {
            allow_cross_program: v
                .get("allowCrossProgram")
                .and_then(|x| x.as_bool())
                .unwrap_or(true),
        })
    }
}

#[derive(Debug, Clone)]
pub struct StatusSettings {
    pub default_rejoin_reason: String,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            default_rejoin_reason: "Rejoined".to_string(),
        }
    }
}

impl StatusSettings {
    pub fn load(conn: &rusqlite::Connection) -> anyhow::Result<Self> {
        let v = load_section(conn, SetupSection::Status)?;
        let mut out = Self::default();
        if let Some(s) = v.get("defaultRejoinReason").and_then(|x| x.as_str()) {
            out.default_rejoin_reason = s.to_string();
        }
        Ok(out)
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub busy_timeout_ms: u64,
}

impl EngineSettings {
    fn from_value(v: &Value) -> Self {
        Self {
            busy_timeout_ms: v
                .get("busyTimeoutMs")
                .and_then(|x| x.as_u64())
                .unwrap_or(5000),
        }
    }

    pub fn load(conn: &rusqlite::Connection) -> anyhow::Result<Self> {
        Ok(Self::from_value(&load_section(conn, SetupSection::Engine)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_until_patched() {
        let dir = tempfile::tempdir().unwrap();
        let conn = db::open_db(dir.path()).unwrap();
        assert!(PromotionSettings::load(&conn).unwrap().allow_cross_program);
        assert_eq!(
            StatusSettings::load(&conn).unwrap().default_rejoin_reason,
            "Rejoined"
        );

        let patch = json!({ "allowCrossProgram": false });
        update_section(&conn, SetupSection::Promotion, patch.as_object().unwrap())
            .unwrap()
            .unwrap();
        assert!(!PromotionSettings::load(&conn).unwrap().allow_cross_program);
    }

    #[test]
    fn unknown_and_out_of_range_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let conn = db::open_db(dir.path()).unwrap();
        let bad = json!({ "busyTimeoutMs": -1 });
        let res = update_section(&conn, SetupSection::Engine, bad.as_object().unwrap()).unwrap();
        assert!(res.is_err());
        let unknown = json!({ "requireSourceFilter": true });
        let res =
            update_section(&conn, SetupSection::Promotion, unknown.as_object().unwrap()).unwrap();
        assert!(res.unwrap_err().contains("unknown promotion field"));
        assert_eq!(EngineSettings::load(&conn).unwrap().busy_timeout_ms, 5000);
    }
}
