use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key/value preference row. The timetable core never interprets `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

impl Setting {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            id: None,
            key: key.into(),
            value: value.into(),
        }
    }
}
