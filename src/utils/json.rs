use serde_json::Value;

/// How a field showed up in a PATCH body.
#[derive(Debug, PartialEq)]
pub enum NullableValue {
    Omitted,
    Null,
    String(String),
}

impl NullableValue {
    /// Column edit for a nullable text column: omitted leaves it alone, `null`
    /// or a blank string clears it.
    pub fn into_nullable_change(self) -> Option<Option<String>> {
        match self {
            NullableValue::Omitted => None,
            NullableValue::Null => Some(None),
            NullableValue::String(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    Some(None)
                } else {
                    Some(Some(trimmed.to_string()))
                }
            }
        }
    }

    /// Column edit for a required text column: `null` and blank strings are
    /// rejected with a message naming `field`.
    pub fn into_required_change(self, field: &str) -> Result<Option<String>, String> {
        match self {
            NullableValue::Omitted => Ok(None),
            NullableValue::Null => Err(format!("{field} cannot be null")),
            NullableValue::String(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    Err(format!("{field} cannot be empty"))
                } else {
                    Ok(Some(trimmed.to_string()))
                }
            }
        }
    }
}

pub fn classify_nullable(optional_value: Option<&Value>) -> Result<NullableValue, String> {
    match optional_value {
        None => Ok(NullableValue::Omitted),
        Some(Value::Null) => Ok(NullableValue::Null),
        Some(Value::String(s)) => Ok(NullableValue::String(s.to_owned())),
        Some(other) => Err(format!("expected string or null, got {other}")),
    }
}
