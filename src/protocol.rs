use serde_json::{Map, Value};

/// Close code sent and expected for an orderly shutdown.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Reported when the stream ends without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    PlanUpdate { text: String },
    CodeUpdate { text: String },
    ErrorUpdate { text: String },
    Completion,
}

impl InboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PlanUpdate { .. } => "plan",
            Self::CodeUpdate { .. } => "code",
            Self::ErrorUpdate { .. } => "error",
            Self::Completion => "completion",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("frame is not a JSON object: {0}")]
    NotStructured(String),
    #[error("frame carries none of plan, code, error, is_final")]
    Empty,
    #[error("field `{field}` must be a {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

/// Decodes one inbound frame into the updates it carries.
///
/// A frame may carry several kinds at once. They come back in fold order:
/// plan, code, error, then `Completion` when `is_final` is true. A frame that
/// only says `"is_final": false` is valid and yields no updates.
pub fn decode(raw: &str) -> Result<Vec<InboundMessage>, DecodeError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|err| DecodeError::NotStructured(err.to_string()))?;
    let fields = match value {
        Value::Object(fields) => fields,
        other => {
            return Err(DecodeError::NotStructured(format!(
                "expected object, got {}",
                json_type_name(&other)
            )))
        }
    };

    let plan = text_field(&fields, "plan")?;
    let code = text_field(&fields, "code")?;
    let error = text_field(&fields, "error")?;
    let is_final = match fields.get("is_final") {
        None | Some(Value::Null) => None,
        Some(Value::Bool(flag)) => Some(*flag),
        Some(_) => {
            return Err(DecodeError::InvalidField {
                field: "is_final",
                expected: "boolean",
            })
        }
    };

    if plan.is_none() && code.is_none() && error.is_none() && is_final.is_none() {
        return Err(DecodeError::Empty);
    }

    let mut updates = Vec::with_capacity(4);
    if let Some(text) = plan {
        updates.push(InboundMessage::PlanUpdate { text });
    }
    if let Some(text) = code {
        updates.push(InboundMessage::CodeUpdate { text });
    }
    if let Some(text) = error {
        updates.push(InboundMessage::ErrorUpdate { text });
    }
    if is_final == Some(true) {
        updates.push(InboundMessage::Completion);
    }
    Ok(updates)
}

fn text_field(
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, DecodeError> {
    match fields.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(_) => Err(DecodeError::InvalidField {
            field,
            expected: "string",
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
