use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{ExtractionChannel, ExtractionError};

/// Scalar value the extraction service can report for a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

/// One field as reported by a channel. `value: None` means "not found".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionField {
    pub value: Option<FieldValue>,
    #[serde(default, alias = "accuracy")]
    pub confidence: f32,
}

impl ExtractionField {
    /// Confidence is only meaningful for a found value.
    pub fn confidence(&self) -> Option<f32> {
        self.value.as_ref().map(|_| self.confidence.clamp(0.0, 1.0))
    }

    fn into_value(self) -> Value {
        match self.value {
            Some(FieldValue::Number(number)) => {
                serde_json::Number::from_f64(number).map_or(Value::Null, Value::Number)
            }
            Some(FieldValue::Text(text)) => Value::String(text),
            None => Value::Null,
        }
    }
}

/// Flattened channel output: every field reduced to its bare value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedFields {
    fields: BTreeMap<String, Value>,
    mean_accuracy: Option<f32>,
}

impl NormalizedFields {
    pub fn from_map(fields: BTreeMap<String, Value>) -> Self {
        Self {
            fields,
            mean_accuracy: None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Non-blank text value for `key`; numbers are rendered as text.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        }
    }

    /// Numeric value for `key`, accepting numeric strings such as `"1.75"`.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.fields.get(key)? {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn list(&self, key: &str) -> Vec<Value> {
        match self.fields.get(key) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    pub fn mean_accuracy(&self) -> Option<f32> {
        self.mean_accuracy
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True when every value is null, blank text, or an empty list.
    pub fn is_blank(&self) -> bool {
        self.fields.values().all(is_blank)
    }

    pub fn to_json_map(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Flatten a channel response, returning `None` when nothing was extracted.
pub fn normalize_response(
    channel: ExtractionChannel,
    body: Value,
) -> Result<Option<NormalizedFields>, ExtractionError> {
    let Value::Object(entries) = body else {
        return Err(ExtractionError::BadResponseShape(format!(
            "{} channel returned a non-object body",
            channel.label()
        )));
    };

    let mut fields = BTreeMap::new();
    let mut accuracy_total = 0.0_f32;
    let mut accuracy_count = 0_u32;

    for (key, raw) in entries {
        let value = if raw.is_object() && raw.get("value").is_some() {
            let field: ExtractionField = serde_json::from_value(raw).map_err(|err| {
                ExtractionError::BadResponseShape(format!("field '{key}': {err}"))
            })?;
            if let Some(confidence) = field.confidence() {
                debug!(channel = channel.label(), field = %key, confidence, "extracted field");
                accuracy_total += confidence;
                accuracy_count += 1;
            }
            field.into_value()
        } else {
            raw
        };
        fields.insert(key, value);
    }

    let normalized = NormalizedFields {
        fields,
        mean_accuracy: (accuracy_count > 0).then(|| accuracy_total / accuracy_count as f32),
    };

    if normalized.is_blank() {
        debug!(channel = channel.label(), "extraction returned no data");
        return Ok(None);
    }

    Ok(Some(normalized))
}
