use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Unique record identifier, carried over from the source dataset.
pub type RecordId = String;

/// A raw input row keyed by external field name, before mapping.
pub type RawRow = IndexMap<String, FieldValue>;

/// One business entity (a project, a KPI line) with categorical dimensions
/// and numeric metrics. Missing values are stored as `None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub dimensions: IndexMap<String, Option<String>>,
    pub metrics: IndexMap<String, Option<f64>>,
}

impl Record {
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            dimensions: IndexMap::new(),
            metrics: IndexMap::new(),
        }
    }

    pub fn with_dimension(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions.insert(field.into(), Some(value.into()));
        self
    }

    pub fn with_missing_dimension(mut self, field: impl Into<String>) -> Self {
        self.dimensions.insert(field.into(), None);
        self
    }

    pub fn with_metric(mut self, field: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(field.into(), Some(value));
        self
    }

    /// Categorical value of a dimension field. Blank strings count as missing.
    pub fn dimension(&self, field: &str) -> Option<&str> {
        self.dimensions
            .get(field)
            .and_then(|v| v.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Numeric value of a metric field. NaN and infinities count as missing.
    pub fn metric(&self, field: &str) -> Option<f64> {
        self.metrics
            .get(field)
            .copied()
            .flatten()
            .filter(|v| v.is_finite())
    }
}

/// Typed field values. Source rows arrive loosely typed; we preserve what we can.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
}

impl FieldValue {
    /// Render as a categorical value. Null and blank text are missing.
    pub fn to_category(&self) -> Option<String> {
        match self {
            FieldValue::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_owned())
            }
            FieldValue::Integer(i) => Some(i.to_string()),
            FieldValue::Float(f) if f.is_finite() => Some(f.to_string()),
            FieldValue::Float(_) => None,
            FieldValue::Boolean(b) => Some(b.to_string()),
            FieldValue::Null => None,
        }
    }

    /// Interpret as a number. Numeric text is parsed; anything else is missing.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            FieldValue::Integer(i) => *i as f64,
            FieldValue::Float(f) => *f,
            FieldValue::Text(s) => s.trim().parse::<f64>().ok()?,
            FieldValue::Boolean(_) | FieldValue::Null => return None,
        };
        value.is_finite().then_some(value)
    }
}

impl From<&serde_json::Value> for FieldValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => FieldValue::Text(s.clone()),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => n.as_f64().map(FieldValue::Float).unwrap_or(FieldValue::Null),
            },
            serde_json::Value::Bool(b) => FieldValue::Boolean(*b),
            serde_json::Value::Null => FieldValue::Null,
            // Nested structures have no categorical meaning.
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => FieldValue::Null,
        }
    }
}
