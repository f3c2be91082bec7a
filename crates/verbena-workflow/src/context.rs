use serde_json::{Map, Value};

use crate::error::StepError;

/// Mutable state scoped to one workflow run.
///
/// The context is append-only: it is seeded from the triggering payload under
/// a single key, and each executed step records its output under its own step
/// id. Keys are never overwritten; later steps read earlier output through
/// dotted-path lookup (`"detect-language.languages.0.languageCode"`), with
/// numeric segments indexing into arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionContext {
  values: Map<String, Value>,
}

impl ExecutionContext {
  /// Create a context holding only the seed payload.
  pub fn seeded(key: impl Into<String>, seed: Value) -> Self {
    let mut values = Map::new();
    values.insert(key.into(), seed);
    Self { values }
  }

  /// Record a step's output under its key.
  ///
  /// # Errors
  /// Returns [`StepError::KeyConflict`] if the key was already recorded.
  pub fn record(&mut self, key: impl Into<String>, output: Value) -> Result<(), StepError> {
    let key = key.into();
    if self.values.contains_key(&key) {
      return Err(StepError::KeyConflict { key });
    }
    self.values.insert(key, output);
    Ok(())
  }

  /// Look up a value by dotted path.
  pub fn lookup(&self, path: &str) -> Option<&Value> {
    let mut segments = path.split('.');
    let mut current = self.values.get(segments.next()?)?;

    for segment in segments {
      current = match current {
        Value::Object(map) => map.get(segment)?,
        Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
        _ => return None,
      };
    }
    Some(current)
  }

  /// Return the first path that resolves, if any.
  ///
  /// Used where exclusive branches converge: exactly one branch has recorded
  /// its output, so the first resolving path is the one that ran.
  pub fn first(&self, paths: &[&str]) -> Option<&Value> {
    paths.iter().find_map(|p| self.lookup(p))
  }

  /// Clone the value at `path`.
  pub fn value_at(&self, path: &str) -> Result<Value, StepError> {
    self
      .lookup(path)
      .cloned()
      .ok_or_else(|| StepError::MissingValue {
        path: path.to_string(),
      })
  }

  /// Read a string at `path`.
  pub fn str_at(&self, path: &str) -> Result<String, StepError> {
    match self.lookup(path) {
      Some(Value::String(s)) => Ok(s.clone()),
      Some(other) => Err(StepError::InvalidValue {
        path: path.to_string(),
        message: format!("expected string, found {}", type_name(other)),
      }),
      None => Err(StepError::MissingValue {
        path: path.to_string(),
      }),
    }
  }

  /// Read a number at `path` as f64.
  pub fn f64_at(&self, path: &str) -> Result<f64, StepError> {
    match self.lookup(path) {
      Some(Value::Number(n)) => n.as_f64().ok_or_else(|| StepError::InvalidValue {
        path: path.to_string(),
        message: "number out of f64 range".to_string(),
      }),
      Some(other) => Err(StepError::InvalidValue {
        path: path.to_string(),
        message: format!("expected number, found {}", type_name(other)),
      }),
      None => Err(StepError::MissingValue {
        path: path.to_string(),
      }),
    }
  }

  /// Read a number at `path` as i64.
  pub fn i64_at(&self, path: &str) -> Result<i64, StepError> {
    match self.lookup(path) {
      Some(Value::Number(n)) => n.as_i64().ok_or_else(|| StepError::InvalidValue {
        path: path.to_string(),
        message: "number is not an integer".to_string(),
      }),
      Some(other) => Err(StepError::InvalidValue {
        path: path.to_string(),
        message: format!("expected integer, found {}", type_name(other)),
      }),
      None => Err(StepError::MissingValue {
        path: path.to_string(),
      }),
    }
  }

  /// Snapshot the whole context as a JSON object, for persistence.
  pub fn as_value(&self) -> Value {
    Value::Object(self.values.clone())
  }

  /// Rebuild a context from a persisted snapshot.
  pub fn from_value(value: Value) -> Result<Self, StepError> {
    match value {
      Value::Object(values) => Ok(Self { values }),
      other => Err(StepError::InvalidValue {
        path: String::new(),
        message: format!("persisted context must be an object, found {}", type_name(&other)),
      }),
    }
  }
}

fn type_name(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "bool",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}
