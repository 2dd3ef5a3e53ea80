use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared_types::ValidationError;
use std::fmt;
use std::str::FromStr;

/// One step of a field path. `each` is set for `name[]` segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub key: String,
    pub each: bool,
}

/// Dotted path into a bill record, e.g. `sections[].line_items[].amount`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn parse(path: &str) -> Result<Self, ValidationError> {
        let raw = path.trim();
        if raw.is_empty() {
            return Err(invalid(path, "path is empty"));
        }

        let mut segments = Vec::new();
        for part in raw.split('.') {
            let (key, each) = match part.strip_suffix("[]") {
                Some(key) => (key, true),
                None => (part, false),
            };

            if key.is_empty() {
                return Err(invalid(path, "empty segment"));
            }
            if key.contains(['[', ']']) {
                return Err(invalid(path, "brackets are only allowed as a trailing []"));
            }
            if key.chars().any(char::is_whitespace) {
                return Err(invalid(path, "segments cannot contain whitespace"));
            }

            segments.push(Segment {
                key: key.to_string(),
                each,
            });
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the path fans out over an array
    pub fn is_collection(&self) -> bool {
        self.segments.iter().any(|s| s.each)
    }

    /// Every value the path reaches. Missing keys and non-array `[]`
    /// targets contribute nothing.
    pub fn resolve<'a>(&self, record: &'a Value) -> Vec<&'a Value> {
        let mut out = Vec::new();
        collect(record, &self.segments, &mut out);
        out
    }

    /// Value at a scalar path
    pub fn get<'a>(&self, record: &'a Value) -> Option<&'a Value> {
        if self.is_collection() {
            return None;
        }
        self.resolve(record).into_iter().next()
    }

    /// Write `value` at a scalar path, creating missing intermediate objects
    pub fn set(&self, record: &mut Value, value: Value) -> Result<(), ValidationError> {
        if self.is_collection() {
            return Err(invalid(&self.raw, "cannot assign through []"));
        }

        let mut current = record;
        let (last, parents) = self
            .segments
            .split_last()
            .ok_or_else(|| invalid(&self.raw, "path is empty"))?;

        for segment in parents {
            let obj = current
                .as_object_mut()
                .ok_or_else(|| invalid(&self.raw, "parent is not an object"))?;
            let child = obj
                .entry(segment.key.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if child.is_null() {
                *child = Value::Object(Map::new());
            }
            current = child;
        }

        let obj = current
            .as_object_mut()
            .ok_or_else(|| invalid(&self.raw, "parent is not an object"))?;
        obj.insert(last.key.clone(), value);
        Ok(())
    }
}

fn collect<'a>(value: &'a Value, segments: &[Segment], out: &mut Vec<&'a Value>) {
    let Some((first, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };

    let Some(child) = value.as_object().and_then(|obj| obj.get(&first.key)) else {
        return;
    };

    if first.each {
        if let Some(items) = child.as_array() {
            for item in items {
                collect(item, rest, out);
            }
        }
    } else {
        collect(child, rest, out);
    }
}

fn invalid(path: &str, reason: &str) -> ValidationError {
    ValidationError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for FieldPath {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.raw
    }
}
