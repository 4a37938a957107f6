//! Property paths into a document's value tree
//!
//! Paths are dotted keys with optional sequence indices and quoted keys:
//!
//! ```text
//! spec.replicas
//! spec.template.spec.containers[0].image
//! metadata.labels["app.kubernetes.io/name"]
//! ```

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value as JsonValue};

use crate::error::{CoreError, Result};

/// Most nulls `set` will insert to reach an index past the end of a sequence
const MAX_PADDING: usize = 1024;

/// A single step in a [`PropertyPath`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Mapping key
    Key(String),
    /// Sequence index
    Index(usize),
}

/// Parsed property path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPath {
    segments: Vec<Segment>,
}

impl PropertyPath {
    /// Parse a path expression
    pub fn parse(path: &str) -> Result<Self> {
        let invalid = |message: &str| CoreError::InvalidPath {
            path: path.to_string(),
            message: message.to_string(),
        };

        let mut segments = Vec::new();
        let mut chars = path.chars().peekable();
        let mut expect_key = true;

        while let Some(&c) = chars.peek() {
            match c {
                '.' => {
                    if expect_key {
                        return Err(invalid("empty key"));
                    }
                    chars.next();
                    expect_key = true;
                    if chars.peek().is_none() {
                        return Err(invalid("trailing '.'"));
                    }
                }
                '[' => {
                    chars.next();
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        let mut key = String::new();
                        loop {
                            match chars.next() {
                                Some('"') => break,
                                Some('\\') => match chars.next() {
                                    Some(escaped) => key.push(escaped),
                                    None => return Err(invalid("unterminated quoted key")),
                                },
                                Some(other) => key.push(other),
                                None => return Err(invalid("unterminated quoted key")),
                            }
                        }
                        if chars.next() != Some(']') {
                            return Err(invalid("expected ']' after quoted key"));
                        }
                        segments.push(Segment::Key(key));
                    } else {
                        let mut digits = String::new();
                        loop {
                            match chars.next() {
                                Some(']') => break,
                                Some(d) if d.is_ascii_digit() => digits.push(d),
                                Some(_) => return Err(invalid("sequence index must be a number")),
                                None => return Err(invalid("unterminated '['")),
                            }
                        }
                        let index = digits
                            .parse()
                            .map_err(|_| invalid("sequence index must be a number"))?;
                        segments.push(Segment::Index(index));
                    }
                    expect_key = false;
                }
                _ => {
                    if !expect_key {
                        return Err(invalid("expected '.' or '[' between segments"));
                    }
                    let mut key = String::new();
                    while let Some(&k) = chars.peek() {
                        if k == '.' || k == '[' {
                            break;
                        }
                        key.push(k);
                        chars.next();
                    }
                    segments.push(Segment::Key(key));
                    expect_key = false;
                }
            }
        }

        if segments.is_empty() {
            return Err(invalid("path is empty"));
        }

        Ok(Self { segments })
    }

    /// The parsed segments
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// First key of the path, if it starts with a key
    pub fn root_key(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Key(k)) => Some(k),
            _ => None,
        }
    }

    /// Look up the value at this path
    pub fn get<'a>(&self, value: &'a JsonValue) -> Option<&'a JsonValue> {
        self.segments
            .iter()
            .try_fold(value, |current, segment| match (segment, current) {
                (Segment::Key(k), JsonValue::Object(map)) => map.get(k),
                (Segment::Index(i), JsonValue::Array(items)) => items.get(*i),
                _ => None,
            })
    }

    /// Look up the value at this path for modification
    pub fn get_mut<'a>(&self, value: &'a mut JsonValue) -> Option<&'a mut JsonValue> {
        let mut current = value;
        for segment in &self.segments {
            current = match (segment, current) {
                (Segment::Key(k), JsonValue::Object(map)) => map.get_mut(k)?,
                (Segment::Index(i), JsonValue::Array(items)) => items.get_mut(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Set the value at this path, creating intermediate mappings and sequences
    pub fn set(&self, value: &mut JsonValue, new_value: JsonValue) -> Result<()> {
        set_segments(value, &self.segments, new_value).map_err(|message| CoreError::InvalidPath {
            path: self.to_string(),
            message: message.to_string(),
        })
    }

    /// Remove and return the value at this path
    pub fn remove(&self, value: &mut JsonValue) -> Option<JsonValue> {
        let (last, parents) = self.segments.split_last()?;
        let mut parent = value;
        for segment in parents {
            parent = match (segment, parent) {
                (Segment::Key(k), JsonValue::Object(map)) => map.get_mut(k)?,
                (Segment::Index(i), JsonValue::Array(items)) => items.get_mut(*i)?,
                _ => return None,
            };
        }
        match (last, parent) {
            (Segment::Key(k), JsonValue::Object(map)) => map.shift_remove(k),
            (Segment::Index(i), JsonValue::Array(items)) if *i < items.len() => {
                Some(items.remove(*i))
            }
            _ => None,
        }
    }
}

fn set_segments(
    value: &mut JsonValue,
    path: &[Segment],
    new_value: JsonValue,
) -> std::result::Result<(), &'static str> {
    let Some((segment, remaining)) = path.split_first() else {
        *value = new_value;
        return Ok(());
    };

    match segment {
        Segment::Key(key) => {
            if !value.is_object() {
                *value = JsonValue::Object(Map::new());
            }
            match value {
                JsonValue::Object(map) => {
                    let entry = map.entry(key.clone()).or_insert(JsonValue::Null);
                    set_segments(entry, remaining, new_value)
                }
                _ => Ok(()),
            }
        }
        Segment::Index(index) => {
            let index = *index;
            let len = value.as_array().map_or(0, Vec::len);
            if index.saturating_sub(len) > MAX_PADDING {
                return Err("index is too far past the end of the sequence");
            }
            if !value.is_array() {
                *value = JsonValue::Array(Vec::new());
            }
            match value {
                JsonValue::Array(items) => {
                    if items.len() <= index {
                        items.resize(index + 1, JsonValue::Null);
                    }
                    set_segments(&mut items[index], remaining, new_value)
                }
                _ => Ok(()),
            }
        }
    }
}

impl FromStr for PropertyPath {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(k) if k.contains(['.', '[', ']', '"']) || k.is_empty() => {
                    write!(f, "[\"{}\"]", k.replace('\\', "\\\\").replace('"', "\\\""))?
                }
                Segment::Key(k) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(k)?;
                }
                Segment::Index(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}
