//! Label and annotation capabilities

use std::collections::BTreeMap;

use serde_json::{Map, Value as JsonValue};

use crate::document::Document;

/// Documents that carry `metadata.labels`
pub trait Labelable {
    /// All labels, sorted by key
    fn labels(&self) -> BTreeMap<String, String>;

    fn label(&self, key: &str) -> Option<&str>;

    fn set_label(&mut self, key: impl Into<String>, value: impl Into<String>);

    fn remove_label(&mut self, key: &str) -> Option<String>;

    /// Builder-style [`Labelable::set_label`]
    fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self
    where
        Self: Sized,
    {
        self.set_label(key, value);
        self
    }
}

/// Documents that carry `metadata.annotations`
pub trait Annotatable {
    /// All annotations, sorted by key
    fn annotations(&self) -> BTreeMap<String, String>;

    fn annotation(&self, key: &str) -> Option<&str>;

    fn set_annotation(&mut self, key: impl Into<String>, value: impl Into<String>);

    fn remove_annotation(&mut self, key: &str) -> Option<String>;

    /// Builder-style [`Annotatable::set_annotation`]
    fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self
    where
        Self: Sized,
    {
        self.set_annotation(key, value);
        self
    }
}

impl Document {
    fn string_map(&self, field: &str) -> BTreeMap<String, String> {
        self.as_value()["metadata"][field]
            .as_object()
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn string_entry(&self, field: &str, key: &str) -> Option<&str> {
        self.as_value()["metadata"][field]
            .get(key)
            .and_then(|v| v.as_str())
    }

    fn insert_string_entry(&mut self, field: &str, key: String, value: String) {
        let Some(metadata) = self.root_mut()["metadata"].as_object_mut() else {
            return;
        };
        let entry = metadata
            .entry(field.to_string())
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if !entry.is_object() {
            *entry = JsonValue::Object(Map::new());
        }
        if let JsonValue::Object(map) = entry {
            map.insert(key, JsonValue::String(value));
        }
    }

    fn remove_string_entry(&mut self, field: &str, key: &str) -> Option<String> {
        let metadata = self.root_mut()["metadata"].as_object_mut()?;
        let map = metadata.get_mut(field)?.as_object_mut()?;
        let removed = map.shift_remove(key)?;
        if map.is_empty() {
            metadata.shift_remove(field);
        }
        match removed {
            JsonValue::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }
}

impl Labelable for Document {
    fn labels(&self) -> BTreeMap<String, String> {
        self.string_map("labels")
    }

    fn label(&self, key: &str) -> Option<&str> {
        self.string_entry("labels", key)
    }

    fn set_label(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.insert_string_entry("labels", key.into(), value.into());
    }

    fn remove_label(&mut self, key: &str) -> Option<String> {
        self.remove_string_entry("labels", key)
    }
}

impl Annotatable for Document {
    fn annotations(&self) -> BTreeMap<String, String> {
        self.string_map("annotations")
    }

    fn annotation(&self, key: &str) -> Option<&str> {
        self.string_entry("annotations", key)
    }

    fn set_annotation(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.insert_string_entry("annotations", key.into(), value.into());
    }

    fn remove_annotation(&mut self, key: &str) -> Option<String> {
        self.remove_string_entry("annotations", key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        let mut doc = Document::new("v1", "ConfigMap", "settings")
            .with_label("app.kubernetes.io/name", "shop")
            .with_label("tier", "backend");

        assert_eq!(doc.label("tier"), Some("backend"));
        assert_eq!(doc.labels().len(), 2);
        assert_eq!(
            doc.get_str(r#"metadata.labels["app.kubernetes.io/name"]"#),
            Some("shop")
        );

        assert_eq!(doc.remove_label("tier"), Some("backend".to_string()));
        assert_eq!(doc.remove_label("tier"), None);
        doc.remove_label("app.kubernetes.io/name");
        assert!(doc.get("metadata.labels").is_none());
    }

    #[test]
    fn test_annotations() {
        let mut doc = Document::new("apps/v1", "Deployment", "web");
        assert!(doc.annotations().is_empty());
        assert_eq!(doc.annotation("missing"), None);

        doc.set_annotation("kforge.io/depends-on", "ConfigMap/settings");
        assert_eq!(
            doc.annotation("kforge.io/depends-on"),
            Some("ConfigMap/settings")
        );
        assert!(doc.labels().is_empty());
    }
}
