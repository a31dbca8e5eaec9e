//! CRM contact attributes, including the bounded multi-value logs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Attribute accumulating the titles of every event a contact registered for.
pub const EVENTS_ATTRIBUTE: &str = "EVENTS";
/// Attribute accumulating the categories of those events.
pub const EVENT_CATEGORY_ATTRIBUTE: &str = "EVENT_CATEGORY";

const SEPARATOR: char = ',';

/// Ordered, append-only set of entries with a ceiling on its serialized length.
///
/// Serializes as a comma-joined string. Appending an entry that is already
/// present is a no-op; when the joined string would exceed `max_len` the
/// oldest entries are evicted first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeLog {
    entries: Vec<String>,
    max_len: usize,
}

impl AttributeLog {
    pub fn new(max_len: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_len,
        }
    }

    /// Parses a comma-joined attribute value, keeping the first occurrence of
    /// each entry.
    pub fn parse(value: &str, max_len: usize) -> Self {
        let mut log = Self::new(max_len);
        for entry in value.split(SEPARATOR) {
            log.push_entry(entry);
        }
        log.enforce_limit();
        log
    }

    /// Reads the log from a CRM attribute value of any JSON type.
    pub fn from_value(value: Option<&Value>, max_len: usize) -> Self {
        match value {
            Some(Value::String(s)) => Self::parse(s, max_len),
            Some(Value::Array(items)) => {
                let mut log = Self::new(max_len);
                for item in items {
                    if let Some(s) = item.as_str() {
                        log.push_entry(s);
                    }
                }
                log.enforce_limit();
                log
            }
            _ => Self::new(max_len),
        }
    }

    /// Appends an entry unless already present. Returns true if the log changed.
    pub fn append(&mut self, entry: &str) -> bool {
        let before = self.entries.clone();
        self.push_entry(entry);
        self.enforce_limit();
        self.entries != before
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, entry: &str) -> bool {
        let cleaned = clean_entry(entry);
        self.entries.iter().any(|e| *e == cleaned)
    }

    pub fn serialized_len(&self) -> usize {
        self.to_string().len()
    }

    fn push_entry(&mut self, entry: &str) {
        let cleaned = clean_entry(entry);
        if cleaned.is_empty() || self.entries.contains(&cleaned) {
            return;
        }
        self.entries.push(cleaned);
    }

    fn enforce_limit(&mut self) {
        while self.entries.len() > 1 && self.serialized_len() > self.max_len {
            self.entries.remove(0);
        }
        if let Some(only) = self.entries.first_mut() {
            if only.len() > self.max_len {
                let mut cut = self.max_len;
                while !only.is_char_boundary(cut) {
                    cut -= 1;
                }
                only.truncate(cut);
            }
        }
        self.entries.retain(|e| !e.is_empty());
    }
}

impl std::fmt::Display for AttributeLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.entries.join(","))
    }
}

fn clean_entry(entry: &str) -> String {
    entry.replace(SEPARATOR, " ").trim().to_string()
}

/// A contact as the CRM reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub email: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default, rename = "listIds")]
    pub list_ids: Vec<i64>,
}

impl Contact {
    /// Builds the attribute set to upsert for a new registration.
    ///
    /// Caller-supplied attributes are applied first, then `FIRSTNAME`, `SMS`
    /// and the two accumulated logs, which extend whatever the existing
    /// contact already carries.
    pub fn merged_attributes(
        existing: Option<&Contact>,
        name: &str,
        phone: Option<&str>,
        extra: &BTreeMap<String, Value>,
        event_title: &str,
        categories: &[String],
        max_len: usize,
    ) -> Map<String, Value> {
        let mut attributes = Map::new();
        for (key, value) in extra {
            let key = key.trim().to_uppercase();
            if key.is_empty() || key == EVENTS_ATTRIBUTE || key == EVENT_CATEGORY_ATTRIBUTE {
                continue;
            }
            attributes.insert(key, value.clone());
        }

        if !name.trim().is_empty() {
            attributes.insert("FIRSTNAME".to_string(), Value::String(name.trim().to_string()));
        }
        if let Some(phone) = phone.filter(|p| !p.trim().is_empty()) {
            attributes.insert("SMS".to_string(), Value::String(phone.trim().to_string()));
        }

        let current = existing.map(|c| &c.attributes);
        let mut events =
            AttributeLog::from_value(current.and_then(|a| a.get(EVENTS_ATTRIBUTE)), max_len);
        events.append(event_title);
        attributes.insert(EVENTS_ATTRIBUTE.to_string(), Value::String(events.to_string()));

        let mut event_categories = AttributeLog::from_value(
            current.and_then(|a| a.get(EVENT_CATEGORY_ATTRIBUTE)),
            max_len,
        );
        for category in categories {
            event_categories.append(category);
        }
        if !event_categories.is_empty() {
            attributes.insert(
                EVENT_CATEGORY_ATTRIBUTE.to_string(),
                Value::String(event_categories.to_string()),
            );
        }

        attributes
    }
}
