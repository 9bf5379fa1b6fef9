use serde_json::{json, Value};

use crate::cards::value_text;
use crate::domains::entity::{EntityType, Record};

/// Fields that never appear as editable inputs.
pub const READ_ONLY_FIELDS: [&str; 3] = ["id", "created_at", "updated_at"];
pub const PROMPT_FIELD: &str = "system_prompt";
pub const LONG_TEXT_THRESHOLD: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Single-line input. `was_null` remembers a null source value.
    Text { was_null: bool },
    LongText,
    Boolean,
    StringArray,
    /// JSON object edited as pretty-printed text.
    Structured,
}

impl FieldKind {
    pub fn infer(name: &str, value: &Value) -> Self {
        match value {
            Value::Null => FieldKind::Text { was_null: true },
            Value::Bool(_) => FieldKind::Boolean,
            Value::Array(_) => FieldKind::StringArray,
            Value::Object(_) => FieldKind::Structured,
            other => {
                if name == PROMPT_FIELD || value_text(other).chars().count() > LONG_TEXT_THRESHOLD {
                    FieldKind::LongText
                } else {
                    FieldKind::Text { was_null: false }
                }
            }
        }
    }

    pub fn is_multiline(self) -> bool {
        matches!(self, FieldKind::LongText | FieldKind::Structured)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
}

pub fn is_read_only(name: &str) -> bool {
    READ_ONLY_FIELDS.contains(&name)
}

/// One descriptor per editable field, in record order.
pub fn describe(record: &Record) -> Vec<FieldDescriptor> {
    record
        .fields()
        .filter(|(name, _)| !is_read_only(name))
        .map(|(name, value)| FieldDescriptor {
            name: name.clone(),
            label: field_label(name),
            kind: FieldKind::infer(name, value),
        })
        .collect()
}

/// `lifetime_spend` → `Lifetime Spend`.
pub fn field_label(name: &str) -> String {
    let spaced = name.replace(['_', '-'], " ");
    let mut label = String::with_capacity(spaced.len());
    let mut at_boundary = true;
    for ch in spaced.chars() {
        if ch.is_alphanumeric() {
            if at_boundary {
                label.extend(ch.to_uppercase());
            } else {
                label.push(ch);
            }
            at_boundary = false;
        } else {
            label.push(ch);
            at_boundary = true;
        }
    }
    label
}

pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "N/A".to_string(),
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(", "),
        Value::Object(_) => serde_json::to_string_pretty(value).unwrap_or_default(),
        other => value_text(other),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DetailRow {
    pub name: String,
    pub label: String,
    pub value: String,
    pub preformatted: bool,
}

/// Read-only rows for every field except `id`.
pub fn detail_rows(record: &Record) -> Vec<DetailRow> {
    record
        .fields()
        .filter(|(name, _)| name.as_str() != "id")
        .map(|(name, value)| {
            let formatted = format_value(value);
            let preformatted = value.is_object()
                || (name == PROMPT_FIELD && formatted.chars().count() > LONG_TEXT_THRESHOLD);
            DetailRow {
                name: name.clone(),
                label: field_label(name),
                value: formatted,
                preformatted,
            }
        })
        .collect()
}

fn known_fields(entity_type: EntityType) -> Record {
    let value = match entity_type {
        EntityType::Creator => json!({
            "creator_name": "",
            "niches": [],
            "persona": [],
            "nsfw": false,
            "emojis_enabled": false
        }),
        EntityType::Fan => json!({
            "fan_name": "",
            "lifetime_spend": 0
        }),
        EntityType::SystemPrompt => json!({
            "system_prompt": ""
        }),
    };
    Record::from_value(value).unwrap_or_default()
}

fn blank_like(value: &Value) -> Value {
    match value {
        Value::Array(_) => json!([]),
        Value::Bool(_) => json!(false),
        Value::Number(_) => json!(0),
        _ => json!(""),
    }
}

/// Blank record for a create form: the known fields, then every other field
/// seen on `sample`, each defaulted by the sample value's shape.
pub fn skeleton(entity_type: EntityType, sample: Option<&Record>) -> Record {
    let mut record = known_fields(entity_type);
    if let Some(sample) = sample {
        for (name, value) in sample.fields() {
            if is_read_only(name) || record.contains_key(name) {
                continue;
            }
            record.insert(name.clone(), blank_like(value));
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    #[test]
    fn infers_widget_kinds_from_values() {
        let long = "y".repeat(101);
        let rec = record(json!({
            "id": "c1",
            "created_at": "2025-01-01",
            "updated_at": "2025-01-02",
            "creator_name": "Ana",
            "bio": long,
            "system_prompt": "short",
            "nsfw": true,
            "niches": ["a"],
            "settings": {"tone": "warm"},
            "nickname": null,
            "age": 29
        }));
        let kinds: Vec<(String, FieldKind)> = describe(&rec)
            .into_iter()
            .map(|descriptor| (descriptor.name, descriptor.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("creator_name".to_string(), FieldKind::Text { was_null: false }),
                ("bio".to_string(), FieldKind::LongText),
                ("system_prompt".to_string(), FieldKind::LongText),
                ("nsfw".to_string(), FieldKind::Boolean),
                ("niches".to_string(), FieldKind::StringArray),
                ("settings".to_string(), FieldKind::Structured),
                ("nickname".to_string(), FieldKind::Text { was_null: true }),
                ("age".to_string(), FieldKind::Text { was_null: false }),
            ]
        );
    }

    #[test]
    fn labels_capitalize_each_word() {
        assert_eq!(field_label("lifetime_spend"), "Lifetime Spend");
        assert_eq!(field_label("emojis_enabled"), "Emojis Enabled");
        assert_eq!(field_label("persona-tone"), "Persona Tone");
        assert_eq!(field_label("id"), "Id");
    }

    #[test]
    fn detail_rows_skip_only_id() {
        let body = "z".repeat(120);
        let rows = detail_rows(&record(json!({
            "id": "p1",
            "system_prompt": body,
            "created_at": "2025-01-01T00:00:00",
            "active": false,
            "tags": ["a", "b"],
            "owner": null
        })));
        let names: Vec<&str> = rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, vec!["system_prompt", "created_at", "active", "tags", "owner"]);
        assert!(rows[0].preformatted);
        assert!(!rows[1].preformatted);
        assert_eq!(rows[2].value, "No");
        assert_eq!(rows[3].value, "a, b");
        assert_eq!(rows[4].value, "N/A");
    }

    #[test]
    fn skeleton_without_sample_uses_known_fields() {
        let fan = skeleton(EntityType::Fan, None);
        assert_eq!(fan.into_value(), json!({"fan_name": "", "lifetime_spend": 0}));
    }

    #[test]
    fn skeleton_discovers_extra_fields_from_sample() {
        let sample = record(json!({
            "id": "c1",
            "creator_name": "Ana",
            "created_at": "2025-01-01",
            "tier": 3,
            "tags": ["vip"],
            "verified": true,
            "notes": null,
            "meta": {"a": 1}
        }));
        let blank = skeleton(EntityType::Creator, Some(&sample));
        assert_eq!(
            blank.into_value(),
            json!({
                "creator_name": "",
                "niches": [],
                "persona": [],
                "nsfw": false,
                "emojis_enabled": false,
                "tier": 0,
                "tags": [],
                "verified": false,
                "notes": "",
                "meta": ""
            })
        );
    }
}
