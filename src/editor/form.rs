use serde_json::{Map, Number, Value};

use super::fields::{describe, FieldDescriptor, FieldKind};
use crate::cards::value_text;
use crate::domains::entity::Record;
use crate::error::{ConsoleError, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListEntry {
    /// Stable key so one entry can be removed among equal values.
    pub key: u64,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldInput {
    Text(String),
    Flag(bool),
    List(Vec<ListEntry>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FormField {
    pub descriptor: FieldDescriptor,
    pub input: FieldInput,
}

/// Working copy of a record's editable fields.
#[derive(Clone, Debug, PartialEq)]
pub struct EditForm {
    fields: Vec<FormField>,
    next_key: u64,
}

impl EditForm {
    pub fn from_record(record: &Record) -> Self {
        let mut next_key = 0;
        let fields = describe(record)
            .into_iter()
            .map(|descriptor| {
                let value = record.get(&descriptor.name).unwrap_or(&Value::Null);
                let input = match descriptor.kind {
                    FieldKind::Boolean => FieldInput::Flag(value.as_bool().unwrap_or(false)),
                    FieldKind::StringArray => {
                        let items = value.as_array().cloned().unwrap_or_default();
                        FieldInput::List(
                            items
                                .iter()
                                .map(|item| {
                                    next_key += 1;
                                    ListEntry {
                                        key: next_key,
                                        value: value_text(item),
                                    }
                                })
                                .collect(),
                        )
                    }
                    FieldKind::Structured => {
                        FieldInput::Text(serde_json::to_string_pretty(value).unwrap_or_default())
                    }
                    FieldKind::Text { .. } | FieldKind::LongText => {
                        FieldInput::Text(value_text(value))
                    }
                };
                FormField { descriptor, input }
            })
            .collect();
        Self { fields, next_key }
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|field| field.descriptor.name == name)
    }

    fn input_mut(&mut self, name: &str) -> Option<&mut FieldInput> {
        self.fields
            .iter_mut()
            .find(|field| field.descriptor.name == name)
            .map(|field| &mut field.input)
    }

    pub fn set_text(&mut self, name: &str, value: impl Into<String>) -> bool {
        match self.input_mut(name) {
            Some(FieldInput::Text(text)) => {
                *text = value.into();
                true
            }
            _ => false,
        }
    }

    pub fn set_flag(&mut self, name: &str, value: bool) -> bool {
        match self.input_mut(name) {
            Some(FieldInput::Flag(flag)) => {
                *flag = value;
                true
            }
            _ => false,
        }
    }

    pub fn toggle_flag(&mut self, name: &str) -> bool {
        match self.input_mut(name) {
            Some(FieldInput::Flag(flag)) => {
                *flag = !*flag;
                true
            }
            _ => false,
        }
    }

    pub fn set_item(&mut self, name: &str, key: u64, value: impl Into<String>) -> bool {
        match self.input_mut(name) {
            Some(FieldInput::List(entries)) => match entries.iter_mut().find(|e| e.key == key) {
                Some(entry) => {
                    entry.value = value.into();
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    /// Appends an empty entry and returns its key.
    pub fn add_item(&mut self, name: &str) -> Option<u64> {
        let key = self.next_key + 1;
        match self.input_mut(name) {
            Some(FieldInput::List(entries)) => {
                entries.push(ListEntry {
                    key,
                    value: String::new(),
                });
            }
            _ => return None,
        }
        self.next_key = key;
        Some(key)
    }

    pub fn remove_item(&mut self, name: &str, key: u64) -> bool {
        match self.input_mut(name) {
            Some(FieldInput::List(entries)) => {
                let before = entries.len();
                entries.retain(|entry| entry.key != key);
                entries.len() != before
            }
            _ => false,
        }
    }

    /// Sets a field from text. Flags take `true/false/yes/no/1/0`; lists
    /// take comma-separated items and replace the current entries.
    pub fn assign(&mut self, name: &str, raw: &str) -> Result<()> {
        let kind = self
            .field(name)
            .ok_or_else(|| unknown_field(name))?
            .descriptor
            .kind;
        match kind {
            FieldKind::Text { .. } | FieldKind::LongText | FieldKind::Structured => {
                self.set_text(name, raw);
            }
            FieldKind::Boolean => {
                let flag = parse_flag(raw).ok_or_else(|| {
                    ConsoleError::UserInputInvalid(format!("{name} expects yes or no, got {raw}"))
                })?;
                self.set_flag(name, flag);
            }
            FieldKind::StringArray => {
                if let Some(FieldInput::List(entries)) = self.input_mut(name) {
                    entries.clear();
                }
                for item in raw.split(',').filter(|item| !item.trim().is_empty()) {
                    self.push_item(name, item)?;
                }
            }
        }
        Ok(())
    }

    /// Appends `value` to a list field.
    pub fn push_item(&mut self, name: &str, value: &str) -> Result<()> {
        let key = self.add_item(name).ok_or_else(|| not_a_list(name))?;
        self.set_item(name, key, value.trim());
        Ok(())
    }

    /// Removes every entry of a list field equal to `value`. Returns how many went.
    pub fn remove_value(&mut self, name: &str, value: &str) -> Result<usize> {
        let keys: Vec<u64> = match self.field(name).map(|field| &field.input) {
            Some(FieldInput::List(entries)) => entries
                .iter()
                .filter(|entry| entry.value.trim() == value.trim())
                .map(|entry| entry.key)
                .collect(),
            Some(_) => return Err(not_a_list(name)),
            None => return Err(unknown_field(name)),
        };
        for key in &keys {
            self.remove_item(name, *key);
        }
        Ok(keys.len())
    }

    /// Typed field values, ready to send. Does not include `id`.
    pub fn payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        for field in &self.fields {
            let value = match (&field.input, field.descriptor.kind) {
                (FieldInput::Flag(flag), _) => Value::Bool(*flag),
                (FieldInput::List(entries), _) => Value::Array(
                    entries
                        .iter()
                        .map(|entry| entry.value.trim())
                        .filter(|value| !value.is_empty())
                        .map(|value| Value::String(value.to_string()))
                        .collect(),
                ),
                (FieldInput::Text(raw), FieldKind::Text { was_null: true })
                    if raw.trim().is_empty() =>
                {
                    Value::Null
                }
                (FieldInput::Text(raw), _) => coerce_text(raw),
            };
            payload.insert(field.descriptor.name.clone(), value);
        }
        payload
    }
}

fn unknown_field(name: &str) -> ConsoleError {
    ConsoleError::UserInputInvalid(format!("no editable field named {name}"))
}

fn not_a_list(name: &str) -> ConsoleError {
    ConsoleError::UserInputInvalid(format!("{name} is not a list field"))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "on" => Some(true),
        "false" | "no" | "n" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn parse_number(trimmed: &str) -> Option<Number> {
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Some(Number::from(integer));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .and_then(Number::from_f64)
}

/// Form text to JSON: whole-text numbers become numbers, text opening with
/// `[` or `{` becomes parsed JSON when it parses, everything else stays a string.
pub fn coerce_text(raw: &str) -> Value {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        if let Some(number) = parse_number(trimmed) {
            return Value::Number(number);
        }
    }
    if raw.starts_with('[') || raw.starts_with('{') {
        if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
            return parsed;
        }
    }
    Value::String(raw.to_string())
}
