use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConsoleError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Creator,
    Fan,
    SystemPrompt,
}

/// Backend routes for one entity type.
#[derive(Clone, Debug)]
pub struct EndpointSet {
    pub entity_type: EntityType,
    pub list: &'static str,
    pub create: &'static str,
    pub update: &'static str,
    pub details: &'static str,
    pub details_method: Method,
    /// Key holding the sequence in the list response.
    pub collection_key: &'static str,
    /// Key holding the record in create/update/details responses.
    pub record_key: &'static str,
}

static ENDPOINTS: [EndpointSet; 3] = [
    EndpointSet {
        entity_type: EntityType::Creator,
        list: "/get_creators",
        create: "/create_creator",
        update: "/update_creator",
        details: "/get_creator_details",
        details_method: Method::GET,
        collection_key: "creators",
        record_key: "creator",
    },
    EndpointSet {
        entity_type: EntityType::Fan,
        list: "/get_fans",
        create: "/create_fan",
        update: "/update_fan",
        details: "/get_fan_details",
        details_method: Method::GET,
        collection_key: "fans",
        record_key: "fan",
    },
    EndpointSet {
        entity_type: EntityType::SystemPrompt,
        list: "/get_system_prompts",
        create: "/create_system_prompt",
        update: "/update_system_prompt",
        details: "/get_system_prompt_details",
        details_method: Method::POST,
        collection_key: "system_prompts",
        record_key: "system_prompt",
    },
];

impl EntityType {
    pub fn all() -> [EntityType; 3] {
        [EntityType::Creator, EntityType::Fan, EntityType::SystemPrompt]
    }

    pub fn key(self) -> &'static str {
        match self {
            EntityType::Creator => "creator",
            EntityType::Fan => "fan",
            EntityType::SystemPrompt => "system_prompt",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntityType::Creator => "Creator",
            EntityType::Fan => "Fan",
            EntityType::SystemPrompt => "System Prompt",
        }
    }

    pub fn plural_label(self) -> &'static str {
        match self {
            EntityType::Creator => "creators",
            EntityType::Fan => "fans",
            EntityType::SystemPrompt => "system prompts",
        }
    }

    /// Type-specific display name field, consulted after `name`.
    pub fn name_field(self) -> Option<&'static str> {
        match self {
            EntityType::Creator => Some("creator_name"),
            EntityType::Fan => Some("fan_name"),
            EntityType::SystemPrompt => None,
        }
    }

    pub fn endpoints(self) -> &'static EndpointSet {
        &ENDPOINTS[self.index()]
    }

    fn index(self) -> usize {
        match self {
            EntityType::Creator => 0,
            EntityType::Fan => 1,
            EntityType::SystemPrompt => 2,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for EntityType {
    type Err = ConsoleError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "creator" | "creators" => Ok(EntityType::Creator),
            "fan" | "fans" => Ok(EntityType::Fan),
            "system_prompt" | "system_prompts" | "prompt" | "prompts" => {
                Ok(EntityType::SystemPrompt)
            }
            other => Err(ConsoleError::UserInputInvalid(format!(
                "unknown entity type: {other}"
            ))),
        }
    }
}

/// Checks the endpoint table once at startup: every type maps to its own
/// entry, no route is shared between types, and no collection key is either.
pub fn validate_endpoint_table() -> Result<()> {
    check_endpoint_sets(&ENDPOINTS)
}

fn check_endpoint_sets(table: &[EndpointSet]) -> Result<()> {
    if table.len() != EntityType::all().len() {
        return Err(ConsoleError::Config(format!(
            "endpoint table has {} entries",
            table.len()
        )));
    }
    let mut routes = HashSet::new();
    let mut collection_keys = HashSet::new();
    for (entity_type, set) in EntityType::all().into_iter().zip(table) {
        if set.entity_type != entity_type {
            return Err(ConsoleError::Config(format!(
                "endpoint table entry for {entity_type} is misplaced"
            )));
        }
        if set.record_key != entity_type.key() {
            return Err(ConsoleError::Config(format!(
                "record key {} does not match {entity_type}",
                set.record_key
            )));
        }
        for route in [set.list, set.create, set.update, set.details] {
            if !route.starts_with('/') {
                return Err(ConsoleError::Config(format!(
                    "route {route} for {entity_type} must start with '/'"
                )));
            }
            if !routes.insert(route) {
                return Err(ConsoleError::Config(format!("route {route} is mapped twice")));
            }
        }
        if !collection_keys.insert(set.collection_key) {
            return Err(ConsoleError::Config(format!(
                "collection key {} is mapped twice",
                set.collection_key
            )));
        }
    }
    Ok(())
}

/// Opaque server-assigned identifier. Compared by its text form so `42` and
/// `"42"` name the same record.
#[derive(Clone, Debug)]
pub struct RecordId(Value);

impl RecordId {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(raw) if !raw.trim().is_empty() => Some(Self(value.clone())),
            Value::Number(_) => Some(Self(value.clone())),
            _ => None,
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn short(&self, len: usize) -> String {
        let text = self.to_string();
        if text.chars().count() > len {
            format!("{}...", text.chars().take(len).collect::<String>())
        } else {
            text
        }
    }
}

impl From<&str> for RecordId {
    fn from(raw: &str) -> Self {
        Self(Value::String(raw.trim().to_string()))
    }
}

impl From<String> for RecordId {
    fn from(raw: String) -> Self {
        Self::from(raw.as_str())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(raw) => f.write_str(raw),
            other => write!(f, "{other}"),
        }
    }
}

impl PartialEq for RecordId {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl Eq for RecordId {}

impl Serialize for RecordId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// One creator/fan/system-prompt instance. Field order is the server's.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(ConsoleError::Serialization(format!(
                "expected a record object, got {other}"
            ))),
        }
    }

    pub fn id(&self) -> Option<RecordId> {
        self.0.get("id").and_then(RecordId::from_value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Non-empty string value of `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn endpoint_table_is_valid() {
        validate_endpoint_table().unwrap();
        assert_eq!(EntityType::Fan.endpoints().update, "/update_fan");
        assert_eq!(EntityType::SystemPrompt.endpoints().details_method, Method::POST);
        assert_eq!(EntityType::SystemPrompt.endpoints().collection_key, "system_prompts");
    }

    #[test]
    fn collection_keys_are_checked_among_themselves() {
        let mut table = ENDPOINTS.clone();
        table[1].collection_key = "creators";
        let err = check_endpoint_sets(&table).unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration error: collection key creators is mapped twice"
        );

        // A collection key spelled like a route is not a route clash.
        let mut table = ENDPOINTS.clone();
        table[0].collection_key = "/get_fans";
        check_endpoint_sets(&table).unwrap();

        let mut table = ENDPOINTS.clone();
        table[2].update = "/update_fan";
        assert!(check_endpoint_sets(&table).is_err());
    }

    #[test]
    fn parses_entity_type_aliases() {
        assert_eq!("fans".parse::<EntityType>().unwrap(), EntityType::Fan);
        assert_eq!(
            "system-prompt".parse::<EntityType>().unwrap(),
            EntityType::SystemPrompt
        );
        assert!("chatter".parse::<EntityType>().is_err());
    }

    #[test]
    fn record_ids_compare_by_text() {
        let numeric = RecordId::from_value(&json!(42)).unwrap();
        let text = RecordId::from("42");
        assert_eq!(numeric, text);
        assert_eq!(numeric.as_value(), &json!(42));
        assert!(RecordId::from_value(&json!("")).is_none());
        assert!(RecordId::from_value(&json!(null)).is_none());
        assert_eq!(
            RecordId::from("0f8c2a9e-1111-2222").short(8),
            "0f8c2a9e..."
        );
    }

    #[test]
    fn record_keeps_server_field_order() {
        let record =
            Record::from_value(json!({"id": "c1", "zeta": 1, "alpha": 2, "creator_name": "Ana"}))
                .unwrap();
        let keys: Vec<&str> = record.fields().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["id", "zeta", "alpha", "creator_name"]);
        assert_eq!(record.id().unwrap().to_string(), "c1");
        assert!(Record::from_value(json!([1, 2])).is_err());
    }
}
