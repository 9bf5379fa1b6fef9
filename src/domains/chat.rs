use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Chat type sent with every recommendation request and reply selection.
pub const TEXT_CHAT: &str = "text";

fn default_sender() -> String {
    "fan".to_string()
}

// The backend writes `null` where it has nothing; read that as absent.

fn sender_or_fan<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_text(deserializer)?.unwrap_or_else(default_sender))
}

fn text_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    })
}

/// Numbers and numeric strings; anything else reads as no confidence.
fn lenient_confidence<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    })
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default = "default_sender", deserialize_with = "sender_or_fan")]
    pub sender: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub content: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    pub fn is_from_fan(&self) -> bool {
        self.sender == "fan"
    }

    /// Local wall-clock time of `created_at`, if it parses.
    pub fn time_label(&self) -> Option<String> {
        let raw = self.created_at.as_deref()?.trim();
        parse_timestamp(raw).map(|ts| ts.with_timezone(&Local).format("%H:%M:%S").to_string())
    }
}

/// Accepts RFC 3339 and the offset-less ISO form the backend writes for UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(default, deserialize_with = "text_or_empty")]
    pub content: String,
    #[serde(default, deserialize_with = "lenient_confidence")]
    pub confidence: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub chat_type: Option<String>,
    #[serde(default)]
    pub reply_id: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Recommendation {
    /// Backend filler emitted when generation failed upstream.
    pub fn is_placeholder(&self) -> bool {
        self.content.contains("Recommended reply") && self.content.contains("based on persona")
    }

    /// `"87%"`, or `"N/A"` when the backend sent no (or a zero) confidence.
    pub fn confidence_label(&self) -> String {
        match self.confidence {
            Some(value) if value != 0.0 && value.is_finite() => format!("{:.0}%", value * 100.0),
            _ => "N/A".to_string(),
        }
    }

    pub fn chat_type_label(&self) -> &str {
        self.chat_type
            .as_deref()
            .filter(|value| !value.is_empty())
            .unwrap_or(TEXT_CHAT)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct FanMessageRequest<'a> {
    pub fan_id: &'a Value,
    pub creator_id: &'a Value,
    pub content: &'a str,
}

#[derive(Clone, Debug, Serialize)]
pub struct RecommendationRequest<'a> {
    pub creator_id: &'a Value,
    pub fan_id: &'a Value,
    pub system_prompt_id: &'a Value,
    pub chat_type: &'a str,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReplySelection<'a> {
    pub fan_id: &'a Value,
    pub creator_id: &'a Value,
    pub reply_content: &'a str,
    pub reply_id: &'a Option<Value>,
    pub chat_type: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_defaults_sender_and_tolerates_extra_fields() {
        let message: ChatMessage =
            serde_json::from_value(json!({"content": "hi", "id": 7, "fan_id": "f1"})).unwrap();
        assert!(message.is_from_fan());
        assert_eq!(message.extra.get("id"), Some(&json!(7)));
        assert_eq!(message.time_label(), None);
    }

    #[test]
    fn null_fields_read_as_defaults() {
        let message: ChatMessage = serde_json::from_value(
            json!({"sender": null, "content": null, "created_at": null}),
        )
        .unwrap();
        assert!(message.is_from_fan());
        assert_eq!(message.content, "");
        assert_eq!(message.created_at, None);

        let rec: Recommendation =
            serde_json::from_value(json!({"content": null, "chat_type": null, "reply_id": null}))
                .unwrap();
        assert_eq!(rec.content, "");
        assert_eq!(rec.chat_type_label(), "text");
    }

    #[test]
    fn confidence_accepts_numeric_strings() {
        let rec: Recommendation =
            serde_json::from_value(json!({"content": "Hey!", "confidence": " 0.9 "})).unwrap();
        assert_eq!(rec.confidence, Some(0.9));
        assert_eq!(rec.confidence_label(), "90%");

        let rec: Recommendation =
            serde_json::from_value(json!({"content": "Hey!", "confidence": "high"})).unwrap();
        assert_eq!(rec.confidence_label(), "N/A");
    }

    #[test]
    fn parses_backend_timestamps() {
        assert!(parse_timestamp("2025-03-01T10:15:00.123456").is_some());
        assert!(parse_timestamp("2025-03-01T10:15:00+00:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn placeholder_needs_both_phrases() {
        let rec = |content: &str| Recommendation {
            content: content.to_string(),
            confidence: None,
            chat_type: None,
            reply_id: None,
            extra: Map::new(),
        };
        assert!(rec("Recommended reply based on persona: shy").is_placeholder());
        assert!(!rec("Recommended reply: hey there").is_placeholder());
        assert!(!rec("Hey, thanks for the tip!").is_placeholder());
    }

    #[test]
    fn confidence_label_matches_card_format() {
        let mut rec: Recommendation =
            serde_json::from_value(json!({"content": "hey", "confidence": 0.87})).unwrap();
        assert_eq!(rec.confidence_label(), "87%");
        rec.confidence = Some(0.0);
        assert_eq!(rec.confidence_label(), "N/A");
        assert_eq!(rec.chat_type_label(), "text");
    }

    #[test]
    fn reply_selection_serializes_missing_reply_id_as_null() {
        let fan = json!("f1");
        let creator = json!("c1");
        let body = serde_json::to_value(ReplySelection {
            fan_id: &fan,
            creator_id: &creator,
            reply_content: "thanks!",
            reply_id: &None,
            chat_type: TEXT_CHAT,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({
                "fan_id": "f1",
                "creator_id": "c1",
                "reply_content": "thanks!",
                "reply_id": null,
                "chat_type": "text"
            })
        );
    }
}
