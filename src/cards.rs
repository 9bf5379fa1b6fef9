//! Summary cards for the three entity lists.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::domains::entity::{EntityType, Record, RecordId};
use crate::store::EntityStore;

const PREVIEW_CHARS: usize = 100;
const SHORT_ID_CHARS: usize = 8;

static LEADING_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").expect("leading number pattern")
});

#[derive(Clone, Debug, PartialEq)]
pub struct Badge {
    pub text: String,
    pub highlight: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Card {
    pub entity_type: EntityType,
    pub id: Option<RecordId>,
    pub title: String,
    pub badges: Vec<Badge>,
    pub preview: Option<String>,
    pub selected: bool,
}

/// Plain text for a scalar or list item.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `name`, then the type's own name field, then `"{Type} {id}"`.
pub fn display_name(entity_type: EntityType, record: &Record) -> String {
    if let Some(name) = record.get_str("name") {
        return name.to_string();
    }
    if let Some(name) = entity_type.name_field().and_then(|field| record.get_str(field)) {
        return name.to_string();
    }
    let id = record.id().map(|id| id.to_string()).unwrap_or_default();
    format!("{} {id}", entity_type.label())
}

/// Numeric reading of a loosely typed field; anything unreadable is zero.
pub fn coerce_number(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(raw)) => LEADING_NUMBER
            .find(raw.trim_start())
            .and_then(|found| found.as_str().parse::<f64>().ok()),
        _ => None,
    };
    parsed.filter(|number| number.is_finite()).unwrap_or(0.0)
}

fn joined(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .map(value_text)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
        Some(Value::Null) | None => None,
        Some(Value::Bool(false)) => None,
        Some(other) => Some(value_text(other)),
    }
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

pub fn card(entity_type: EntityType, record: &Record, selected: bool) -> Card {
    let id = record.id();
    let mut badges = Vec::new();
    let mut preview = None;

    let title = match entity_type {
        EntityType::Creator => {
            let niches = joined(record.get("niches")).unwrap_or_else(|| "N/A".to_string());
            badges.push(Badge {
                text: format!("Niche: {niches}"),
                highlight: false,
            });
            if let Some(persona) = joined(record.get("persona")).filter(|p| !p.is_empty()) {
                badges.push(Badge {
                    text: format!("Persona: {persona}"),
                    highlight: false,
                });
            }
            display_name(entity_type, record)
        }
        EntityType::Fan => {
            let spend = coerce_number(record.get("lifetime_spend"));
            badges.push(Badge {
                text: format!("Lifetime Spend: ${spend:.2}"),
                highlight: true,
            });
            display_name(entity_type, record)
        }
        EntityType::SystemPrompt => {
            preview = Some(match record.get_str("system_prompt") {
                Some(body) => format!("{}...", truncate(body, PREVIEW_CHARS)),
                None => "No preview available".to_string(),
            });
            let short_id = id
                .as_ref()
                .map(|id| format!("{}...", truncate(&id.to_string(), SHORT_ID_CHARS)))
                .unwrap_or_else(|| "Unknown".to_string());
            format!("Prompt {short_id}")
        }
    };

    Card {
        entity_type,
        id,
        title,
        badges,
        preview,
        selected,
    }
}

pub fn cards(store: &EntityStore, entity_type: EntityType) -> Vec<Card> {
    store
        .records(entity_type)
        .iter()
        .map(|record| {
            let selected = record
                .id()
                .map(|id| store.is_selected(entity_type, &id))
                .unwrap_or(false);
            card(entity_type, record, selected)
        })
        .collect()
}

pub fn empty_state(entity_type: EntityType) -> String {
    format!("No {} found", entity_type.plural_label())
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

impl Card {
    /// Markup fragment; every interpolated value is escaped.
    pub fn to_html(&self) -> String {
        let class = if self.selected {
            "item-card selected"
        } else {
            "item-card"
        };
        let id_attr = self
            .id
            .as_ref()
            .map(|id| format!(" data-id=\"{}\"", escape_html(&id.to_string())))
            .unwrap_or_default();
        let mut html = format!(
            "<div class=\"{class}\" data-type=\"{}\"{id_attr}>\n  <div class=\"item-name\">{}</div>\n  <div class=\"item-details\">",
            self.entity_type.key(),
            escape_html(&self.title)
        );
        for badge in &self.badges {
            let class = if badge.highlight { "badge highlight" } else { "badge" };
            html.push_str(&format!(
                "<span class=\"{class}\">{}</span>",
                escape_html(&badge.text)
            ));
        }
        if let Some(preview) = &self.preview {
            html.push_str(&format!(
                "<div class=\"prompt-preview\">{}</div>",
                escape_html(preview)
            ));
        }
        html.push_str("</div>\n</div>");
        html
    }
}

pub fn render_html(store: &EntityStore, entity_type: EntityType) -> String {
    let cards = cards(store, entity_type);
    if cards.is_empty() {
        return format!(
            "<div class=\"empty-state\">{}</div>",
            escape_html(&empty_state(entity_type))
        );
    }
    cards
        .iter()
        .map(Card::to_html)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Collections;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    #[test]
    fn name_falls_back_through_type_field_to_id() {
        let named = record(json!({"id": 1, "name": "Nia", "creator_name": "ignored"}));
        let typed = record(json!({"id": 2, "creator_name": "Ana"}));
        let bare = record(json!({"id": 3, "name": ""}));
        assert_eq!(display_name(EntityType::Creator, &named), "Nia");
        assert_eq!(display_name(EntityType::Creator, &typed), "Ana");
        assert_eq!(display_name(EntityType::Fan, &bare), "Fan 3");
    }

    #[test]
    fn lifetime_spend_never_renders_nan() {
        for (value, expected) in [
            (json!({"id": "f", "lifetime_spend": "abc"}), "Lifetime Spend: $0.00"),
            (json!({"id": "f"}), "Lifetime Spend: $0.00"),
            (json!({"id": "f", "lifetime_spend": null}), "Lifetime Spend: $0.00"),
            (json!({"id": "f", "lifetime_spend": "42.5"}), "Lifetime Spend: $42.50"),
            (json!({"id": "f", "lifetime_spend": "19.99 USD"}), "Lifetime Spend: $19.99"),
            (json!({"id": "f", "lifetime_spend": 7}), "Lifetime Spend: $7.00"),
        ] {
            let card = card(EntityType::Fan, &record(value), false);
            assert_eq!(card.badges[0].text, expected);
            assert!(card.badges[0].highlight);
        }
    }

    #[test]
    fn creator_badges_join_lists() {
        let card = card(
            EntityType::Creator,
            &record(json!({"id": "c", "niches": ["fitness", "travel"], "persona": ["shy"]})),
            true,
        );
        assert_eq!(card.badges[0].text, "Niche: fitness, travel");
        assert_eq!(card.badges[1].text, "Persona: shy");
        assert!(card.selected);

        let bare = super::card(EntityType::Creator, &record(json!({"id": "c"})), false);
        assert_eq!(bare.badges.len(), 1);
        assert_eq!(bare.badges[0].text, "Niche: N/A");
    }

    #[test]
    fn prompt_card_truncates_body_and_id() {
        let body = "x".repeat(150);
        let card = card(
            EntityType::SystemPrompt,
            &record(json!({"id": "0123456789abcdef", "system_prompt": body})),
            false,
        );
        assert_eq!(card.title, "Prompt 01234567...");
        assert_eq!(card.preview.unwrap().chars().count(), 103);

        let empty = super::card(EntityType::SystemPrompt, &record(json!({})), false);
        assert_eq!(empty.title, "Prompt Unknown");
        assert_eq!(empty.preview.as_deref(), Some("No preview available"));
    }

    #[test]
    fn html_escapes_every_interpolation() {
        let store = EntityStore::from_collections(Collections {
            creators: vec![record(json!({
                "id": "\"><script>",
                "name": "<img src=x onerror=alert(1)>",
                "niches": ["a&b"]
            }))],
            ..Collections::default()
        });
        let html = render_html(&store, EntityType::Creator);
        assert!(!html.contains("<img"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;img src=x onerror=alert(1)&gt;"));
        assert!(html.contains("Niche: a&amp;b"));
        assert!(html.contains("data-id=\"&quot;&gt;&lt;script&gt;\""));
    }

    #[test]
    fn empty_collection_renders_empty_state() {
        let store = EntityStore::new();
        assert_eq!(
            render_html(&store, EntityType::SystemPrompt),
            "<div class=\"empty-state\">No system prompts found</div>"
        );
    }
}
