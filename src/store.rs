use std::collections::HashMap;

use tracing::{debug, info};

use crate::client::ApiClient;
use crate::domains::entity::{EntityType, Record, RecordId};
use crate::error::{ConsoleError, Result};

/// The three collections as fetched from the backend.
#[derive(Clone, Debug, Default)]
pub struct Collections {
    pub creators: Vec<Record>,
    pub fans: Vec<Record>,
    pub system_prompts: Vec<Record>,
}

/// Fetches all three collections concurrently. Any single failure fails the load.
pub async fn fetch_all(client: &ApiClient) -> Result<Collections> {
    let (creators, fans, system_prompts) = futures::try_join!(
        client.list(EntityType::Creator),
        client.list(EntityType::Fan),
        client.list(EntityType::SystemPrompt),
    )
    .map_err(|err| match err {
        ConsoleError::AuthExpired => ConsoleError::AuthExpired,
        other => ConsoleError::Request(format!("Failed to load data: {}", other.user_message())),
    })?;
    Ok(Collections {
        creators,
        fans,
        system_prompts,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatGate {
    NeedsSelection,
    /// Creator and fan chosen; sending also needs a system prompt.
    Ready { can_send: bool },
}

/// In-memory records plus one selected id per entity type.
#[derive(Debug, Default)]
pub struct EntityStore {
    creators: Vec<Record>,
    fans: Vec<Record>,
    system_prompts: Vec<Record>,
    selections: HashMap<EntityType, RecordId>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_collections(collections: Collections) -> Self {
        let mut store = Self::new();
        store.replace_all(collections);
        store
    }

    pub async fn load_all(&mut self, client: &ApiClient) -> Result<()> {
        let collections = fetch_all(client).await?;
        self.replace_all(collections);
        Ok(())
    }

    pub fn replace_all(&mut self, collections: Collections) {
        info!(
            creators = collections.creators.len(),
            fans = collections.fans.len(),
            system_prompts = collections.system_prompts.len(),
            "collections loaded"
        );
        self.creators = collections.creators;
        self.fans = collections.fans;
        self.system_prompts = collections.system_prompts;
    }

    pub fn records(&self, entity_type: EntityType) -> &[Record] {
        match entity_type {
            EntityType::Creator => &self.creators,
            EntityType::Fan => &self.fans,
            EntityType::SystemPrompt => &self.system_prompts,
        }
    }

    fn records_mut(&mut self, entity_type: EntityType) -> &mut Vec<Record> {
        match entity_type {
            EntityType::Creator => &mut self.creators,
            EntityType::Fan => &mut self.fans,
            EntityType::SystemPrompt => &mut self.system_prompts,
        }
    }

    pub fn find(&self, entity_type: EntityType, id: &RecordId) -> Option<&Record> {
        self.records(entity_type)
            .iter()
            .find(|record| record.id().as_ref() == Some(id))
    }

    /// Selects the record with `id`; an unknown id leaves the type unselected.
    pub fn select(&mut self, entity_type: EntityType, id: &RecordId) -> Option<&Record> {
        if self.find(entity_type, id).is_some() {
            self.selections.insert(entity_type, id.clone());
        } else {
            debug!(%entity_type, %id, "selection target not found");
            self.selections.remove(&entity_type);
        }
        self.selected(entity_type)
    }

    pub fn clear_selection(&mut self, entity_type: EntityType) {
        self.selections.remove(&entity_type);
    }

    pub fn selected(&self, entity_type: EntityType) -> Option<&Record> {
        let id = self.selections.get(&entity_type)?;
        self.find(entity_type, id)
    }

    pub fn selected_id(&self, entity_type: EntityType) -> Option<RecordId> {
        self.selected(entity_type).and_then(Record::id)
    }

    pub fn is_selected(&self, entity_type: EntityType, id: &RecordId) -> bool {
        self.selected_id(entity_type).as_ref() == Some(id)
    }

    pub fn can_generate(&self) -> bool {
        EntityType::all()
            .into_iter()
            .all(|entity_type| self.selected(entity_type).is_some())
    }

    pub fn chat_gate(&self) -> ChatGate {
        if self.selected(EntityType::Creator).is_none() || self.selected(EntityType::Fan).is_none()
        {
            return ChatGate::NeedsSelection;
        }
        ChatGate::Ready {
            can_send: self.selected(EntityType::SystemPrompt).is_some(),
        }
    }

    pub fn insert(&mut self, entity_type: EntityType, record: Record) {
        self.records_mut(entity_type).push(record);
    }

    /// Replaces the record sharing `record`'s id in place. Returns false on a miss.
    pub fn replace(&mut self, entity_type: EntityType, record: Record) -> bool {
        let Some(id) = record.id() else {
            return false;
        };
        match self
            .records_mut(entity_type)
            .iter_mut()
            .find(|existing| existing.id().as_ref() == Some(&id))
        {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }

    /// Record used to discover a type's extra fields.
    pub fn sample(&self, entity_type: EntityType) -> Option<&Record> {
        self.records(entity_type).first()
    }
}
