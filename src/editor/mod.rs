//! Generic record editor: a detail view, an edit form built from the
//! record's own fields, and the create/update save flow.

pub mod fields;
pub mod form;

use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::cards::display_name;
use crate::client::ApiClient;
use crate::domains::entity::{EntityType, Record, RecordId};
use crate::error::{ConsoleError, Result};
use crate::store::EntityStore;

use self::fields::{detail_rows, skeleton, DetailRow};
use self::form::EditForm;

#[derive(Clone, Debug, PartialEq)]
pub struct EditState {
    pub entity_type: EntityType,
    pub id: Option<RecordId>,
    pub original: Record,
    pub is_new: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditorMode {
    View,
    Edit,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SaveRequest {
    pub entity_type: EntityType,
    pub is_new: bool,
    pub id: Option<RecordId>,
    pub payload: Map<String, Value>,
}

/// Server-confirmed record plus the message to show the operator.
#[derive(Clone, Debug, PartialEq)]
pub struct SavedRecord {
    pub record: Record,
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SaveOutcome {
    /// The editor should close.
    Created { record: Record, message: String },
    /// The editor is back in view mode showing `record`.
    Updated { record: Record, message: String },
}

impl SaveOutcome {
    pub fn message(&self) -> &str {
        match self {
            SaveOutcome::Created { message, .. } | SaveOutcome::Updated { message, .. } => message,
        }
    }

    pub fn closes_editor(&self) -> bool {
        matches!(self, SaveOutcome::Created { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelOutcome {
    Closed,
    BackToView,
}

#[derive(Clone, Debug)]
pub struct RecordEditor {
    state: EditState,
    mode: EditorMode,
    form: Option<EditForm>,
    saving: bool,
}

impl RecordEditor {
    /// Opens `record` read-only.
    pub fn view(entity_type: EntityType, record: Record) -> Self {
        Self {
            state: EditState {
                entity_type,
                id: record.id(),
                original: record,
                is_new: false,
            },
            mode: EditorMode::View,
            form: None,
            saving: false,
        }
    }

    /// Opens a blank create form shaped after the type's sample record.
    pub fn create(entity_type: EntityType, store: &EntityStore) -> Self {
        let blank = skeleton(entity_type, store.sample(entity_type));
        let form = EditForm::from_record(&blank);
        Self {
            state: EditState {
                entity_type,
                id: None,
                original: blank,
                is_new: true,
            },
            mode: EditorMode::Edit,
            form: Some(form),
            saving: false,
        }
    }

    pub fn state(&self) -> &EditState {
        &self.state
    }

    pub fn entity_type(&self) -> EntityType {
        self.state.entity_type
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn title(&self) -> String {
        let label = self.state.entity_type.label();
        match (self.state.is_new, self.mode) {
            (true, _) => format!("Create New {label}"),
            (false, EditorMode::Edit) => format!("Edit {label}"),
            (false, EditorMode::View) => match self.state.entity_type {
                EntityType::SystemPrompt => format!("{label} Details"),
                entity_type => {
                    format!("{label}: {}", display_name(entity_type, &self.state.original))
                }
            },
        }
    }

    pub fn detail_rows(&self) -> Vec<DetailRow> {
        detail_rows(&self.state.original)
    }

    /// Switches a view to edit mode. No-op for create forms or an open form.
    pub fn enter_edit(&mut self) {
        if self.mode == EditorMode::View {
            self.form = Some(EditForm::from_record(&self.state.original));
            self.mode = EditorMode::Edit;
        }
    }

    pub fn form(&self) -> Option<&EditForm> {
        self.form.as_ref()
    }

    pub fn form_mut(&mut self) -> Option<&mut EditForm> {
        if self.saving {
            return None;
        }
        self.form.as_mut()
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn save_label(&self) -> &'static str {
        match (self.state.is_new, self.saving) {
            (true, true) => "Creating...",
            (true, false) => "Create",
            (false, true) => "Saving...",
            (false, false) => "Save",
        }
    }

    /// Create closes the editor; editing falls back to the held original.
    pub fn cancel(&mut self) -> CancelOutcome {
        if self.state.is_new || self.mode == EditorMode::View {
            return CancelOutcome::Closed;
        }
        self.form = None;
        self.mode = EditorMode::View;
        CancelOutcome::BackToView
    }

    /// Marks a save in flight and returns what to send. `None` while a save
    /// is already running or when no form is open.
    pub fn begin_save(&mut self) -> Option<SaveRequest> {
        if self.saving || self.mode != EditorMode::Edit {
            return None;
        }
        let form = self.form.as_ref()?;
        let mut payload = form.payload();
        if !self.state.is_new {
            if let Some(id) = &self.state.id {
                payload.insert("id".to_string(), id.as_value().clone());
            }
        }
        self.saving = true;
        Some(SaveRequest {
            entity_type: self.state.entity_type,
            is_new: self.state.is_new,
            id: self.state.id.clone(),
            payload,
        })
    }

    /// True while this editor is waiting on the save described by `request`.
    pub fn started(&self, request: &SaveRequest) -> bool {
        self.saving
            && self.state.entity_type == request.entity_type
            && self.state.is_new == request.is_new
            && self.state.id == request.id
    }

    /// Applies the server's answer. The save control is restored either way;
    /// on failure everything else is left as it was.
    pub fn finish_save(
        &mut self,
        result: Result<SavedRecord>,
        store: &mut EntityStore,
    ) -> Result<SaveOutcome> {
        let outcome = commit(self.state.entity_type, self.state.is_new, result, store);
        self.settle(&outcome);
        outcome
    }

    /// Editor half of [`finish_save`](Self::finish_save); the store must
    /// already hold the outcome.
    pub fn settle(&mut self, outcome: &Result<SaveOutcome>) {
        self.saving = false;
        if let Ok(SaveOutcome::Updated { record, .. }) = outcome {
            if let Some(id) = record.id() {
                self.state.id = Some(id);
            }
            self.state.original = record.clone();
            self.form = None;
            self.mode = EditorMode::View;
        }
    }

    /// Sequential save for callers that can await in place.
    pub async fn save(
        &mut self,
        client: &ApiClient,
        store: &mut EntityStore,
    ) -> Result<SaveOutcome> {
        let request = self.begin_save().ok_or_else(|| {
            ConsoleError::UserInputInvalid("Nothing to save right now".to_string())
        })?;
        let result = submit(client, &request).await;
        self.finish_save(result, store)
    }
}

/// Writes a save result into the store: created records are appended,
/// updated ones replace their namesake by id.
pub fn commit(
    entity_type: EntityType,
    is_new: bool,
    result: Result<SavedRecord>,
    store: &mut EntityStore,
) -> Result<SaveOutcome> {
    let saved = match result {
        Ok(saved) => saved,
        Err(err) => {
            error!(%entity_type, error = %err, "save failed");
            return Err(err);
        }
    };

    if is_new {
        store.insert(entity_type, saved.record.clone());
        info!(%entity_type, id = ?saved.record.id().map(|id| id.to_string()), "record created");
        return Ok(SaveOutcome::Created {
            message: saved
                .message
                .unwrap_or_else(|| "Created successfully".to_string()),
            record: saved.record,
        });
    }

    if !store.replace(entity_type, saved.record.clone()) {
        warn!(%entity_type, "updated record is not in the loaded collection");
    }
    info!(%entity_type, "record updated");
    Ok(SaveOutcome::Updated {
        message: saved
            .message
            .unwrap_or_else(|| "Updated successfully".to_string()),
        record: saved.record,
    })
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
        Some(Value::Null) | None => false,
    }
}

/// The record inside a create/update response: the type's own key first,
/// then any other known record key.
pub fn extract_record(entity_type: EntityType, response: &Value) -> Option<Record> {
    std::iter::once(entity_type)
        .chain(EntityType::all())
        .find_map(|candidate| match response.get(candidate.endpoints().record_key) {
            Some(Value::Object(map)) => Some(Record::from(map.clone())),
            _ => None,
        })
}

/// Sends a save to the create (POST) or update (PUT) endpoint.
pub async fn submit(client: &ApiClient, request: &SaveRequest) -> Result<SavedRecord> {
    let entity_type = request.entity_type;
    let response = if request.is_new {
        client.create(entity_type, &request.payload).await?
    } else {
        client.update(entity_type, &request.payload).await?
    };

    if !is_truthy(response.get("success")) {
        let message = response
            .get("error")
            .or_else(|| response.get("message"))
            .and_then(Value::as_str)
            .filter(|message| !message.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Failed to save {}", entity_type.label().to_lowercase()));
        return Err(ConsoleError::Request(message));
    }

    // A response without the record still confirms what was sent.
    let record = extract_record(entity_type, &response)
        .unwrap_or_else(|| Record::from(request.payload.clone()));
    let message = response
        .get("message")
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .map(str::to_string);
    Ok(SavedRecord { record, message })
}
