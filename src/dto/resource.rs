use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidateLength, ValidationError, ValidationErrors};

use crate::{
    dto::{format_timestamp, validation::validate_person_name},
    state::resource::{Message, MessageCategory, ResourceLock},
};

/// Longest accepted message text.
pub const MAX_MESSAGE_LEN: u64 = 1000;

/// Payload for `POST /resource/acquire` and `POST /resource/release`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ResourcePersonRequest {
    /// Person taking or freeing the resource. Defaults to the acting user.
    #[serde(default)]
    pub person: Option<String>,
}

impl Validate for ResourcePersonRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(ref person) = self.person {
            if let Err(e) = validate_person_name(person) {
                errors.add("person", e);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Payload for `POST /resource/release-request`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReleaseRequestBody {
    /// Person asking. Defaults to the acting user.
    #[serde(default)]
    pub from: Option<String>,
    /// Person asked. Defaults to the current holder.
    #[serde(default)]
    pub to: Option<String>,
}

impl Validate for ReleaseRequestBody {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(ref from) = self.from {
            if let Err(e) = validate_person_name(from) {
                errors.add("from", e);
            }
        }
        if let Some(ref to) = self.to {
            if let Err(e) = validate_person_name(to) {
                errors.add("to", e);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Payload for `POST /messages`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PostMessageRequest {
    pub text: String,
    #[serde(default = "default_category")]
    pub category: MessageCategory,
    /// Defaults to the acting user.
    #[serde(default)]
    pub author: Option<String>,
}

impl Validate for PostMessageRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if !self.text.validate_length(Some(1), Some(MAX_MESSAGE_LEN), None) {
            let mut err = ValidationError::new("length");
            err.message =
                Some(format!("Message must be 1 to {MAX_MESSAGE_LEN} characters").into());
            errors.add("text", err);
        }
        if let Some(ref author) = self.author {
            if let Err(e) = validate_person_name(author) {
                errors.add("author", e);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn default_category() -> MessageCategory {
    MessageCategory::Common
}

/// Entry of the message log.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageView {
    pub id: String,
    pub text: String,
    pub author: String,
    pub timestamp: String,
    pub category: MessageCategory,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.clone(),
            text: message.text.clone(),
            author: message.author.clone(),
            timestamp: format_timestamp(message.timestamp),
            category: message.category,
        }
    }
}

/// Shared resource state with its log, newest message first.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResourceView {
    pub in_use: bool,
    pub holder: Option<String>,
    pub acquired_at: Option<String>,
    pub messages: Vec<MessageView>,
}

impl From<&ResourceLock> for ResourceView {
    fn from(lock: &ResourceLock) -> Self {
        Self {
            in_use: lock.in_use,
            holder: lock.holder.clone(),
            acquired_at: lock.acquired_at.map(format_timestamp),
            messages: lock.messages.iter().map(MessageView::from).collect(),
        }
    }
}
