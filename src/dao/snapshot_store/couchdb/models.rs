use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dao::models::{ResourceRecord, RotationRecord, TokenTallyEntity};

pub const ROTATION_DOC_ID: &str = "app_state::rotation";
pub const RESOURCE_DOC_ID: &str = "app_state::resource";
pub const TALLY_PREFIX: &str = "tally::";

/// Document id of the daily tally of `person`.
pub fn tally_doc_id(day: &str, person: &str) -> String {
    format!("{TALLY_PREFIX}{day}::{person}")
}

/// CouchDB envelope around a slot body: the fixed id plus the revision
/// required to overwrite it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchDocument<T> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub body: T,
}

pub type CouchRotationDocument = CouchDocument<RotationRecord>;
pub type CouchResourceDocument = CouchDocument<ResourceRecord>;
pub type CouchTallyDocument = CouchDocument<TokenTallyEntity>;

/// Minimal projection used to learn the current revision of any document.
#[derive(Debug, Deserialize)]
pub struct RevisionOnly {
    #[serde(rename = "_rev")]
    pub rev: String,
}

/// Page returned by the `_changes` long-poll feed.
#[derive(Debug, Deserialize)]
pub struct ChangesResponse {
    #[serde(default)]
    pub results: Vec<ChangeRow>,
    /// Opaque sequence token; a string on CouchDB 2+, a number on 1.x.
    pub last_seq: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRow {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Render a `since` token as a query parameter value.
pub fn seq_param(seq: &Value) -> String {
    match seq {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
