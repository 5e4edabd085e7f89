use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};

use crate::state::{
    board::{AuditStamp, Board, Indicators},
    resource::{Message, MessageCategory, ResourceLock},
    roster::Team,
};

/// Persisted shape of the rotation slot: queues, per-person maps and the
/// descriptor of the last mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationRecord {
    #[serde(default)]
    pub queue_eproc: Vec<String>,
    #[serde(default)]
    pub queue_jpe: Vec<String>,
    #[serde(default)]
    pub status_map: IndexMap<String, String>,
    #[serde(default)]
    pub detail_map: IndexMap<String, String>,
    #[serde(default)]
    pub skip_map: IndexMap<String, bool>,
    #[serde(default)]
    pub indicator_map: IndexMap<String, IndicatorEntity>,
    #[serde(default)]
    pub last_mutation: Option<AuditEntity>,
}

/// Persisted quick indicators of one person.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorEntity {
    #[serde(default)]
    pub phone: bool,
    #[serde(default)]
    pub on_break: bool,
}

/// Persisted attribution of the last mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntity {
    pub actor: String,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Persisted shape of the shared-resource slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecord {
    #[serde(default)]
    pub in_use: bool,
    #[serde(default)]
    pub holder: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub acquired_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub messages: Vec<MessageEntity>,
}

/// Persisted message log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntity {
    pub id: String,
    pub text: String,
    pub author: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub category: MessageCategory,
}

/// Daily count of token passes landing on one person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTallyEntity {
    /// Calendar day, `YYYY-MM-DD`.
    pub date: String,
    pub person: String,
    pub source: String,
    pub tokens_assumed: u32,
    pub team: Team,
    #[serde(with = "time::serde::rfc3339")]
    pub last_pass: OffsetDateTime,
}

/// `source` tag written on every token tally.
pub const TALLY_SOURCE: &str = "bastao_pass";

impl TokenTallyEntity {
    /// First tally of the day for `person`.
    pub fn first(person: &str, team: Team, at: OffsetDateTime) -> Self {
        Self {
            date: tally_day(at),
            person: person.to_string(),
            source: TALLY_SOURCE.to_string(),
            tokens_assumed: 1,
            team,
            last_pass: at,
        }
    }

    /// Count one more pass on an existing tally.
    pub fn bump(mut self, team: Team, at: OffsetDateTime) -> Self {
        self.tokens_assumed += 1;
        self.team = team;
        self.last_pass = at;
        self
    }
}

/// Calendar day of `at`, in UTC.
pub fn tally_day(at: OffsetDateTime) -> String {
    at.to_offset(UtcOffset::UTC).date().to_string()
}

impl From<&Board> for RotationRecord {
    fn from(board: &Board) -> Self {
        Self {
            queue_eproc: board.queue_eproc.clone(),
            queue_jpe: board.queue_jpe.clone(),
            status_map: board.status.clone(),
            detail_map: board.detail.clone(),
            skip_map: board.skip.clone(),
            indicator_map: board
                .indicators
                .iter()
                .map(|(name, indicators)| (name.clone(), IndicatorEntity::from(*indicators)))
                .collect(),
            last_mutation: board.last_mutation.clone().map(Into::into),
        }
    }
}

impl From<RotationRecord> for Board {
    fn from(record: RotationRecord) -> Self {
        Self {
            queue_eproc: record.queue_eproc,
            queue_jpe: record.queue_jpe,
            status: record.status_map,
            detail: record.detail_map,
            skip: record.skip_map,
            indicators: record
                .indicator_map
                .into_iter()
                .map(|(name, indicators)| (name, indicators.into()))
                .collect(),
            last_mutation: record.last_mutation.map(Into::into),
        }
    }
}

impl From<Indicators> for IndicatorEntity {
    fn from(value: Indicators) -> Self {
        Self {
            phone: value.phone,
            on_break: value.on_break,
        }
    }
}

impl From<IndicatorEntity> for Indicators {
    fn from(value: IndicatorEntity) -> Self {
        Self {
            phone: value.phone,
            on_break: value.on_break,
        }
    }
}

impl From<AuditStamp> for AuditEntity {
    fn from(value: AuditStamp) -> Self {
        Self {
            actor: value.actor,
            description: value.description,
            timestamp: value.timestamp,
        }
    }
}

impl From<AuditEntity> for AuditStamp {
    fn from(value: AuditEntity) -> Self {
        Self {
            actor: value.actor,
            description: value.description,
            timestamp: value.timestamp,
        }
    }
}

impl From<&ResourceLock> for ResourceRecord {
    fn from(lock: &ResourceLock) -> Self {
        Self {
            in_use: lock.in_use,
            holder: lock.holder.clone(),
            acquired_at: lock.acquired_at,
            messages: lock.messages.iter().cloned().map(Into::into).collect(),
        }
    }
}

impl From<ResourceRecord> for ResourceLock {
    fn from(record: ResourceRecord) -> Self {
        Self {
            in_use: record.in_use,
            holder: record.holder,
            acquired_at: record.acquired_at,
            messages: record.messages.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Message> for MessageEntity {
    fn from(value: Message) -> Self {
        Self {
            id: value.id,
            text: value.text,
            author: value.author,
            timestamp: value.timestamp,
            category: value.category,
        }
    }
}

impl From<MessageEntity> for Message {
    fn from(value: MessageEntity) -> Self {
        Self {
            id: value.id,
            text: value.text,
            author: value.author,
            timestamp: value.timestamp,
            category: value.category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_record_uses_wire_field_names() {
        let record: RotationRecord = serde_json::from_value(serde_json::json!({
            "queueEproc": ["Ana", "Bruno"],
            "statusMap": {"Diego": "Reunião"},
            "indicatorMap": {"Ana": {"phone": true}},
            "lastMutation": {
                "actor": "Ana",
                "description": "Token passed EPROC",
                "timestamp": "2026-03-02T12:00:00.5Z"
            }
        }))
        .unwrap();

        assert_eq!(record.queue_eproc, vec!["Ana", "Bruno"]);
        assert!(record.queue_jpe.is_empty());
        assert!(record.indicator_map["Ana"].phone);
        assert!(!record.indicator_map["Ana"].on_break);

        let board = Board::from(record);
        assert_eq!(board.status_of("Diego"), "Reunião");
        assert_eq!(board.last_mutation.unwrap().actor, "Ana");
    }

    #[test]
    fn empty_document_decodes_to_defaults() {
        let record: ResourceRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(record, ResourceRecord::default());
    }

    #[test]
    fn tally_day_is_zero_padded_utc_date() {
        let at = OffsetDateTime::from_unix_timestamp(1_772_000_000).unwrap();
        assert_eq!(tally_day(at), "2026-02-25");

        let local = at.to_offset(UtcOffset::from_hms(-5, 0, 0).unwrap());
        assert_eq!(tally_day(local), "2026-02-25");
    }

    #[test]
    fn tally_bump_increments() {
        let at = OffsetDateTime::from_unix_timestamp(0).unwrap();
        let tally = TokenTallyEntity::first("Ana", Team::Eproc, at).bump(Team::Eproc, at);
        assert_eq!(tally.tokens_assumed, 2);
        assert_eq!(tally.date, "1970-01-01");
        assert_eq!(tally.source, TALLY_SOURCE);
    }
}
