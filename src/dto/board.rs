use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::{format_timestamp, validation::validate_person_name},
    state::{
        board::{AuditStamp, Board, Indicators, TokenPassed},
        roster::{Roster, Team},
    },
};

/// Longest accepted status label.
pub const MAX_LABEL_LEN: u64 = 80;
/// Longest accepted status detail.
pub const MAX_DETAIL_LEN: u64 = 200;

/// Payload for `PUT /people/{person}/status`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SetStatusRequest {
    /// New status label. Empty means available; `Indisponível` leaves the rotation.
    #[validate(length(max = MAX_LABEL_LEN))]
    pub label: String,
    /// Keep (or put) the person in their team queue.
    #[serde(default)]
    pub keep_in_queue: bool,
    /// Free-text detail shown next to the label.
    #[serde(default)]
    #[validate(length(max = MAX_DETAIL_LEN))]
    pub detail: String,
}

/// One team queue, head first.
#[derive(Debug, Serialize, ToSchema)]
pub struct QueueView {
    pub team: Team,
    /// Name shown on screens (`Eproc`, `Legados`).
    pub display_name: String,
    /// Current token holder, if anyone is queued.
    pub holder: Option<String>,
    pub members: Vec<String>,
}

/// Quick indicators of one person.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct IndicatorsView {
    pub phone: bool,
    pub on_break: bool,
}

impl From<Indicators> for IndicatorsView {
    fn from(value: Indicators) -> Self {
        Self {
            phone: value.phone,
            on_break: value.on_break,
        }
    }
}

/// Attribution of the latest mutation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditView {
    pub actor: String,
    pub description: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

impl From<&AuditStamp> for AuditView {
    fn from(stamp: &AuditStamp) -> Self {
        Self {
            actor: stamp.actor.clone(),
            description: stamp.description.clone(),
            timestamp: format_timestamp(stamp.timestamp),
        }
    }
}

/// Full rotation snapshot as served to the UI.
#[derive(Debug, Serialize, ToSchema)]
pub struct BoardView {
    pub queues: Vec<QueueView>,
    pub status: BTreeMap<String, String>,
    pub detail: BTreeMap<String, String>,
    pub skip: BTreeMap<String, bool>,
    pub indicators: BTreeMap<String, IndicatorsView>,
    pub last_mutation: Option<AuditView>,
}

impl From<&Board> for BoardView {
    fn from(board: &Board) -> Self {
        Self {
            queues: Team::ALL
                .iter()
                .map(|team| QueueView {
                    team: *team,
                    display_name: team.display_name().to_string(),
                    holder: board.holder(*team).map(str::to_string),
                    members: board.queue(*team).to_vec(),
                })
                .collect(),
            status: board
                .status
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            detail: board
                .detail
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            skip: board.skip.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            indicators: board
                .indicators
                .iter()
                .map(|(k, v)| (k.clone(), IndicatorsView::from(*v)))
                .collect(),
            last_mutation: board.last_mutation.as_ref().map(AuditView::from),
        }
    }
}

/// Broadcast after an effective token pass.
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenPassedEvent {
    pub team: Team,
    pub holder: String,
    pub remaining: Vec<String>,
}

impl From<&TokenPassed> for TokenPassedEvent {
    fn from(value: &TokenPassed) -> Self {
        Self {
            team: value.team,
            holder: value.holder.clone(),
            remaining: value.remaining.clone(),
        }
    }
}

/// Roster entry.
#[derive(Debug, Serialize, ToSchema)]
pub struct RosterEntry {
    pub name: String,
    /// Rotation team, absent for people outside the rotation.
    pub team: Option<Team>,
}

/// Response of `GET /roster`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RosterView {
    pub people: Vec<RosterEntry>,
}

impl From<&Roster> for RosterView {
    fn from(roster: &Roster) -> Self {
        Self {
            people: roster
                .iter()
                .map(|(name, team)| RosterEntry {
                    name: name.to_string(),
                    team,
                })
                .collect(),
        }
    }
}

/// Slots replaced by a forced pull.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct SyncReport {
    pub rotation_adopted: bool,
    pub resource_adopted: bool,
}

/// Checks a person path segment, mapping failures to a validation error set.
pub fn validate_person(person: &str) -> Result<(), validator::ValidationErrors> {
    let mut errors = validator::ValidationErrors::new();
    if let Err(err) = validate_person_name(person) {
        errors.add("person", err);
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
