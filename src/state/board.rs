use std::{fmt, str::FromStr, time::Duration};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::state::{
    roster::{Roster, Team},
    rotation,
};

/// Status label that pulls a person out of rotation.
pub const UNAVAILABLE: &str = "Indisponível";

/// Attribution for the latest applied mutation.
///
/// The timestamp doubles as the fencing token compared during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditStamp {
    pub actor: String,
    pub description: String,
    pub timestamp: OffsetDateTime,
}

impl AuditStamp {
    /// Stamp a mutation at `now`, nudged forward when needed so a replica never
    /// emits two stamps with the same or a decreasing timestamp.
    pub fn after(
        previous: Option<&AuditStamp>,
        actor: impl Into<String>,
        description: impl Into<String>,
        now: OffsetDateTime,
    ) -> Self {
        let timestamp = match previous {
            Some(prev) if prev.timestamp >= now => prev.timestamp + Duration::from_micros(1),
            _ => now,
        };
        Self {
            actor: actor.into(),
            description: description.into(),
            timestamp,
        }
    }
}

/// Per-person quick indicators. At most one is set at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Indicators {
    pub phone: bool,
    pub on_break: bool,
}

/// Selects which quick indicator a toggle targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    Phone,
    Break,
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Indicator::Phone => f.write_str("phone"),
            Indicator::Break => f.write_str("break"),
        }
    }
}

impl FromStr for Indicator {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "phone" => Ok(Indicator::Phone),
            "break" => Ok(Indicator::Break),
            other => Err(format!("unknown indicator `{other}`")),
        }
    }
}

/// A state change requested against the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    SetStatus {
        person: String,
        label: String,
        keep_in_queue: bool,
        detail: String,
    },
    ToggleQueue {
        person: String,
    },
    ToggleIndicator {
        person: String,
        which: Indicator,
    },
    ToggleSkip {
        person: String,
    },
    PassToken {
        team: Team,
    },
}

/// Result of a token pass, handed to the notification side channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPassed {
    pub team: Team,
    pub holder: String,
    pub remaining: Vec<String>,
}

/// Board produced by a mutation, not yet stamped.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub board: Board,
    pub description: String,
    pub token_passed: Option<TokenPassed>,
}

/// Full rotation snapshot: both queues plus the per-person maps.
///
/// Absent map entries mean default values. Every method here is pure; the
/// replica holds the current value behind a lock and swaps it wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    pub queue_eproc: Vec<String>,
    pub queue_jpe: Vec<String>,
    pub status: IndexMap<String, String>,
    pub detail: IndexMap<String, String>,
    pub skip: IndexMap<String, bool>,
    pub indicators: IndexMap<String, Indicators>,
    pub last_mutation: Option<AuditStamp>,
}

impl Board {
    /// Ordered queue of the given team.
    pub fn queue(&self, team: Team) -> &[String] {
        match team {
            Team::Eproc => &self.queue_eproc,
            Team::Jpe => &self.queue_jpe,
        }
    }

    fn queue_mut(&mut self, team: Team) -> &mut Vec<String> {
        match team {
            Team::Eproc => &mut self.queue_eproc,
            Team::Jpe => &mut self.queue_jpe,
        }
    }

    /// Current token holder for the team.
    pub fn holder(&self, team: Team) -> Option<&str> {
        self.queue(team).first().map(String::as_str)
    }

    /// Whether `person` sits in either queue.
    pub fn is_queued(&self, person: &str) -> bool {
        Team::ALL
            .iter()
            .any(|team| self.queue(*team).iter().any(|name| name == person))
    }

    /// Status label, empty when none was ever set.
    pub fn status_of(&self, person: &str) -> &str {
        self.status.get(person).map(String::as_str).unwrap_or("")
    }

    /// Indicators of a person, defaulting to none set.
    pub fn indicators_of(&self, person: &str) -> Indicators {
        self.indicators.get(person).copied().unwrap_or_default()
    }

    /// Skip flag of a person, defaulting to false.
    pub fn skip_of(&self, person: &str) -> bool {
        self.skip.get(person).copied().unwrap_or(false)
    }

    /// Compute the board resulting from `mutation`.
    ///
    /// Returns `None` when the mutation has no effect: queue toggles for people
    /// without a team, and token passes on queues of one person or fewer.
    pub fn apply(&self, mutation: &Mutation, roster: &Roster) -> Option<Outcome> {
        let mut next = self.clone();
        let mut token_passed = None;

        let description = match mutation {
            Mutation::SetStatus {
                person,
                label,
                keep_in_queue,
                detail,
            } => {
                next.status.insert(person.clone(), label.clone());
                next.detail.insert(person.clone(), detail.clone());
                if label.is_empty() || label == UNAVAILABLE {
                    next.clear_presence(person);
                }
                if let Some(team) = roster.team_of(person) {
                    let keep = *keep_in_queue && label != UNAVAILABLE;
                    if keep {
                        next.enqueue(team, person);
                    } else {
                        next.dequeue(person);
                    }
                }
                format!("Status {person}: {label}")
            }
            Mutation::ToggleQueue { person } => {
                let team = roster.team_of(person)?;
                if next.queue(team).contains(person) {
                    next.dequeue(person);
                    next.status.insert(person.clone(), UNAVAILABLE.to_string());
                    next.clear_presence(person);
                    format!("Removed {person} from {team}")
                } else {
                    next.enqueue(team, person);
                    next.status.insert(person.clone(), String::new());
                    format!("Queued {person} in {team}")
                }
            }
            Mutation::ToggleIndicator { person, which } => {
                let current = next.indicators_of(person);
                let updated = match which {
                    Indicator::Phone => Indicators {
                        phone: !current.phone,
                        on_break: false,
                    },
                    Indicator::Break => Indicators {
                        phone: false,
                        on_break: !current.on_break,
                    },
                };
                next.indicators.insert(person.clone(), updated);
                match which {
                    Indicator::Phone => format!("Phone {person}"),
                    Indicator::Break => format!("Break {person}"),
                }
            }
            Mutation::ToggleSkip { person } => {
                let flag = !next.skip_of(person);
                next.skip.insert(person.clone(), flag);
                format!("Skip {person}")
            }
            Mutation::PassToken { team } => {
                let team = *team;
                if next.queue(team).len() <= 1 {
                    return None;
                }
                let current = next.queue(team).to_vec();
                let rotated = rotation::pass_token(&current, &mut next.skip);
                *next.queue_mut(team) = rotated;
                let queue = next.queue(team);
                token_passed = Some(TokenPassed {
                    team,
                    holder: queue[0].clone(),
                    remaining: queue[1..].to_vec(),
                });
                format!("Token passed {team}")
            }
        };

        Some(Outcome {
            board: next,
            description,
            token_passed,
        })
    }

    /// Attach the stamp of the mutation that produced this board.
    pub fn stamped(mut self, stamp: AuditStamp) -> Self {
        self.last_mutation = Some(stamp);
        self
    }

    /// Append `person` to the team queue, dropping any other membership first.
    fn enqueue(&mut self, team: Team, person: &str) {
        if self.queue(team).iter().any(|name| name == person) {
            return;
        }
        self.dequeue(person);
        self.queue_mut(team).push(person.to_string());
    }

    fn dequeue(&mut self, person: &str) {
        self.queue_eproc.retain(|name| name != person);
        self.queue_jpe.retain(|name| name != person);
    }

    /// Reset the per-person metadata that only makes sense while queued.
    fn clear_presence(&mut self, person: &str) {
        self.indicators.insert(person.to_string(), Indicators::default());
        self.skip.insert(person.to_string(), false);
        self.detail.insert(person.to_string(), String::new());
    }
}

/// Channel through which a remote snapshot reached the replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSource {
    /// Delivered by the store's change subscription.
    Push,
    /// Fetched by the fixed-interval pull.
    Poll,
}

/// Decide whether a remote rotation snapshot replaces the local one.
///
/// Equal stamps are echoes and always ignored. Pushed snapshots are adopted
/// only when strictly newer than the local stamp, so replicas receiving each
/// other's writes settle on the latest one. Pulled snapshots mirror the store
/// and are adopted whenever the stamp differs, unless local writes are still in
/// flight.
pub fn should_adopt(
    local: Option<&AuditStamp>,
    remote: Option<&AuditStamp>,
    source: SyncSource,
    writes_in_flight: bool,
) -> bool {
    let local_ts = local.map(|stamp| stamp.timestamp);
    let remote_ts = remote.map(|stamp| stamp.timestamp);
    if local_ts == remote_ts {
        return false;
    }

    match source {
        SyncSource::Push => remote_ts > local_ts,
        SyncSource::Poll => !writes_in_flight,
    }
}
