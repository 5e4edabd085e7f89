use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Maximum number of messages retained in the shared log.
pub const MESSAGE_LOG_LIMIT: usize = 100;

/// Classifies a message in the shared log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MessageCategory {
    /// Free-form note posted by someone.
    Common,
    /// Entry written by a shared-resource transition.
    Resource,
}

/// Entry of the shared message log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub text: String,
    pub author: String,
    pub timestamp: OffsetDateTime,
    pub category: MessageCategory,
}

/// Shared single-holder resource and its message log, newest message first.
///
/// Acquiring while held simply replaces the holder; the UI is expected to
/// prevent it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceLock {
    pub in_use: bool,
    pub holder: Option<String>,
    pub acquired_at: Option<OffsetDateTime>,
    pub messages: Vec<Message>,
}

impl ResourceLock {
    /// Hand the resource to `person`.
    pub fn acquire(&self, person: &str, actor: &str, now: OffsetDateTime) -> Self {
        let text = if person == actor {
            format!("{actor} took the shared resource.")
        } else {
            format!("{actor} handed the shared resource to {person}.")
        };
        let next = Self {
            in_use: true,
            holder: Some(person.to_string()),
            acquired_at: Some(now),
            messages: self.messages.clone(),
        };
        next.with_message(text, MessageCategory::Resource, actor, now)
    }

    /// Free the resource, annotating the log with how long it was held.
    pub fn release(&self, person: &str, actor: &str, now: OffsetDateTime) -> Self {
        let elapsed = self
            .acquired_at
            .map(|since| format!(" ({} min)", held_minutes(since, now)))
            .unwrap_or_default();
        let text = if person == actor {
            format!("{actor} released the shared resource.{elapsed}")
        } else {
            format!("{actor} released the shared resource held by {person}.{elapsed}")
        };
        let next = Self {
            in_use: false,
            holder: None,
            acquired_at: None,
            messages: self.messages.clone(),
        };
        next.with_message(text, MessageCategory::Resource, actor, now)
    }

    /// Ask the holder to release. Only the log changes.
    pub fn request_release(&self, from: &str, to: &str, now: OffsetDateTime) -> Self {
        let text = format!("{from} asks {to} to release the shared resource.");
        self.with_message(text, MessageCategory::Resource, from, now)
    }

    /// Prepend a message, keeping the most recent [`MESSAGE_LOG_LIMIT`] entries.
    pub fn with_message(
        &self,
        text: impl Into<String>,
        category: MessageCategory,
        author: &str,
        now: OffsetDateTime,
    ) -> Self {
        let message = Message {
            id: Uuid::new_v4().simple().to_string(),
            text: text.into(),
            author: author.to_string(),
            timestamp: now,
            category,
        };
        let mut messages = Vec::with_capacity(MESSAGE_LOG_LIMIT);
        messages.push(message);
        messages.extend(self.messages.iter().take(MESSAGE_LOG_LIMIT - 1).cloned());

        Self {
            messages,
            ..self.clone()
        }
    }
}

/// Whole minutes between `since` and `now`, rounded, never below one.
fn held_minutes(since: OffsetDateTime, now: OffsetDateTime) -> i64 {
    let seconds = (now - since).whole_seconds().max(0);
    ((seconds + 30) / 60).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(seconds: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(seconds).unwrap()
    }

    #[test]
    fn acquire_sets_holder_and_logs() {
        let lock = ResourceLock::default().acquire("Eva", "Eva", at(0));
        assert!(lock.in_use);
        assert_eq!(lock.holder.as_deref(), Some("Eva"));
        assert_eq!(lock.acquired_at, Some(at(0)));
        assert_eq!(lock.messages.len(), 1);
        assert_eq!(lock.messages[0].author, "Eva");
        assert_eq!(lock.messages[0].category, MessageCategory::Resource);
    }

    #[test]
    fn acquire_while_held_overwrites_holder() {
        let lock = ResourceLock::default()
            .acquire("Eva", "Eva", at(0))
            .acquire("Fabio", "Fabio", at(10));
        assert_eq!(lock.holder.as_deref(), Some("Fabio"));
        assert_eq!(lock.messages.len(), 2);
    }

    #[test]
    fn request_release_only_logs() {
        let held = ResourceLock::default().acquire("Eva", "Eva", at(0));
        let asked = held.request_release("Fabio", "Eva", at(5));
        assert!(asked.in_use);
        assert_eq!(asked.holder.as_deref(), Some("Eva"));
        assert_eq!(asked.messages.len(), 2);
        let newest = &asked.messages[0];
        assert_eq!(newest.author, "Fabio");
        assert!(newest.text.contains("Eva"));
    }

    #[test]
    fn release_reports_elapsed_minutes() {
        let held = ResourceLock::default().acquire("Eva", "Eva", at(0));
        let released = held.release("Eva", "Eva", at(125 * 60));
        assert!(!released.in_use);
        assert_eq!(released.holder, None);
        assert_eq!(released.acquired_at, None);
        assert!(released.messages[0].text.ends_with("(125 min)"));

        let quick = held.release("Eva", "Eva", at(3));
        assert!(quick.messages[0].text.ends_with("(1 min)"));
    }

    #[test]
    fn release_without_acquisition_time_has_no_annotation() {
        let released = ResourceLock::default().release("Eva", "Eva", at(0));
        assert!(released.messages[0].text.ends_with("resource."));
    }

    #[test]
    fn log_is_bounded_and_newest_first() {
        let mut lock = ResourceLock::default();
        for index in 0..(MESSAGE_LOG_LIMIT + 5) {
            lock = lock.with_message(
                format!("note {index}"),
                MessageCategory::Common,
                "Ana",
                at(index as i64),
            );
        }
        assert_eq!(lock.messages.len(), MESSAGE_LOG_LIMIT);
        assert_eq!(lock.messages[0].text, format!("note {}", MESSAGE_LOG_LIMIT + 4));
        assert_eq!(lock.messages.last().unwrap().text, "note 5");
    }
}
