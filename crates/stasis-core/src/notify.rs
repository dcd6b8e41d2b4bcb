//! Short-lived notifications for the local citizen.
//!
//! The [`NotificationCenter`] is plain state owned by the peer actor. It
//! assigns sequential ids and stamps expiry times; the actor schedules the
//! matching `Expire` command. Shortage alerts are coalesced per category
//! while one is still visible.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use stasis_types::{Category, Notification, NotificationId, Record, Severity};

/// The content of a notification before it is raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// How the message is styled.
    pub severity: Severity,
    /// Headline.
    pub title: String,
    /// Body text.
    pub body: String,
}

impl Message {
    /// Build a message.
    pub fn new(severity: Severity, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            body: body.into(),
        }
    }

    /// Greeting for a citizen not yet present in the bootstrapped ledger.
    pub fn welcome_local() -> Self {
        Self::new(
            Severity::Primary,
            "Welcome to Cyber Stasis!",
            "Request what you need for the day and supply what you can.",
        )
    }

    /// A citizen appeared on the network for the first time.
    pub fn welcome_remote(citizen: &str) -> Self {
        Self::new(
            Severity::Info,
            "Welcome",
            format!("Citizen {citizen} joined Cyber Stasis."),
        )
    }

    /// The local citizen leads the ranking.
    pub fn ranked_first() -> Self {
        Self::new(Severity::Success, "Well done!", "You are ranked number one!")
    }

    /// The local citizen's reputation dropped below zero.
    pub fn negative_reputation() -> Self {
        Self::new(
            Severity::Warning,
            "You can do better!",
            "You need to contribute more!",
        )
    }

    /// The local citizen reached `count` demands.
    pub fn demand_milestone(count: u64) -> Self {
        Self::new(
            Severity::Info,
            "Demanding!",
            format!("You have created {count} demands."),
        )
    }

    /// The local citizen reached `count` fulfillments.
    pub fn supply_milestone(count: u64) -> Self {
        Self::new(
            Severity::Info,
            "Contribution hero!",
            format!("You have fulfilled {count} demands."),
        )
    }

    /// Confirmation of a local demand.
    pub fn demand_sent(record: &Record) -> Self {
        Self::new(
            Severity::Success,
            "Demand sent!",
            format!(
                "You have requested {} {} of {}.",
                record.quantity,
                record.details,
                record.category.as_str().to_lowercase()
            ),
        )
    }

    /// Confirmation of a local fulfillment.
    pub fn supply_sent(record: &Record) -> Self {
        Self::new(
            Severity::Success,
            "Supply sent!",
            format!(
                "You have supplied {} {} of {}.",
                record.quantity,
                record.details,
                record.category.as_str().to_lowercase()
            ),
        )
    }

    /// A record was kept locally but could not be shared.
    pub fn not_delivered(record: &Record) -> Self {
        Self::new(
            Severity::Warning,
            "Not delivered",
            format!(
                "Record {} is saved on this peer but other citizens cannot see it yet.",
                record.id
            ),
        )
    }

    /// The network is short of `category`. The title doubles as the
    /// plain-text alert published on the critical topic.
    pub fn shortage(category: Category) -> Self {
        let name = category.as_str().to_lowercase();
        Self::new(
            Severity::Danger,
            format!("Global shortage of {name}!"),
            format!("Please supply more {name}."),
        )
    }
}

/// Active notifications of one peer.
#[derive(Debug, Clone)]
pub struct NotificationCenter {
    ttl: TimeDelta,
    next_id: NotificationId,
    active: BTreeMap<NotificationId, Notification>,
    shortages: BTreeMap<Category, NotificationId>,
}

impl NotificationCenter {
    /// Create an empty center whose notifications live for `ttl`.
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            next_id: NotificationId::FIRST,
            active: BTreeMap::new(),
            shortages: BTreeMap::new(),
        }
    }

    /// Raise `message` at `now`.
    pub fn raise(&mut self, message: Message, now: DateTime<Utc>) -> Notification {
        let id = self.next_id;
        // Ids only wrap after 2^64 notifications; reuse the last one then.
        self.next_id = id.next().unwrap_or(id);
        let notification = Notification {
            id,
            severity: message.severity,
            title: message.title,
            body: message.body,
            raised_at: now,
            expires_at: now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        debug!(id = %id, title = %notification.title, "notification raised");
        self.active.insert(id, notification.clone());
        notification
    }

    /// Raise a shortage alert for `category` unless one is still visible.
    pub fn raise_shortage(
        &mut self,
        category: Category,
        now: DateTime<Utc>,
    ) -> Option<Notification> {
        if self
            .shortages
            .get(&category)
            .and_then(|id| self.active.get(id))
            .is_some_and(|n| n.is_active(now))
        {
            return None;
        }
        let notification = self.raise(Message::shortage(category), now);
        self.shortages.insert(category, notification.id);
        Some(notification)
    }

    /// Remove a notification. Returns whether it was still active.
    pub fn expire(&mut self, id: NotificationId) -> bool {
        self.shortages.retain(|_, active| *active != id);
        self.active.remove(&id).is_some()
    }

    /// Notifications visible at `now`, oldest first.
    pub fn active(&self, now: DateTime<Utc>) -> Vec<Notification> {
        self.active
            .values()
            .filter(|n| n.is_active(now))
            .cloned()
            .collect()
    }

    /// Number of notifications not yet expired by command.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether no notification is held.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn ids_are_sequential() {
        let mut center = NotificationCenter::new(Duration::from_secs(5));
        let a = center.raise(Message::ranked_first(), t0());
        let b = center.raise(Message::negative_reputation(), t0());
        assert_eq!(a.id.get(), 1);
        assert_eq!(b.id.get(), 2);
        assert_eq!(center.len(), 2);
    }

    #[test]
    fn notification_is_gone_after_ttl() {
        let mut center = NotificationCenter::new(Duration::from_secs(5));
        let n = center.raise(Message::ranked_first(), t0());
        assert_eq!(n.expires_at, t0() + TimeDelta::seconds(5));

        let just_before = t0() + TimeDelta::milliseconds(4_999);
        assert_eq!(center.active(just_before).len(), 1);

        let after = t0() + TimeDelta::seconds(5) + TimeDelta::milliseconds(1);
        assert!(center.active(after).is_empty());

        assert!(center.expire(n.id));
        assert!(!center.expire(n.id));
        assert!(center.is_empty());
    }

    #[test]
    fn shortage_is_coalesced_while_visible() {
        let mut center = NotificationCenter::new(Duration::from_secs(5));
        let first = center.raise_shortage(Category::Water, t0()).unwrap();
        assert_eq!(first.title, "Global shortage of water!");
        assert_eq!(first.severity, Severity::Danger);

        assert!(center.raise_shortage(Category::Water, t0()).is_none());
        assert!(center.raise_shortage(Category::Food, t0()).is_some());

        center.expire(first.id);
        assert!(center.raise_shortage(Category::Water, t0()).is_some());
    }

    #[test]
    fn lapsed_shortage_can_be_raised_again_before_expire_command() {
        let mut center = NotificationCenter::new(Duration::from_secs(5));
        center.raise_shortage(Category::Housing, t0()).unwrap();
        let later = t0() + TimeDelta::seconds(6);
        assert!(center.raise_shortage(Category::Housing, later).is_some());
    }
}
