//! Subscriber delivery filters.

use std::fmt;
use std::sync::Arc;

use crate::message::Message;

/// Extra predicate a caller may attach to a filter.
pub type Predicate = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

/// Decides which messages a subscriber receives.
///
/// A message passes when its topic is on the allow-list and, if it carries a
/// target user or client, the target is this subscriber.
#[derive(Clone, Default)]
pub struct SubscriberFilter {
    /// Exact topic names, or prefixes written as `a.b.*`. Empty allows all.
    allow: Vec<String>,
    /// Optional caller-supplied predicate.
    predicate: Option<Predicate>,
}

impl fmt::Debug for SubscriberFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberFilter")
            .field("allow", &self.allow)
            .field("predicate", &self.predicate.is_some())
            .finish()
    }
}

impl SubscriberFilter {
    /// A filter that accepts every topic.
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter restricted to the given topic patterns.
    pub fn topics<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allow: patterns.into_iter().map(Into::into).collect(),
            predicate: None,
        }
    }

    /// Adds a predicate evaluated after the built-in checks.
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Allow-list patterns.
    pub fn patterns(&self) -> &[String] {
        &self.allow
    }

    /// Whether `topic` is on the allow-list.
    pub fn allows_topic(&self, topic: &str) -> bool {
        self.allow.is_empty()
            || self.allow.iter().any(|pattern| match pattern.strip_suffix('*') {
                Some(prefix) => topic.starts_with(prefix),
                None => pattern == topic,
            })
    }

    /// Full delivery decision for a subscriber identified by `user_id` and
    /// `client_id`.
    pub fn accepts(&self, msg: &Message, user_id: &str, client_id: &str) -> bool {
        if !self.allows_topic(&msg.topic) {
            return false;
        }
        if let Some(target) = msg.target_user_id.as_deref() {
            if user_id.is_empty() || target != user_id {
                return false;
            }
        }
        if let Some(client) = msg.target_client_id.as_deref() {
            if !client.is_empty() && client != client_id {
                return false;
            }
        }
        self.predicate.as_ref().is_none_or(|p| p(msg))
    }
}
