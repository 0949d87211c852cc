//! The catalogue every publish is validated against.

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::error::RealtimeError;

use super::descriptor::{TopicDescriptor, TopicKind, validate_name};

/// Registry of known topics.
///
/// Writable until [`seal`](Self::seal) is called, read-mostly afterwards.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    /// Topic name → descriptor.
    topics: DashMap<String, TopicDescriptor>,
    /// Set once startup registration is complete.
    sealed: AtomicBool,
}

impl TopicRegistry {
    /// Creates an empty, unsealed registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a topic.
    pub fn register(&self, topic: TopicDescriptor) -> Result<(), RealtimeError> {
        if self.is_sealed() {
            return Err(RealtimeError::RegistryClosed(topic.name));
        }

        let kind = validate_name(&topic.name)?;
        if kind != topic.kind {
            return Err(RealtimeError::InvalidTopic {
                name: topic.name,
                reason: "declared kind does not match the name",
            });
        }

        match self.topics.entry(topic.name.clone()) {
            Entry::Occupied(_) => Err(RealtimeError::DuplicateTopic(topic.name)),
            Entry::Vacant(slot) => {
                debug!(topic = %topic.name, kind = ?topic.kind, "Topic registered");
                slot.insert(topic);
                Ok(())
            }
        }
    }

    /// Closes the registry to further registration.
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::SeqCst);
    }

    /// Whether [`seal`](Self::seal) has been called.
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    /// Looks up a topic by its registered name.
    pub fn resolve(&self, name: &str) -> Result<TopicDescriptor, RealtimeError> {
        self.topics
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RealtimeError::UnknownTopic(name.to_string()))
    }

    /// Resolves the topic a published message belongs to and checks its
    /// target against the topic kind.
    ///
    /// Broadcast topics are published under their exact name with no target
    /// user. Direct topics are published with the placeholder substituted by
    /// the target user id; the longest matching prefix wins.
    pub fn resolve_published(
        &self,
        published: &str,
        target_user: Option<&str>,
    ) -> Result<TopicDescriptor, RealtimeError> {
        let invalid = |reason: &'static str| RealtimeError::InvalidTarget {
            topic: published.to_string(),
            reason,
        };

        if let Some(entry) = self.topics.get(published) {
            let topic = entry.value();
            return match topic.kind {
                TopicKind::Broadcast if target_user.is_some() => {
                    Err(invalid("broadcast topics must not carry a target user"))
                }
                TopicKind::Broadcast => Ok(topic.clone()),
                TopicKind::Direct => Err(invalid(
                    "direct topics are published with the recipient substituted",
                )),
            };
        }

        let mut best: Option<TopicDescriptor> = None;
        for entry in self.topics.iter() {
            let topic = entry.value();
            let Some(prefix) = topic.direct_prefix() else {
                continue;
            };
            let is_candidate = published
                .strip_prefix(prefix)
                .is_some_and(|rest| !rest.is_empty());
            let is_longer = best
                .as_ref()
                .and_then(|b| b.direct_prefix())
                .is_none_or(|p| prefix.len() > p.len());
            if is_candidate && is_longer {
                best = Some(topic.clone());
            }
        }

        let Some(topic) = best else {
            return Err(RealtimeError::UnknownTopic(published.to_string()));
        };

        match target_user {
            None | Some("") => Err(invalid("direct topics require a target user")),
            Some(user) if topic.matches(published, Some(user)) => Ok(topic),
            Some(_) => Err(invalid("target user does not match the recipient segment")),
        }
    }

    /// All registered topics, sorted by name.
    pub fn list(&self) -> Vec<TopicDescriptor> {
        let mut topics: Vec<TopicDescriptor> =
            self.topics.iter().map(|e| e.value().clone()).collect();
        topics.sort_by(|a, b| a.name.cmp(&b.name));
        topics
    }

    /// Number of registered topics.
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Whether no topics are registered.
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
