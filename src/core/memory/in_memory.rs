use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Concept, Fact, MemoryProvider, MemoryScope, MemorySubject};
use crate::core::error::AgentError;

type Bucket = (MemorySubject, MemoryScope);

/// Keeps facts in process memory. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryMemoryProvider {
    facts: RwLock<HashMap<Bucket, Vec<Fact>>>,
}

impl InMemoryMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    async fn select(
        &self,
        subject: &MemorySubject,
        scope: &MemoryScope,
        keep: impl Fn(&Fact) -> bool,
    ) -> Vec<Fact> {
        let facts = self.facts.read().await;
        facts
            .get(&(subject.clone(), scope.clone()))
            .map(|bucket| bucket.iter().filter(|f| keep(f)).cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MemoryProvider for InMemoryMemoryProvider {
    async fn save(
        &self,
        fact: Fact,
        subject: &MemorySubject,
        scope: &MemoryScope,
    ) -> Result<(), AgentError> {
        log::debug!("Remembering '{}' about {}", fact.concept.keyword, subject);
        self.facts
            .write()
            .await
            .entry((subject.clone(), scope.clone()))
            .or_default()
            .push(fact);
        Ok(())
    }

    async fn load(
        &self,
        concept: &Concept,
        subject: &MemorySubject,
        scope: &MemoryScope,
    ) -> Result<Vec<Fact>, AgentError> {
        Ok(self
            .select(subject, scope, |f| f.concept.keyword == concept.keyword)
            .await)
    }

    async fn load_all(
        &self,
        subject: &MemorySubject,
        scope: &MemoryScope,
    ) -> Result<Vec<Fact>, AgentError> {
        Ok(self.select(subject, scope, |_| true).await)
    }

    async fn load_by_description(
        &self,
        description: &str,
        subject: &MemorySubject,
        scope: &MemoryScope,
    ) -> Result<Vec<Fact>, AgentError> {
        let needle = description.to_lowercase();
        Ok(self
            .select(subject, scope, |f| {
                f.concept.keyword.to_lowercase().contains(&needle)
                    || f.concept.description.to_lowercase().contains(&needle)
            })
            .await)
    }
}
