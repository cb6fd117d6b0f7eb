use std::sync::Arc;

use super::{Concept, Fact, FactType, MemoryProvider, MemoryScope, MemorySubject};
use crate::core::error::AgentError;
use crate::core::graph::StrategyNode;
use crate::core::session::StructuredRequestConfig;
use crate::core::value::ValueKind;

fn facts_message(subject: &MemorySubject, concept: &Concept, facts: &[Fact]) -> String {
    let mut message = format!(
        "Known facts about {} regarding {} ({}):",
        subject, concept.keyword, concept.description
    );
    for fact in facts {
        for value in fact.value.values() {
            message.push_str("\n- ");
            message.push_str(value);
        }
    }
    message
}

/// Loads facts for each concept and adds them to the prompt as user messages.
/// The input passes through.
pub fn node_load_from_memory(
    name: impl Into<String>,
    provider: Arc<dyn MemoryProvider>,
    concepts: Vec<Concept>,
    subject: MemorySubject,
    scope: MemoryScope,
) -> StrategyNode {
    StrategyNode::from_fn(name, ValueKind::Any, ValueKind::Any, move |ctx, input| {
        let provider = Arc::clone(&provider);
        let concepts = concepts.clone();
        let subject = subject.clone();
        let scope = scope.clone();
        Box::pin(async move {
            let mut messages = Vec::new();
            for concept in &concepts {
                let facts = provider.load(concept, &subject, &scope).await?;
                if !facts.is_empty() {
                    messages.push(facts_message(&subject, concept, &facts));
                }
            }
            if messages.is_empty() {
                log::debug!("No facts about {} to load", subject);
                return Ok(input);
            }
            ctx.llm()
                .write_session(move |session| {
                    Box::pin(async move {
                        session.update_prompt(|p| {
                            for message in messages {
                                p.user(message);
                            }
                        })
                    })
                })
                .await?;
            Ok(input)
        })
    })
}

/// Saves the text input as a fact about `concept`. The input passes through.
pub fn node_save_to_memory(
    name: impl Into<String>,
    provider: Arc<dyn MemoryProvider>,
    concept: Concept,
    subject: MemorySubject,
    scope: MemoryScope,
) -> StrategyNode {
    StrategyNode::from_fn(name, ValueKind::Text, ValueKind::Text, move |_ctx, input| {
        let provider = Arc::clone(&provider);
        let concept = concept.clone();
        let subject = subject.clone();
        let scope = scope.clone();
        Box::pin(async move {
            let text = input.as_text().unwrap_or_default().to_string();
            let fact = match concept.fact_type {
                FactType::Single => Fact::single(concept, text),
                FactType::Multiple => Fact::multiple(concept, vec![text]),
            };
            provider.save(fact, &subject, &scope).await?;
            Ok(input)
        })
    })
}

/// Asks the model to extract facts about `concept` from the conversation and
/// saves them. The extraction exchange is not kept in the prompt.
pub fn node_save_facts_from_history(
    name: impl Into<String>,
    provider: Arc<dyn MemoryProvider>,
    concept: Concept,
    subject: MemorySubject,
    scope: MemoryScope,
) -> StrategyNode {
    StrategyNode::from_fn(name, ValueKind::Any, ValueKind::Any, move |ctx, input| {
        let provider = Arc::clone(&provider);
        let concept = concept.clone();
        let subject = subject.clone();
        let scope = scope.clone();
        Box::pin(async move {
            let request = format!(
                "From the conversation above, extract what is known about {} regarding {} ({}). \
                 Reply with a JSON array of strings, one fact per entry.",
                subject, concept.keyword, concept.description
            );
            let values = ctx
                .llm()
                .write_session(move |session| {
                    Box::pin(async move {
                        let original = session.prompt()?.clone();
                        session.update_prompt(|p| {
                            p.user(request);
                        })?;
                        let extracted = session
                            .request_llm_structured::<Vec<String>>(StructuredRequestConfig::default())
                            .await?;
                        session.rewrite_prompt(|_| original)?;
                        Ok(extracted.structure)
                    })
                })
                .await?;

            if values.is_empty() {
                log::debug!("No facts about {} found in history", concept.keyword);
                return Ok(input);
            }
            let fact = match concept.fact_type {
                FactType::Single => {
                    let last = values.into_iter().last().unwrap_or_default();
                    Fact::single(concept, last)
                }
                FactType::Multiple => Fact::multiple(concept, values),
            };
            provider
                .save(fact, &subject, &scope)
                .await
                .map_err(|e| AgentError::Memory(format!("failed to save extracted facts: {}", e)))?;
            Ok(input)
        })
    })
}
