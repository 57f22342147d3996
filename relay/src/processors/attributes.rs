//! Attribute mutation.

use super::Processor;
use crate::config::{AttributeAction, AttributeActionKind};
use crate::signal::SignalBatch;
use async_trait::async_trait;

/// Applies a configured list of attribute actions to every signal in a batch,
/// in declaration order. Later actions observe the effect of earlier ones.
pub struct AttributesProcessor {
    name: String,
    actions: Vec<AttributeAction>,
}

impl AttributesProcessor {
    pub fn new(name: &str, actions: Vec<AttributeAction>) -> Self {
        Self {
            name: name.to_string(),
            actions,
        }
    }
}

#[async_trait]
impl Processor for AttributesProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, mut batch: SignalBatch) -> Option<SignalBatch> {
        for signal in &mut batch.signals {
            let attributes = signal.attributes_mut();
            for action in &self.actions {
                match action.action {
                    AttributeActionKind::Insert => {
                        // Config validation guarantees a value for non-delete actions.
                        if let Some(value) = &action.value {
                            attributes
                                .entry(action.key.clone())
                                .or_insert_with(|| value.clone());
                        }
                    }
                    AttributeActionKind::Update => {
                        if let (Some(existing), Some(value)) =
                            (attributes.get_mut(&action.key), &action.value)
                        {
                            *existing = value.clone();
                        }
                    }
                    AttributeActionKind::Upsert => {
                        if let Some(value) = &action.value {
                            attributes.insert(action.key.clone(), value.clone());
                        }
                    }
                    AttributeActionKind::Delete => {
                        attributes.remove(&action.key);
                    }
                }
            }
        }
        Some(batch)
    }
}
