//! Topic index: signature topic → event shape, plus name lookups.
//!
//! Built once per contract binding and read-only afterwards, so it can be
//! shared behind an `Arc` without locking.

use std::collections::HashMap;

use alloy_primitives::B256;
use tracing::{debug, warn};

use crate::error::AbiError;
use crate::shape::EventShape;

#[derive(Debug, Clone, Default)]
pub struct TopicIndex {
    shapes: Vec<EventShape>,
    by_topic: HashMap<B256, usize>,
    by_name: HashMap<String, usize>,
    by_signature: HashMap<String, usize>,
}

impl TopicIndex {
    /// Index shapes in the order given.
    ///
    /// When two shapes share a topic or a name, the first one registered wins.
    /// Anonymous events have no signature topic and are reachable by name only.
    pub fn build(shapes: impl IntoIterator<Item = EventShape>) -> Self {
        let mut index = Self::default();
        for shape in shapes {
            index.insert(shape);
        }
        index
    }

    pub fn from_abi_json(json: &str) -> Result<Self, AbiError> {
        Ok(Self::build(EventShape::from_abi_json(json)?))
    }

    fn insert(&mut self, shape: EventShape) {
        let slot = self.shapes.len();

        if !shape.anonymous {
            match self.by_topic.get(&shape.topic) {
                Some(&existing) if self.shapes[existing].signature != shape.signature => {
                    warn!(
                        topic = %shape.topic,
                        kept = %self.shapes[existing].signature,
                        shadowed = %shape.signature,
                        "event topic collision, keeping first registered shape"
                    );
                }
                Some(_) => {
                    debug!(signature = %shape.signature, "duplicate event definition ignored");
                }
                None => {
                    self.by_topic.insert(shape.topic, slot);
                }
            }
        }
        self.by_name.entry(shape.name.clone()).or_insert(slot);
        self.by_signature.entry(shape.signature.clone()).or_insert(slot);
        self.shapes.push(shape);
    }

    /// The shape whose signature topic is `topic`.
    pub fn resolve(&self, topic: &B256) -> Option<&EventShape> {
        self.by_topic.get(topic).map(|&i| &self.shapes[i])
    }

    /// Look up by bare name (first declared overload) or by full signature.
    pub fn lookup(&self, name_or_signature: &str) -> Option<&EventShape> {
        let slot = if name_or_signature.contains('(') {
            self.by_signature.get(name_or_signature)
        } else {
            self.by_name.get(name_or_signature)
        };
        slot.map(|&i| &self.shapes[i])
    }

    /// Every registered shape in registration order, including shadowed ones.
    pub fn shapes(&self) -> &[EventShape] {
        &self.shapes
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}
