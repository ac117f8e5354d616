// 🏷️ Target Classifier - Mention → WasteStream | Facility
//
// The stream enumeration is closed: a mention equal to a known stream is a
// WasteStream and never a Facility. Everything else is a Facility name.

use crate::graph::{NodeLabel, RelType};
use crate::identity::{assign_uid, canonical_key, Uid};
use crate::normalizer::TextNormalizer;
use crate::vocabulary::Vocabulary;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A classified disposal target, carrying its canonical display name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    WasteStream(String),
    Facility(String),
}

impl Target {
    pub fn name(&self) -> &str {
        match self {
            Target::WasteStream(name) | Target::Facility(name) => name,
        }
    }

    pub fn label(&self) -> NodeLabel {
        match self {
            Target::WasteStream(_) => NodeLabel::WasteStream,
            Target::Facility(_) => NodeLabel::Facility,
        }
    }

    /// Relationship from a WasteItem to this target
    pub fn relationship(&self) -> RelType {
        match self {
            Target::WasteStream(_) => RelType::DisposedIn,
            Target::Facility(_) => RelType::DisposedAt,
        }
    }

    pub fn key(&self) -> String {
        canonical_key(self.name())
    }

    pub fn uid(&self) -> Uid {
        assign_uid(self.name())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.label(), self.name())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TargetClassifier<'a> {
    normalizer: TextNormalizer<'a>,
}

impl<'a> TargetClassifier<'a> {
    pub fn new(vocabulary: &'a Vocabulary) -> Self {
        TargetClassifier {
            normalizer: TextNormalizer::new(vocabulary),
        }
    }

    /// Normalize the mention, then check the stream enumeration
    pub fn classify(&self, mention: &str) -> Target {
        let name = self.normalizer.normalize(mention);

        match self.normalizer.vocabulary().waste_stream(&name) {
            Some(stream) => Target::WasteStream(stream.to_string()),
            None => Target::Facility(name),
        }
    }
}
