//! Knowledge-graph record model
//!
//! The extraction pipeline emits (subject, relation, object) triples with
//! type annotations, tagged with the publication date of the source
//! article. Records go to a newline-delimited JSON stream; failures are
//! recorded as error lines in the same stream rather than aborting a run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Category Vocabulary
// ============================================================================

/// Entity categories the extraction prompt offers the model.
///
/// The pipeline does not validate against this list — whatever the model
/// returns is passed through. The list exists to build the prompt and the
/// tool schema.
pub const ENTITY_TYPES: [&str; 14] = [
    "ORGANISASI",
    "PEMERINTAHAN",
    "BADAN_REGULATOR",
    "NEGARA",
    "KOTA",
    "WILAYAH",
    "ORANG",
    "PERUSAHAAN",
    "PRODUK",
    "EVENT",
    "SEKTOR",
    "INDIKATOR_EKONOMI",
    "INSTRUMEN_FINANSIAL",
    "KONSEP",
];

/// Relation names the extraction prompt offers the model.
pub const RELATION_TYPES: [&str; 15] = [
    "Memiliki",
    "Mengumumkan",
    "BeroperasiDi",
    "Memperkenalkan",
    "Menghasilkan",
    "Mengendalikan",
    "Berpartisipasi",
    "Mempengaruhi",
    "BerdampakPositif",
    "BerdampakNegatif",
    "Mengaitkan",
    "AnggotaDari",
    "BerinvestasiDi",
    "Meningkatkan",
    "Menurunkan",
];

// ============================================================================
// Types
// ============================================================================

/// One extracted entity relation, exactly as the model returns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRelation {
    /// Main entity, e.g. "bank indonesia"
    pub subject: String,
    /// Category of the main entity (one of [`ENTITY_TYPES`] when the model behaves)
    pub subject_type: String,
    /// Relation name (one of [`RELATION_TYPES`] when the model behaves)
    pub relation: String,
    /// Target entity
    pub object: String,
    /// Category of the target entity
    pub object_type: String,
}

/// One line of the output stream: a dated entity relation, or an error
/// marker carrying enough context for manual inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputRecord {
    /// Successful extraction, tagged with the article's publication date.
    Entity {
        #[serde(flatten)]
        entity: EntityRelation,
        date: String,
    },
    /// Terminal failure or empty result for one article.
    Error {
        error: String,
        date: String,
        /// Raw model output, or the original article text after exhausted retries.
        content: Value,
    },
}

impl OutputRecord {
    pub fn entity(entity: EntityRelation, date: impl Into<String>) -> Self {
        Self::Entity {
            entity,
            date: date.into(),
        }
    }

    pub fn error(error: impl Into<String>, date: impl Into<String>, content: Value) -> Self {
        Self::Error {
            error: error.into(),
            date: date.into(),
            content,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
