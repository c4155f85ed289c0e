//! Extraction prompt and tool schema
//!
//! The system prompt is written in Indonesian because the source articles
//! and the target vocabulary (entity categories, relation names) are
//! Indonesian. The category lists are injected from [`crate::graph`] so
//! the prompt, the tool schema, and the record model cannot drift apart.

use serde_json::{json, Value};

use crate::graph::{ENTITY_TYPES, RELATION_TYPES};

/// Function name the model is forced to call.
pub const TOOL_NAME: &str = "investment_news_entities";

/// System prompt for the extraction call.
pub fn system_prompt() -> String {
    let entity_types = ENTITY_TYPES.join(", ");
    let relation_types = RELATION_TYPES.join(", ");

    format!(
        "Anda adalah ahli ekstraksi entitas dari berita investasi Indonesia.\n\
         Tugas Anda adalah mengekstrak SEMUA hubungan entitas yang ada di dalam teks \
         dan mengembalikannya dalam format JSON sesuai dengan model berikut:\n\
         \n\
         Setiap hubungan harus memiliki field:\n\
         - subject: Entitas utama (contoh: \"bank indonesia\").\n\
         - subject_type: Tipe entitas, pilih salah satu dari [{entity_types}]. \
         Gunakan huruf kapital semua.\n\
         - relation: Hubungan antar entitas, pilih salah satu dari [{relation_types}].\n\
         - object: Entitas target.\n\
         - object_type: Tipe entitas target, dengan pilihan yang sama seperti subject_type.\n\
         \n\
         Aturan:\n\
         1. Jangan menambah field atau mengganti nama field.\n\
         2. Hanya keluarkan data yang ada dalam teks tanpa menciptakan informasi baru.\n\
         3. Jika tidak ada hubungan yang terdeteksi, keluarkan \"[]\" (sebuah array kosong).\n\
         4. Pastikan semua nilai sesuai dengan daftar yang telah disediakan dan \
         menggunakan huruf kapital.\n\
         \n\
         Contoh output:\n\
         [{{\n  \
         \"subject\": \"bank indonesia\",\n  \
         \"subject_type\": \"BADAN_REGULATOR\",\n  \
         \"relation\": \"Mengendalikan\",\n  \
         \"object\": \"suku bunga\",\n  \
         \"object_type\": \"INSTRUMEN_FINANSIAL\"\n\
         }}]\n\
         \n\
         Pastikan output yang Anda kembalikan adalah JSON yang valid."
    )
}

/// JSON schema for the forced tool call: `{ "entities": [relation, ...] }`.
pub fn tool_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "entities": {
                "type": "array",
                "description": "Daftar hubungan entitas dari berita",
                "items": {
                    "type": "object",
                    "properties": {
                        "subject": {
                            "type": "string",
                            "description": "Entitas utama, contoh: 'Bank Indonesia'"
                        },
                        "subject_type": { "type": "string", "enum": ENTITY_TYPES },
                        "relation": { "type": "string", "enum": RELATION_TYPES },
                        "object": {
                            "type": "string",
                            "description": "Entitas target"
                        },
                        "object_type": { "type": "string", "enum": ENTITY_TYPES }
                    },
                    "required": ["subject", "subject_type", "relation", "object", "object_type"]
                }
            }
        },
        "required": ["entities"]
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_lists_every_category() {
        let prompt = system_prompt();
        for entity_type in ENTITY_TYPES {
            assert!(prompt.contains(entity_type), "missing {entity_type}");
        }
        for relation in RELATION_TYPES {
            assert!(prompt.contains(relation), "missing {relation}");
        }
    }

    #[test]
    fn tool_schema_enumerates_vocabulary() {
        let schema = tool_parameters();
        let subject_enum = &schema["properties"]["entities"]["items"]["properties"]["subject_type"]["enum"];
        assert_eq!(subject_enum.as_array().map(Vec::len), Some(14));

        let relation_enum = &schema["properties"]["entities"]["items"]["properties"]["relation"]["enum"];
        assert_eq!(relation_enum.as_array().map(Vec::len), Some(15));
    }
}
