//! Serde helpers for persistent cache serialization
//!
//! The global caches are keyed maps that are written as arrays of
//! `[key, value]` pairs rather than JSON objects, so the file stays readable
//! by consumers that expect the pair-list layout. Reading also accepts a
//! plain object.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// `#[serde(with = "crate::serde_helpers::map_as_pairs")]`
pub mod map_as_pairs {
    use super::*;

    /// Serialize a `HashMap<K, V>` as `[[k, v], ...]`, ordered by key so
    /// identical tables produce identical bytes.
    pub fn serialize<S, K, V>(map: &HashMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        K: Serialize + Ord,
        V: Serialize,
    {
        use serde::ser::SerializeSeq;
        let mut entries: Vec<(&K, &V)> = map.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        let mut seq = serializer.serialize_seq(Some(entries.len()))?;
        for entry in entries {
            seq.serialize_element(&entry)?;
        }
        seq.end()
    }

    /// Deserialize either `[[k, v], ...]` or `{k: v, ...}`.
    pub fn deserialize<'de, D, K, V>(deserializer: D) -> Result<HashMap<K, V>, D::Error>
    where
        D: Deserializer<'de>,
        K: Deserialize<'de> + Eq + Hash,
        V: Deserialize<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum PairsOrMap<K: Eq + Hash, V> {
            Pairs(Vec<(K, V)>),
            Map(HashMap<K, V>),
        }

        Ok(match PairsOrMap::deserialize(deserializer)? {
            PairsOrMap::Pairs(pairs) => pairs.into_iter().collect(),
            PairsOrMap::Map(map) => map,
        })
    }
}
