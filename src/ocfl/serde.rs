//! Custom serialization between the OCFL JSON shapes and the in-memory model.

/// (De)serializes a version's `state` block. On disk OCFL maps each digest to the list of
/// logical paths bound to it; in memory the map is inverted to logical path -> digest so
/// state lookups are direct.
pub mod digest_path_map {
    use std::collections::BTreeMap;

    use serde::de::{Deserializer, Error};
    use serde::ser::Serializer;
    use serde::{Deserialize, Serialize};

    use crate::ocfl::digest::HexDigest;

    pub fn serialize<S>(
        state: &BTreeMap<String, HexDigest>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut inverted: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for (path, digest) in state {
            inverted.entry(digest.as_str()).or_default().push(path);
        }

        inverted.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, HexDigest>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let on_disk: BTreeMap<String, Vec<String>> = Deserialize::deserialize(deserializer)?;

        let mut state = BTreeMap::new();

        for (digest, paths) in on_disk {
            for path in paths {
                if state
                    .insert(path.clone(), HexDigest::from(digest.as_str()))
                    .is_some()
                {
                    return Err(D::Error::custom(format!(
                        "logical path {} is mapped to multiple digests",
                        path
                    )));
                }
            }
        }

        Ok(state)
    }
}
