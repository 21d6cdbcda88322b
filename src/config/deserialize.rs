// SPDX-License-Identifier: GPL-3.0-only
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;

/// Deserialize a mapping into a list of entries, keeping document order
///
/// Images are processed in the order they are written, so a plain map type
/// would lose information. Duplicate keys are rejected.
pub fn deserialize_ordered<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct OrderedVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a mapping of image names to image definitions")
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut seen = HashSet::new();
            let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));

            while let Some((key, value)) = access.next_entry::<String, V>()? {
                if !seen.insert(key.clone()) {
                    return Err(serde::de::Error::custom(format!("duplicate image '{}'", key)));
                }
                entries.push((key, value));
            }

            Ok(entries)
        }
    }

    deserializer.deserialize_any(OrderedVisitor(PhantomData))
}
