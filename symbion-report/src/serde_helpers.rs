//! Encodage direct des maps persistantes.
//!
//! Les conteneurs chauds (nœuds, latest, compteurs...) ne passent pas par un
//! `BTreeMap` intermédiaire : ils s'écrivent et se relisent entrée par entrée,
//! avec la clé internée au vol. Le résultat sur le fil est identique à celui
//! d'une map standard, champs vides omis compris.

use crate::intern::intern;
use crate::persistent::PersistentMap;
use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Map key decoded through the intern table.
pub(crate) struct InternedKey(pub(crate) Arc<str>);

impl<'de> Deserialize<'de> for InternedKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl Visitor<'_> for KeyVisitor {
            type Value = InternedKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string key")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<InternedKey, E> {
                Ok(InternedKey(intern(v)))
            }

            fn visit_string<E: serde::de::Error>(self, v: String) -> Result<InternedKey, E> {
                Ok(InternedKey(intern(&v)))
            }
        }

        deserializer.deserialize_str(KeyVisitor)
    }
}

pub(crate) fn serialize_map<S, V>(
    map: &PersistentMap<Arc<str>, V>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    let mut out = serializer.serialize_map(Some(map.len()))?;
    for (k, v) in map.iter() {
        out.serialize_entry(k.as_ref(), v)?;
    }
    out.end()
}

pub(crate) fn deserialize_map<'de, D, V>(
    deserializer: D,
) -> Result<PersistentMap<Arc<str>, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de> + Clone,
{
    struct MapVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de> + Clone> Visitor<'de> for MapVisitor<V> {
        type Value = PersistentMap<Arc<str>, V>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map with string keys")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut map = PersistentMap::new();
            while let Some((key, value)) = access.next_entry::<InternedKey, V>()? {
                map = map.insert(key.0, value);
            }
            Ok(map)
        }
    }

    deserializer.deserialize_map(MapVisitor(PhantomData))
}
