use std::fmt;

use serde::{Deserialize, Serialize, de};

use crate::event::Key;

/// Accepts either a `KEY_*` name or a raw key code.
struct KeyVisitor;

impl<'de> de::Visitor<'de> for KeyVisitor {
    type Value = Key;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a `KEY_*` name or a raw 16-bit key code")
    }

    fn visit_str<E>(self, v: &str) -> Result<Key, E>
    where
        E: de::Error,
    {
        v.parse().map_err(|_| E::custom(format!("unknown key name '{v}'")))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Key, E>
    where
        E: de::Error,
    {
        match u16::try_from(v) {
            Ok(raw) => Ok(Key::from_raw(raw)),
            Err(_) => Err(E::invalid_value(
                de::Unexpected::Unsigned(v),
                &"unsigned 16-bit value",
            )),
        }
    }

    fn visit_i64<E>(self, v: i64) -> Result<Key, E>
    where
        E: de::Error,
    {
        match u64::try_from(v) {
            Ok(v) => self.visit_u64(v),
            Err(_) => Err(E::invalid_value(
                de::Unexpected::Signed(v),
                &"unsigned 16-bit value",
            )),
        }
    }
}

/// Human-readable formats accept a name (`KEY_ENTER`) or a raw code, binary formats the raw code.
impl<'de> Deserialize<'de> for Key {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(KeyVisitor)
        } else {
            u16::deserialize(deserializer).map(Key::from_raw)
        }
    }
}

impl Serialize for Key {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self.name() {
            Some(name) if serializer.is_human_readable() => serializer.collect_str(name),
            _ => self.raw().serialize(serializer),
        }
    }
}
