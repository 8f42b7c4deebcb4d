//! Tagged-discriminant wrapper types mirroring the `.audioinfo.json` schema
//! named in spec §6: `__Path__` for filesystem paths and `__datetime__` for
//! instants (Unix seconds, no zone — the same shape as the teacher's
//! `whisperd::local_ts_seconds` serde module, generalized from a bare
//! integer to a tagged object so the schema is self-describing on disk).

use std::path::PathBuf;

use chrono::{DateTime, Local, TimeZone};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaggedPath(pub PathBuf);

impl From<PathBuf> for TaggedPath {
    fn from(p: PathBuf) -> Self {
        TaggedPath(p)
    }
}

impl Serialize for TaggedPath {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = ser.serialize_map(Some(1))?;
        map.serialize_entry("__Path__", &self.0.to_string_lossy())?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for TaggedPath {
    fn deserialize<D>(de: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(rename = "__Path__")]
            path: String,
        }
        let w = Wrapper::deserialize(de)?;
        Ok(TaggedPath(PathBuf::from(w.path)))
    }
}

/// An instant serialized as Unix seconds under a `__datetime__` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedInstant(pub DateTime<Local>);

impl Serialize for TaggedInstant {
    fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = ser.serialize_map(Some(1))?;
        map.serialize_entry("__datetime__", &self.0.timestamp())?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for TaggedInstant {
    fn deserialize<D>(de: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(rename = "__datetime__")]
            seconds: i64,
        }
        let w = Wrapper::deserialize(de)?;
        let dt = Local
            .timestamp_opt(w.seconds, 0)
            .single()
            .ok_or_else(|| D::Error::custom("invalid __datetime__ seconds"))?;
        Ok(TaggedInstant(dt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_round_trips() {
        let p = TaggedPath(PathBuf::from("/tmp/foo.flac"));
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#"{"__Path__":"/tmp/foo.flac"}"#);
        let back: TaggedPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn instant_round_trips_to_the_second() {
        let now = Local.timestamp_opt(1_700_000_000, 0).single().unwrap();
        let ti = TaggedInstant(now);
        let json = serde_json::to_string(&ti).unwrap();
        let back: TaggedInstant = serde_json::from_str(&json).unwrap();
        assert_eq!(back.0.timestamp(), ti.0.timestamp());
    }
}
