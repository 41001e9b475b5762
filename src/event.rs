use std::fmt::Display;
use std::io::{self, Write};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Milliseconds since the unix epoch. A clock set before 1970 reads as zero.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Whole seconds since the unix epoch.
pub fn unix_seconds() -> u64 {
    unix_millis() / 1000
}

/// One synthetic geo-tagged price record.
///
/// On the wire every field is a JSON string:
/// `{"geo":"AF","price":"42","ts":"1700000000000"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Event {
    #[serde(rename = "geo")]
    pub region: &'static str,
    #[serde(serialize_with = "ser_display")]
    pub price: u32,
    #[serde(rename = "ts", serialize_with = "ser_display")]
    pub timestamp_ms: u64,
}

impl Event {
    /// Encode as a single newline-terminated JSON line, replacing `buf`'s contents.
    pub fn encode_line(&self, buf: &mut Vec<u8>) -> Result<(), serde_json::Error> {
        buf.clear();
        serde_json::to_writer(&mut *buf, self)?;
        buf.push(b'\n');
        Ok(())
    }

    /// Write the encoded line with a single `write_all`.
    pub fn write_line<W: Write>(&self, writer: &mut W, buf: &mut Vec<u8>) -> io::Result<()> {
        self.encode_line(buf)?;
        writer.write_all(buf)
    }
}

/// Owned form of a received line, as parsed by downstream readers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventLine {
    pub geo: String,
    #[serde(deserialize_with = "de_from_str")]
    pub price: u32,
    #[serde(deserialize_with = "de_from_str")]
    pub ts: u64,
}

impl EventLine {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim_end())
    }

    pub fn matches(&self, event: &Event) -> bool {
        self.geo == event.region && self.price == event.price && self.ts == event.timestamp_ms
    }
}

fn ser_display<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

// numbers travel as strings
fn de_from_str<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: FromStr,
    T::Err: Display,
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse()
        .map_err(|e| D::Error::custom(format!("parse number error: {}", e)))
}
