use std::fmt::Display;

use chrono::{Local, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};

/// A single chat line as returned by the chat API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(deserialize_with = "exact_int")]
    pub id: i64,
    /// Unix epoch seconds.
    #[serde(deserialize_with = "epoch_seconds")]
    pub posted: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub message: String,
}

/// The API is inconsistent about numeric fields: accept `123` and `"123"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawInt {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Ids must be whole numbers; `1.5` would otherwise alias id `1` in the dedup set.
fn exact_int<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawInt::deserialize(deserializer)? {
        RawInt::Int(n) => Ok(n),
        RawInt::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(f as i64),
        RawInt::Float(f) => Err(serde::de::Error::custom(format!(
            "expected a whole number, got {f}"
        ))),
        RawInt::Text(s) => s
            .trim()
            .parse()
            .map_err(|e| serde::de::Error::custom(format!("invalid integer '{s}': {e}"))),
    }
}

/// Timestamps only need second precision; fractions are dropped.
fn epoch_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawInt::deserialize(deserializer)? {
        RawInt::Int(n) => Ok(n),
        RawInt::Float(f) if f.is_finite() => Ok(f.trunc() as i64),
        RawInt::Float(f) => Err(serde::de::Error::custom(format!(
            "invalid timestamp {f}"
        ))),
        RawInt::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .or_else(|_| match s.parse::<f64>() {
                    Ok(f) if f.is_finite() => Ok(f.trunc() as i64),
                    _ => Err(()),
                })
                .map_err(|_| serde::de::Error::custom(format!("invalid timestamp '{s}'")))
        }
    }
}

/// Render `HH:MM **name**: text` using the local time zone.
pub fn format_message(msg: &ChatMessage) -> String {
    format_message_in(msg, &Local)
}

/// Render `HH:MM **name**: text` in the given time zone.
pub fn format_message_in<Tz>(msg: &ChatMessage, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let time = tz
        .timestamp_opt(msg.posted, 0)
        .single()
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| "??:??".to_string());
    format!("{time} **{}**: {}", msg.name, msg.message)
}

/// The `count` most recently posted messages, oldest first.
pub fn most_recent(mut messages: Vec<ChatMessage>, count: usize) -> Vec<ChatMessage> {
    messages.sort_by_key(|m| m.posted);
    let skip = messages.len().saturating_sub(count);
    messages.split_off(skip)
}
