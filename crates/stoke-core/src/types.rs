//! Domain records for the two store collections.

use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use stoke_store::{Document, StoreError};

/// Target cadence of a habit. Display capitalization only; the core derives
/// no scheduling from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    /// Capitalized form for display.
    pub fn label(&self) -> &'static str {
        match self {
            Frequency::Daily => "Daily",
            Frequency::Weekly => "Weekly",
            Frequency::Monthly => "Monthly",
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            other => Err(format!("unknown frequency: {other}")),
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        })
    }
}

/// A recurring user-defined task with a running streak.
///
/// `streak_count` and `last_completed` change only as the side effect of a
/// successful completion write; nothing else edits them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Habit {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub frequency: Frequency,
    #[serde(default)]
    pub streak_count: u32,
    #[serde(default)]
    pub last_completed: Option<DateTime<Utc>>,
}

/// A timestamped record that a habit was performed on a given day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Completion {
    #[serde(default)]
    pub id: String,
    pub habit_id: String,
    pub user_id: String,
    pub completed_at: DateTime<Utc>,
}

/// Decode a store document into a domain record, keeping the document
/// identity in the error.
pub(crate) fn decode<T: serde::de::DeserializeOwned>(doc: &Document) -> Result<T> {
    doc.deserialize().map_err(|e| match e {
        StoreError::Json(source) => CoreError::Decode {
            collection: doc.collection.clone(),
            id: doc.id.clone(),
            source,
        },
        other => CoreError::Store(other),
    })
}

/// Start of the local calendar day containing `now`, as a UTC instant.
pub fn start_of_local_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = now
        .with_timezone(&Local)
        .date_naive()
        .and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&midnight).earliest() {
        Some(start) => start.with_timezone(&Utc),
        // Midnight can fall in a DST gap; the day then starts at `now`.
        None => now,
    }
}

/// Local calendar day stamp, e.g. `2026-08-07`.
pub fn local_day_stamp(now: DateTime<Utc>) -> String {
    now.with_timezone(&Local).format("%Y-%m-%d").to_string()
}

/// Deterministic completion id for one habit on one local day.
///
/// Two writers completing the same habit on the same day pick the same id,
/// so the store's id uniqueness turns the second write into a conflict
/// instead of a duplicate completion.
pub fn completion_id(habit_id: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}", habit_id, local_day_stamp(now))
}
