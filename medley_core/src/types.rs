//! Core domain types for the Medley health tracker.
//!
//! This module defines the fundamental types used throughout the system:
//! - Medications, their recurrence rule and time of day
//! - Scheduled reminders and their repeat behaviour
//! - Journal records (symptoms, moods, eScripts)
//! - Record collection kinds

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Recurrence
// ============================================================================

/// How often a medication is nominally taken
///
/// Stored strings that are not recognized load as `Daily`. User input goes
/// through `FromStr`, which rejects them.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(from = "String", into = "String")]
pub enum Frequency {
    #[default]
    Daily,
    TwiceDaily,
    Weekly,
    AsNeeded,
}

impl Frequency {
    pub const ALL: [Frequency; 4] = [
        Frequency::Daily,
        Frequency::TwiceDaily,
        Frequency::Weekly,
        Frequency::AsNeeded,
    ];

    /// Stable storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::TwiceDaily => "twice_daily",
            Frequency::Weekly => "weekly",
            Frequency::AsNeeded => "as_needed",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Frequency::Daily => "Daily",
            Frequency::TwiceDaily => "Twice Daily",
            Frequency::Weekly => "Weekly",
            Frequency::AsNeeded => "As Needed",
        }
    }

    fn recognize(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "daily" => Some(Frequency::Daily),
            "twice_daily" | "twicedaily" | "bid" => Some(Frequency::TwiceDaily),
            "weekly" => Some(Frequency::Weekly),
            "as_needed" | "asneeded" | "prn" => Some(Frequency::AsNeeded),
            _ => None,
        }
    }

    /// Parse a frequency, falling back to `Daily` for anything unrecognized
    pub fn parse(s: &str) -> Self {
        Frequency::recognize(s).unwrap_or_else(|| {
            tracing::debug!("Unknown frequency {:?}, treating as daily", s);
            Frequency::Daily
        })
    }

    /// Host repeat behaviour for the reminder of a medication with this frequency
    ///
    /// TwiceDaily maps to a single daily repeat: only one of the two doses
    /// gets a reminder.
    pub fn repeat_unit(&self) -> RepeatUnit {
        match self {
            Frequency::Daily | Frequency::TwiceDaily => RepeatUnit::Day,
            Frequency::Weekly => RepeatUnit::Week,
            Frequency::AsNeeded => RepeatUnit::None,
        }
    }
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Frequency::recognize(s).ok_or_else(|| {
            let known: Vec<&str> = Frequency::ALL.iter().map(|f| f.as_str()).collect();
            Error::validation(format!(
                "unknown frequency {:?}, expected one of {}",
                s,
                known.join(", ")
            ))
        })
    }
}

impl From<String> for Frequency {
    fn from(s: String) -> Self {
        Frequency::parse(&s)
    }
}

impl From<Frequency> for String {
    fn from(f: Frequency) -> Self {
        f.as_str().to_string()
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Wall-clock time of day (hour, minute) with no timezone attached
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    /// Build from hour (0-23) and minute (0-59)
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 {
            return Err(Error::validation(format!(
                "hour must be between 0 and 23, got {}",
                hour
            )));
        }
        if minute > 59 {
            return Err(Error::validation(format!(
                "minute must be between 0 and 59, got {}",
                minute
            )));
        }
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(TimeOfDay)
            .ok_or_else(|| Error::validation(format!("invalid time {}:{}", hour, minute)))
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }
}

impl Default for TimeOfDay {
    fn default() -> Self {
        TimeOfDay(NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN))
    }
}

impl FromStr for TimeOfDay {
    type Err = Error;

    /// Parse `H:MM` or `HH:MM`
    fn from_str(s: &str) -> Result<Self> {
        let (h, m) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| Error::validation(format!("time must be HH:MM, got {:?}", s)))?;
        let hour = h
            .parse::<u32>()
            .map_err(|_| Error::validation(format!("invalid hour in {:?}", s)))?;
        if m.len() != 2 {
            return Err(Error::validation(format!("time must be HH:MM, got {:?}", s)));
        }
        let minute = m
            .parse::<u32>()
            .map_err(|_| Error::validation(format!("invalid minute in {:?}", s)))?;
        TimeOfDay::new(hour, minute)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> Self {
        t.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

// ============================================================================
// Medication
// ============================================================================

/// Integral key under which the notification facility holds a reminder
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct NotificationId(pub u32);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A tracked medication
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    pub id: Uuid,
    pub notification_id: NotificationId,
    pub name: String,
    pub dosage: String,
    pub frequency: Frequency,
    pub time_of_day: TimeOfDay,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub next_dose_at: DateTime<Utc>,
    #[serde(default)]
    pub last_taken_at: Option<DateTime<Utc>>,
    #[serde(default = "default_reminder_enabled")]
    pub reminder_enabled: bool,
}

fn default_reminder_enabled() -> bool {
    true
}

/// Input for creating a medication
#[derive(Clone, Debug, Default)]
pub struct NewMedication {
    pub name: String,
    pub dosage: String,
    pub frequency: Frequency,
    pub time_of_day: TimeOfDay,
    pub notes: Option<String>,
}

/// Partial edit of a medication; `None` leaves a field unchanged
#[derive(Clone, Debug, Default)]
pub struct MedicationUpdate {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<Frequency>,
    pub time_of_day: Option<TimeOfDay>,
    /// `Some(None)` clears the notes
    pub notes: Option<Option<String>>,
    pub reminder_enabled: Option<bool>,
}

impl MedicationUpdate {
    /// True when the edit touches fields that feed the due-time computation
    pub fn changes_schedule(&self) -> bool {
        self.frequency.is_some() || self.time_of_day.is_some()
    }
}

// ============================================================================
// Reminders
// ============================================================================

/// Repeat behaviour of a host notification
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RepeatUnit {
    None,
    Day,
    Week,
}

/// Display payload handed to the notification facility
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderPayload {
    pub medication_id: Uuid,
    pub title: String,
    pub body: String,
}

/// A reminder as held by the notification facility
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledReminder {
    pub notification_id: NotificationId,
    pub fires_at: DateTime<Utc>,
    pub repeat: RepeatUnit,
    pub payload: ReminderPayload,
}

// ============================================================================
// Journal records
// ============================================================================

/// A logged symptom
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Symptom {
    pub id: Uuid,
    pub name: String,
    /// 1 (mild) to 10 (severe)
    pub severity: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Five-point mood scale
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MoodLevel {
    Great,
    Good,
    Okay,
    NotGood,
    Bad,
}

impl MoodLevel {
    pub const ALL: [MoodLevel; 5] = [
        MoodLevel::Great,
        MoodLevel::Good,
        MoodLevel::Okay,
        MoodLevel::NotGood,
        MoodLevel::Bad,
    ];

    /// Numeric score, 5 = great, 1 = bad
    pub fn value(&self) -> u8 {
        match self {
            MoodLevel::Great => 5,
            MoodLevel::Good => 4,
            MoodLevel::Okay => 3,
            MoodLevel::NotGood => 2,
            MoodLevel::Bad => 1,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MoodLevel::Great => "Great",
            MoodLevel::Good => "Good",
            MoodLevel::Okay => "Okay",
            MoodLevel::NotGood => "Not Good",
            MoodLevel::Bad => "Bad",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            MoodLevel::Great => "😊",
            MoodLevel::Good => "🙂",
            MoodLevel::Okay => "😐",
            MoodLevel::NotGood => "😟",
            MoodLevel::Bad => "😢",
        }
    }

    pub fn from_value(value: u8) -> Result<Self> {
        MoodLevel::ALL
            .into_iter()
            .find(|m| m.value() == value)
            .ok_or_else(|| {
                Error::validation(format!("mood must be between 1 and 5, got {}", value))
            })
    }
}

impl FromStr for MoodLevel {
    type Err = Error;

    /// Accepts a label (`great`, `not_good`, ...) or a score (`1`..`5`)
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        if let Ok(value) = normalized.parse::<u8>() {
            return MoodLevel::from_value(value);
        }
        match normalized.as_str() {
            "great" => Ok(MoodLevel::Great),
            "good" => Ok(MoodLevel::Good),
            "okay" | "ok" => Ok(MoodLevel::Okay),
            "not_good" | "notgood" => Ok(MoodLevel::NotGood),
            "bad" => Ok(MoodLevel::Bad),
            _ => Err(Error::validation(format!("unknown mood {:?}", s))),
        }
    }
}

/// A logged mood entry
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Mood {
    pub id: Uuid,
    pub level: MoodLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Lifecycle of an electronic prescription token
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScriptStatus {
    Active,
    Expired,
}

/// An electronic prescription token
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EScript {
    pub id: Uuid,
    pub token_code: String,
    pub medication_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prescriber: Option<String>,
    pub repeats: u32,
    pub remaining_repeats: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
    pub added_at: DateTime<Utc>,
    pub status: ScriptStatus,
}

impl EScript {
    /// True once the expiry date has passed, regardless of repeats left
    pub fn is_past_expiry(&self, today: NaiveDate) -> bool {
        self.expiry_date.map(|d| d < today).unwrap_or(false)
    }
}

// ============================================================================
// Record collections
// ============================================================================

/// The independent record collections held by the record store
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Symptom,
    Mood,
    Medication,
    EScript,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Symptom,
        RecordKind::Mood,
        RecordKind::Medication,
        RecordKind::EScript,
    ];

    /// Storage key for the collection
    pub fn key(&self) -> &'static str {
        match self {
            RecordKind::Symptom => "symptoms",
            RecordKind::Mood => "moods",
            RecordKind::Medication => "medications",
            RecordKind::EScript => "escripts",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
