#![forbid(unsafe_code)]

//! Core domain model and business logic for the Medley health tracker.
//!
//! This crate provides:
//! - Domain types (medications, reminders, journal records)
//! - Recurrence calculation for dose due-times
//! - Record store and notification facility abstractions
//! - Reminder scheduling and the medication lifecycle coordinator
//! - Health journal and dashboard aggregation

pub mod types;
pub mod error;
pub mod clock;
pub mod config;
pub mod logging;
pub mod persist;
pub mod store;
pub mod facility;
pub mod recurrence;
pub mod scheduler;
pub mod coordinator;
pub mod journal;
pub mod dashboard;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use store::{CollectionLock, JsonFileStore, MemoryStore, Record, RecordStore};
pub use facility::{FacilityCall, FileFacility, MemoryFacility, NotificationFacility};
pub use recurrence::compute_next_dose;
pub use scheduler::ReminderScheduler;
pub use coordinator::{MedicationChange, MedicationCoordinator, ReminderOutcome, ResyncReport};
pub use journal::{Journal, NewEScript, NewSymptom};
pub use dashboard::{build_dashboard, Dashboard};
