//! Medication lifecycle coordination.
//!
//! The coordinator keeps medication records and their reminders aligned:
//! - Validation and lookup failures happen before any side effect
//! - The cached collection is only replaced after the store accepted it
//! - Reminder calls follow the store write for adds/updates and precede
//!   it for deletes
//! - Reminder failures are reported, never allowed to block a data change
//!
//! All mutating operations take `&mut self`, so operations on one
//! coordinator can never interleave. Across processes, each mutation holds
//! the store's medication collection lock and starts from the stored
//! collection rather than the cache.
//!
//! A dose whose due time has passed stays outstanding until it is marked
//! taken; its reminder meanwhile points at the next occurrence.

use crate::recurrence::compute_next_dose;
use crate::store::{load_records, save_records};
use crate::{
    Clock, CollectionLock, Error, Medication, MedicationUpdate, NewMedication,
    NotificationFacility, NotificationId, RecordKind, RecordStore, ReminderScheduler, Result,
    ScheduledReminder, SystemClock,
};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// What happened to a medication's reminder during an operation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReminderOutcome {
    Scheduled(ScheduledReminder),
    Cancelled,
    /// The facility refused; the record change still went through
    Unavailable(String),
}

impl ReminderOutcome {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ReminderOutcome::Unavailable(_))
    }

    pub fn scheduled(&self) -> Option<&ScheduledReminder> {
        match self {
            ReminderOutcome::Scheduled(reminder) => Some(reminder),
            _ => None,
        }
    }
}

/// Result of a coordinator operation on one medication
#[derive(Clone, Debug)]
pub struct MedicationChange {
    pub medication: Medication,
    pub reminder: ReminderOutcome,
}

/// Summary of a start-up reminder resync
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResyncReport {
    /// Medications with an outstanding dose whose due time has passed
    pub overdue: usize,
    /// Reminders (re)scheduled
    pub scheduled: usize,
    /// Pending reminders that belonged to no enabled medication
    pub orphans_cancelled: usize,
    pub failures: Vec<String>,
}

/// Orchestrates medication operations against the record store and scheduler
pub struct MedicationCoordinator<S, F, C = SystemClock> {
    store: S,
    scheduler: ReminderScheduler<F>,
    clock: C,
    medications: Vec<Medication>,
}

impl<S, F, C> MedicationCoordinator<S, F, C>
where
    S: RecordStore,
    F: NotificationFacility,
    C: Clock,
{
    /// Load the medication collection and take ownership of the collaborators
    pub fn new(store: S, scheduler: ReminderScheduler<F>, clock: C) -> Result<Self> {
        let medications = load_records(&store)?;
        tracing::debug!("Coordinator loaded {} medications", medications.len());
        Ok(Self {
            store,
            scheduler,
            clock,
            medications,
        })
    }

    pub fn medications(&self) -> &[Medication] {
        &self.medications
    }

    pub fn medication(&self, id: Uuid) -> Option<&Medication> {
        self.medications.iter().find(|m| m.id == id)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn scheduler(&self) -> &ReminderScheduler<F> {
        &self.scheduler
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn into_parts(self) -> (S, ReminderScheduler<F>) {
        (self.store, self.scheduler)
    }

    pub fn pending_reminders(&self) -> Result<Vec<ScheduledReminder>> {
        self.scheduler.pending()
    }

    /// Resolve a user-supplied key to a medication id
    ///
    /// Accepts a full UUID, a notification number (`3` or `#3`), a unique
    /// UUID prefix, or an exact (case-insensitive) name.
    pub fn resolve(&self, key: &str) -> Result<Uuid> {
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::validation("medication key is empty"));
        }

        if let Ok(id) = Uuid::parse_str(key) {
            return self
                .medication(id)
                .map(|m| m.id)
                .ok_or_else(|| not_found(id));
        }

        if let Ok(n) = key.trim_start_matches('#').parse::<u32>() {
            if let Some(m) = self
                .medications
                .iter()
                .find(|m| m.notification_id == NotificationId(n))
            {
                return Ok(m.id);
            }
        }

        let lower = key.to_lowercase();
        let matches: Vec<&Medication> = self
            .medications
            .iter()
            .filter(|m| m.id.to_string().starts_with(&lower) || m.name.eq_ignore_ascii_case(key))
            .collect();

        match matches.as_slice() {
            [] => Err(Error::NotFound(format!("medication {:?}", key))),
            [only] => Ok(only.id),
            many => Err(Error::validation(format!(
                "{:?} matches {} medications",
                key,
                many.len()
            ))),
        }
    }

    /// Create a medication and schedule its first reminder
    pub fn add_medication(&mut self, request: NewMedication) -> Result<MedicationChange> {
        let name = required("name", &request.name)?;
        let dosage = required("dosage", &request.dosage)?;

        let _lock = self.refresh()?;
        let now = self.clock.now();
        let next_dose = compute_next_dose(request.frequency, request.time_of_day, &now);

        let medication = Medication {
            id: Uuid::new_v4(),
            notification_id: self.next_notification_id(),
            name,
            dosage,
            frequency: request.frequency,
            time_of_day: request.time_of_day,
            notes: normalize_notes(request.notes),
            created_at: now.with_timezone(&Utc),
            next_dose_at: next_dose.with_timezone(&Utc),
            last_taken_at: None,
            reminder_enabled: true,
        };

        let mut updated = self.medications.clone();
        updated.push(medication.clone());
        self.commit(updated)?;

        tracing::info!(
            "Added medication {} ({}), next dose {}",
            medication.name,
            medication.id,
            medication.next_dose_at
        );

        let reminder = self.sync(&medication);
        Ok(MedicationChange {
            medication,
            reminder,
        })
    }

    /// Record a dose as taken and move the reminder to the following dose
    ///
    /// The next dose is computed from the later of now and the current due
    /// instant, so taking a dose early consumes the upcoming slot.
    pub fn mark_taken(&mut self, id: Uuid) -> Result<MedicationChange> {
        let _lock = self.refresh()?;
        let index = self.index_of(id)?;
        let now = self.clock.now();

        let mut medication = self.medications[index].clone();
        let reference = later_of(&now, medication.next_dose_at);
        let next_dose = compute_next_dose(medication.frequency, medication.time_of_day, &reference);

        medication.next_dose_at = next_dose.with_timezone(&Utc);
        medication.last_taken_at = Some(now.with_timezone(&Utc));

        let mut updated = self.medications.clone();
        updated[index] = medication.clone();
        self.commit(updated)?;

        tracing::info!(
            "Marked {} taken, next dose {}",
            medication.name,
            medication.next_dose_at
        );

        let reminder = self.sync(&medication);
        Ok(MedicationChange {
            medication,
            reminder,
        })
    }

    /// Apply an edit and bring the reminder in line with it
    ///
    /// The next dose is recomputed only when frequency or time of day
    /// change; an overdue dose stays outstanding across other edits.
    pub fn update_medication(
        &mut self,
        id: Uuid,
        update: MedicationUpdate,
    ) -> Result<MedicationChange> {
        let _lock = self.refresh()?;
        let index = self.index_of(id)?;
        let mut medication = self.medications[index].clone();

        if let Some(name) = &update.name {
            medication.name = required("name", name)?;
        }
        if let Some(dosage) = &update.dosage {
            medication.dosage = required("dosage", dosage)?;
        }
        if let Some(frequency) = update.frequency {
            medication.frequency = frequency;
        }
        if let Some(time_of_day) = update.time_of_day {
            medication.time_of_day = time_of_day;
        }
        if let Some(notes) = update.notes.clone() {
            medication.notes = normalize_notes(notes);
        }
        if let Some(enabled) = update.reminder_enabled {
            medication.reminder_enabled = enabled;
        }

        if update.changes_schedule() {
            let now = self.clock.now();
            let next_dose = compute_next_dose(medication.frequency, medication.time_of_day, &now);
            medication.next_dose_at = next_dose.with_timezone(&Utc);
        }

        let mut updated = self.medications.clone();
        updated[index] = medication.clone();
        self.commit(updated)?;

        tracing::info!("Updated medication {} ({})", medication.name, medication.id);

        let reminder = self.sync(&medication);
        Ok(MedicationChange {
            medication,
            reminder,
        })
    }

    /// Cancel a medication's reminder and remove it from the store
    pub fn delete_medication(&mut self, id: Uuid) -> Result<MedicationChange> {
        let _lock = self.refresh()?;
        let index = self.index_of(id)?;
        let medication = self.medications[index].clone();

        let reminder = match self.scheduler.cancel_reminder(medication.notification_id) {
            Ok(()) => ReminderOutcome::Cancelled,
            Err(e) => {
                tracing::warn!(
                    "Failed to cancel reminder for {}: {}. Deleting anyway.",
                    medication.name,
                    e
                );
                ReminderOutcome::Unavailable(e.to_string())
            }
        };

        let mut updated = self.medications.clone();
        updated.remove(index);
        if let Err(e) = self.commit(updated) {
            // The record survives, so it should keep its reminder too
            if reminder == ReminderOutcome::Cancelled {
                let _ = self.sync(&medication);
            }
            return Err(e);
        }

        tracing::info!("Deleted medication {} ({})", medication.name, medication.id);
        Ok(MedicationChange {
            medication,
            reminder,
        })
    }

    /// Make the facility match the collection
    ///
    /// Meant for start-up: reminders may have fired (one-shots are gone),
    /// been lost, or outlived their medication. Due times are left alone;
    /// an overdue dose keeps its due time and only its reminder moves on.
    pub fn resync_reminders(&mut self) -> Result<ResyncReport> {
        let _lock = self.refresh()?;
        let mut report = ResyncReport::default();
        let now_utc = self.clock.now_utc();
        report.overdue = self
            .medications
            .iter()
            .filter(|m| m.next_dose_at <= now_utc)
            .count();

        let pending = match self.scheduler.pending() {
            Ok(pending) => pending,
            Err(e) => {
                tracing::warn!("Unable to list pending reminders: {}", e);
                report.failures.push(e.to_string());
                return Ok(report);
            }
        };
        let pending_at: HashMap<NotificationId, DateTime<Utc>> = pending
            .iter()
            .map(|r| (r.notification_id, r.fires_at))
            .collect();

        let enabled: Vec<Medication> = self
            .medications
            .iter()
            .filter(|m| m.reminder_enabled)
            .cloned()
            .collect();
        let wanted: HashSet<NotificationId> = enabled.iter().map(|m| m.notification_id).collect();

        for orphan in pending_at.keys().filter(|id| !wanted.contains(id)) {
            match self.scheduler.cancel_reminder(*orphan) {
                Ok(()) => report.orphans_cancelled += 1,
                Err(e) => report.failures.push(e.to_string()),
            }
        }

        for medication in &enabled {
            let fires_at = self.reminder_time(medication);
            if pending_at.get(&medication.notification_id) == Some(&fires_at) {
                continue;
            }
            match self.sync(medication) {
                ReminderOutcome::Unavailable(reason) => report.failures.push(reason),
                _ => report.scheduled += 1,
            }
        }

        tracing::info!(
            "Resynced reminders: {} overdue, {} scheduled, {} orphans cancelled",
            report.overdue,
            report.scheduled,
            report.orphans_cancelled
        );
        Ok(report)
    }

    /// Cancel every reminder and clear every record collection
    pub fn reset(&mut self) -> Result<ReminderOutcome> {
        let _lock = self.store.lock_collection(RecordKind::Medication)?;
        let reminder = match self.scheduler.cancel_all() {
            Ok(()) => ReminderOutcome::Cancelled,
            Err(e) => {
                tracing::warn!("Failed to cancel reminders during reset: {}", e);
                ReminderOutcome::Unavailable(e.to_string())
            }
        };

        self.store.clear_all()?;
        self.medications.clear();
        tracing::info!("Reset all data");
        Ok(reminder)
    }

    /// Lock the medication collection and adopt what is stored
    ///
    /// The returned guard must be held until the operation has committed.
    fn refresh(&mut self) -> Result<CollectionLock> {
        let lock = self.store.lock_collection(RecordKind::Medication)?;
        self.medications = load_records(&self.store)?;
        Ok(lock)
    }

    fn index_of(&self, id: Uuid) -> Result<usize> {
        self.medications
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| not_found(id))
    }

    /// Persist the collection, then adopt it as the cached state
    fn commit(&mut self, medications: Vec<Medication>) -> Result<()> {
        save_records(&mut self.store, &medications)?;
        self.medications = medications;
        Ok(())
    }

    /// When the medication's reminder should fire
    ///
    /// The outstanding due time while it is still ahead, otherwise the
    /// next occurrence after now.
    fn reminder_time(&self, medication: &Medication) -> DateTime<Utc> {
        let now = self.clock.now();
        if medication.next_dose_at > now.with_timezone(&Utc) {
            return medication.next_dose_at;
        }
        compute_next_dose(medication.frequency, medication.time_of_day, &now).with_timezone(&Utc)
    }

    fn sync(&mut self, medication: &Medication) -> ReminderOutcome {
        let fires_at = self.reminder_time(medication);
        match self.scheduler.sync_reminder_at(medication, fires_at) {
            Ok(Some(reminder)) => ReminderOutcome::Scheduled(reminder),
            Ok(None) => ReminderOutcome::Cancelled,
            Err(e) => {
                tracing::warn!("Reminder for {} not updated: {}", medication.name, e);
                ReminderOutcome::Unavailable(e.to_string())
            }
        }
    }

    fn next_notification_id(&self) -> NotificationId {
        let used: HashSet<u32> = self
            .medications
            .iter()
            .map(|m| m.notification_id.0)
            .collect();
        let highest = used.iter().copied().max().unwrap_or(0);

        match highest.checked_add(1) {
            Some(n) => NotificationId(n),
            None => NotificationId((1..u32::MAX).find(|n| !used.contains(n)).unwrap_or(1)),
        }
    }
}

fn not_found(id: Uuid) -> Error {
    Error::NotFound(format!("medication {}", id))
}

fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

/// The later of `now` and a stored instant, in `now`'s time zone
fn later_of<Tz: TimeZone>(now: &DateTime<Tz>, stored: DateTime<Utc>) -> DateTime<Tz> {
    let stored = stored.with_timezone(&now.timezone());
    if stored > *now {
        stored
    } else {
        now.clone()
    }
}
