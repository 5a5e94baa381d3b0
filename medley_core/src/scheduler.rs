//! Medication reminder scheduling.
//!
//! The scheduler keeps at most one pending notification per medication.
//! Every (re)schedule is a cancel followed by a fresh schedule, never an
//! in-place update, so the facility can't end up with duplicates.

use crate::{
    Medication, NotificationFacility, NotificationId, ReminderPayload, Result, ScheduledReminder,
};
use chrono::{DateTime, Utc};

/// Default notification title
pub const DEFAULT_REMINDER_TITLE: &str = "Medication Reminder";

/// Owns the notification facility and the one-reminder-per-medication rule
#[derive(Debug)]
pub struct ReminderScheduler<F> {
    facility: F,
    title: String,
}

impl<F: NotificationFacility> ReminderScheduler<F> {
    pub fn new(facility: F) -> Self {
        Self::with_title(facility, DEFAULT_REMINDER_TITLE)
    }

    /// Use a custom notification title
    pub fn with_title(facility: F, title: impl Into<String>) -> Self {
        Self {
            facility,
            title: title.into(),
        }
    }

    pub fn facility(&self) -> &F {
        &self.facility
    }

    /// Display payload for a medication's reminder
    pub fn payload_for(&self, medication: &Medication) -> ReminderPayload {
        ReminderPayload {
            medication_id: medication.id,
            title: self.title.clone(),
            body: format!("Time to take {} ({})", medication.name, medication.dosage),
        }
    }

    /// Replace any pending reminder for the medication with one at `next_dose_at`
    pub fn schedule_reminder(&mut self, medication: &Medication) -> Result<ScheduledReminder> {
        self.schedule_reminder_at(medication, medication.next_dose_at)
    }

    /// Replace any pending reminder for the medication with one at `fires_at`
    ///
    /// Used when the outstanding dose is already past and the reminder has
    /// to point at the following occurrence instead.
    pub fn schedule_reminder_at(
        &mut self,
        medication: &Medication,
        fires_at: DateTime<Utc>,
    ) -> Result<ScheduledReminder> {
        let id = medication.notification_id;
        self.facility.cancel(id)?;

        let reminder = ScheduledReminder {
            notification_id: id,
            fires_at,
            repeat: medication.frequency.repeat_unit(),
            payload: self.payload_for(medication),
        };

        self.facility.schedule_at(
            id,
            reminder.fires_at,
            reminder.repeat,
            reminder.payload.clone(),
        )?;

        tracing::info!(
            "Scheduled reminder {} for {} at {} (repeat {:?})",
            id,
            medication.name,
            reminder.fires_at,
            reminder.repeat
        );
        Ok(reminder)
    }

    /// Schedule when reminders are enabled for the medication, cancel otherwise
    ///
    /// Returns the scheduled reminder, or `None` if it was cancelled.
    pub fn sync_reminder(&mut self, medication: &Medication) -> Result<Option<ScheduledReminder>> {
        self.sync_reminder_at(medication, medication.next_dose_at)
    }

    /// [`sync_reminder`](Self::sync_reminder) with an explicit firing time
    pub fn sync_reminder_at(
        &mut self,
        medication: &Medication,
        fires_at: DateTime<Utc>,
    ) -> Result<Option<ScheduledReminder>> {
        if medication.reminder_enabled {
            self.schedule_reminder_at(medication, fires_at).map(Some)
        } else {
            self.cancel_reminder(medication.notification_id)?;
            Ok(None)
        }
    }

    /// Cancel a medication's reminder; nothing pending is not an error
    pub fn cancel_reminder(&mut self, id: NotificationId) -> Result<()> {
        self.facility.cancel(id)?;
        tracing::debug!("Cancelled reminder {}", id);
        Ok(())
    }

    /// Cancel every pending reminder (full data reset only)
    pub fn cancel_all(&mut self) -> Result<()> {
        self.facility.cancel_all()?;
        tracing::info!("Cancelled all reminders");
        Ok(())
    }

    pub fn pending(&self) -> Result<Vec<ScheduledReminder>> {
        self.facility.pending()
    }
}
