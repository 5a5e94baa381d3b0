//! Host notification facilities.
//!
//! A facility holds at most one pending notification per [`NotificationId`].
//! Scheduling under an id that is already pending replaces it; cancelling
//! an id that is not pending is a no-op.

use crate::{
    persist, Error, NotificationId, ReminderPayload, RepeatUnit, Result, ScheduledReminder,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The boundary to whatever actually delivers notifications
pub trait NotificationFacility {
    fn schedule_at(
        &mut self,
        id: NotificationId,
        fires_at: DateTime<Utc>,
        repeat: RepeatUnit,
        payload: ReminderPayload,
    ) -> Result<()>;

    fn cancel(&mut self, id: NotificationId) -> Result<()>;

    fn cancel_all(&mut self) -> Result<()>;

    /// Currently pending notifications, ordered by id
    fn pending(&self) -> Result<Vec<ScheduledReminder>>;
}

// ============================================================================
// In-memory facility
// ============================================================================

/// Facility call, as recorded by [`MemoryFacility`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FacilityCall {
    Schedule(NotificationId),
    Cancel(NotificationId),
    CancelAll,
}

/// In-process facility that records every call
///
/// Can be switched to "unavailable" to simulate revoked permissions.
#[derive(Clone, Debug, Default)]
pub struct MemoryFacility {
    pending: BTreeMap<NotificationId, ScheduledReminder>,
    calls: Vec<FacilityCall>,
    unavailable: bool,
}

impl MemoryFacility {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> &[FacilityCall] {
        &self.calls
    }

    pub fn get(&self, id: NotificationId) -> Option<&ScheduledReminder> {
        self.pending.get(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(Error::NotificationUnavailable(
                "notification permission revoked".into(),
            ));
        }
        Ok(())
    }
}

impl NotificationFacility for MemoryFacility {
    fn schedule_at(
        &mut self,
        id: NotificationId,
        fires_at: DateTime<Utc>,
        repeat: RepeatUnit,
        payload: ReminderPayload,
    ) -> Result<()> {
        self.check_available()?;
        self.calls.push(FacilityCall::Schedule(id));
        self.pending.insert(
            id,
            ScheduledReminder {
                notification_id: id,
                fires_at,
                repeat,
                payload,
            },
        );
        Ok(())
    }

    fn cancel(&mut self, id: NotificationId) -> Result<()> {
        self.check_available()?;
        self.calls.push(FacilityCall::Cancel(id));
        self.pending.remove(&id);
        Ok(())
    }

    fn cancel_all(&mut self) -> Result<()> {
        self.check_available()?;
        self.calls.push(FacilityCall::CancelAll);
        self.pending.clear();
        Ok(())
    }

    fn pending(&self) -> Result<Vec<ScheduledReminder>> {
        Ok(self.pending.values().cloned().collect())
    }
}

// ============================================================================
// File-backed facility
// ============================================================================

/// Facility that keeps pending reminders in a JSON file
///
/// Nothing is delivered by the facility itself: a poller (the `due`
/// command, a timer unit, a tray app) calls [`FileFacility::fire_due`] to
/// collect reminders whose time has come. Any IO failure is reported as
/// [`Error::NotificationUnavailable`].
#[derive(Clone, Debug)]
pub struct FileFacility {
    path: PathBuf,
}

impl FileFacility {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<NotificationId, ScheduledReminder>> {
        let reminders: Vec<ScheduledReminder> =
            persist::load_json(&self.path).map_err(unavailable)?;
        Ok(reminders
            .into_iter()
            .map(|r| (r.notification_id, r))
            .collect())
    }

    fn save(&self, pending: &BTreeMap<NotificationId, ScheduledReminder>) -> Result<()> {
        let reminders: Vec<&ScheduledReminder> = pending.values().collect();
        persist::save_json_atomic(&self.path, &reminders).map_err(unavailable)
    }

    /// Load, modify and save the pending set under the sidecar lock
    fn update<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut BTreeMap<NotificationId, ScheduledReminder>) -> T,
    {
        let _lock = persist::exclusive_lock(&self.path).map_err(unavailable)?;
        let mut pending = self.load()?;
        let out = f(&mut pending);
        self.save(&pending)?;
        Ok(out)
    }

    /// Collect every reminder due at or before `now`
    ///
    /// Repeating reminders move forward by whole days/weeks until they are
    /// after `now` (missed occurrences collapse into one firing); one-shot
    /// reminders are removed.
    pub fn fire_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledReminder>> {
        let fired = self.update(|pending| {
            let due: Vec<ScheduledReminder> = pending
                .values()
                .filter(|r| r.fires_at <= now)
                .cloned()
                .collect();

            for reminder in &due {
                match next_occurrence(reminder.fires_at, reminder.repeat, now) {
                    Some(next) => {
                        if let Some(entry) = pending.get_mut(&reminder.notification_id) {
                            entry.fires_at = next;
                        }
                    }
                    None => {
                        pending.remove(&reminder.notification_id);
                    }
                }
            }
            due
        })?;

        if !fired.is_empty() {
            tracing::info!("Fired {} due reminders", fired.len());
        }
        Ok(fired)
    }
}

impl NotificationFacility for FileFacility {
    fn schedule_at(
        &mut self,
        id: NotificationId,
        fires_at: DateTime<Utc>,
        repeat: RepeatUnit,
        payload: ReminderPayload,
    ) -> Result<()> {
        self.update(|pending| {
            pending.insert(
                id,
                ScheduledReminder {
                    notification_id: id,
                    fires_at,
                    repeat,
                    payload,
                },
            );
        })?;
        tracing::debug!("Scheduled notification {} at {}", id, fires_at);
        Ok(())
    }

    fn cancel(&mut self, id: NotificationId) -> Result<()> {
        let removed = self.update(|pending| pending.remove(&id).is_some())?;
        if removed {
            tracing::debug!("Cancelled notification {}", id);
        }
        Ok(())
    }

    fn cancel_all(&mut self) -> Result<()> {
        self.update(|pending| pending.clear())?;
        tracing::debug!("Cancelled all notifications");
        Ok(())
    }

    fn pending(&self) -> Result<Vec<ScheduledReminder>> {
        Ok(self.load()?.into_values().collect())
    }
}

fn unavailable(e: Error) -> Error {
    match e {
        Error::NotificationUnavailable(_) => e,
        other => Error::NotificationUnavailable(other.to_string()),
    }
}

/// First occurrence of a repeating reminder strictly after `now`
fn next_occurrence(
    fires_at: DateTime<Utc>,
    repeat: RepeatUnit,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let step = match repeat {
        RepeatUnit::None => return None,
        RepeatUnit::Day => Duration::days(1),
        RepeatUnit::Week => Duration::weeks(1),
    };

    let behind = now - fires_at;
    let steps = behind.num_seconds() / step.num_seconds() + 1;
    Some(fires_at + step * steps as i32)
}
