//! Read-only dashboard aggregation across the record collections.

use crate::config::DashboardConfig;
use crate::{Medication, Mood, Symptom};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Snapshot shown on the home screen
#[derive(Clone, Debug, PartialEq)]
pub struct Dashboard {
    /// Doses due within the upcoming window, soonest first
    pub upcoming: Vec<Medication>,
    /// Most recent symptoms, newest first
    pub recent_symptoms: Vec<Symptom>,
    /// First mood logged on today's local date
    pub today_mood: Option<Mood>,
}

/// Build the dashboard as seen at `now`
///
/// "Today" is `now`'s calendar date in its own time zone.
pub fn build_dashboard<Tz: TimeZone>(
    medications: &[Medication],
    symptoms: &[Symptom],
    moods: &[Mood],
    now: &DateTime<Tz>,
    config: &DashboardConfig,
) -> Dashboard {
    let now_utc = now.with_timezone(&Utc);
    let horizon = now_utc + Duration::hours(config.upcoming_window_hours as i64);

    let mut upcoming: Vec<Medication> = medications
        .iter()
        .filter(|m| m.next_dose_at > now_utc && m.next_dose_at < horizon)
        .cloned()
        .collect();
    upcoming.sort_by_key(|m| m.next_dose_at);
    upcoming.truncate(config.upcoming_limit);

    let recent_symptoms: Vec<Symptom> = symptoms
        .iter()
        .rev()
        .take(config.recent_symptoms)
        .cloned()
        .collect();

    let tz = now.timezone();
    let today = now.date_naive();
    let today_mood = moods
        .iter()
        .find(|m| m.recorded_at.with_timezone(&tz).date_naive() == today)
        .cloned();

    Dashboard {
        upcoming,
        recent_symptoms,
        today_mood,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Frequency, MoodLevel, NotificationId};
    use chrono::FixedOffset;
    use uuid::Uuid;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn med(name: &str, next: &str) -> Medication {
        Medication {
            id: Uuid::new_v4(),
            notification_id: NotificationId(1),
            name: name.into(),
            dosage: "1 tablet".into(),
            frequency: Frequency::Daily,
            time_of_day: "09:00".parse().unwrap(),
            notes: None,
            created_at: at("2024-01-01T00:00:00Z"),
            next_dose_at: at(next),
            last_taken_at: None,
            reminder_enabled: true,
        }
    }

    fn symptom(name: &str) -> Symptom {
        Symptom {
            id: Uuid::new_v4(),
            name: name.into(),
            severity: 2,
            notes: None,
            recorded_at: at("2024-01-01T00:00:00Z"),
        }
    }

    fn mood(level: MoodLevel, when: &str) -> Mood {
        Mood {
            id: Uuid::new_v4(),
            level,
            notes: None,
            recorded_at: at(when),
        }
    }

    #[test]
    fn test_upcoming_window_order_and_limit() {
        let meds = vec![
            med("late", "2024-01-02T09:00:00Z"),
            med("soon", "2024-01-01T11:00:00Z"),
            med("past", "2024-01-01T09:00:00Z"),
            med("too_far", "2024-01-02T10:30:00Z"),
            med("sooner", "2024-01-01T10:30:00Z"),
            med("mid", "2024-01-01T15:00:00Z"),
        ];
        let now = at("2024-01-01T10:00:00Z");

        let dash = build_dashboard(&meds, &[], &[], &now, &DashboardConfig::default());
        let names: Vec<_> = dash.upcoming.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["sooner", "soon", "mid"]);
    }

    #[test]
    fn test_recent_symptoms_newest_first() {
        let symptoms: Vec<_> = ["a", "b", "c", "d"].iter().map(|n| symptom(n)).collect();
        let now = at("2024-01-01T10:00:00Z");

        let dash = build_dashboard(&[], &symptoms, &[], &now, &DashboardConfig::default());
        let names: Vec<_> = dash.recent_symptoms.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["d", "c", "b"]);
    }

    #[test]
    fn test_today_mood_uses_local_date() {
        let moods = vec![
            mood(MoodLevel::Bad, "2023-12-31T20:00:00Z"),
            mood(MoodLevel::Good, "2024-01-01T08:00:00Z"),
        ];

        // In UTC+10, 20:00Z on Dec 31 is already Jan 1
        let tz = FixedOffset::east_opt(10 * 3600).unwrap();
        let now = at("2024-01-01T09:00:00Z").with_timezone(&tz);
        let dash = build_dashboard(&[], &[], &moods, &now, &DashboardConfig::default());
        assert_eq!(dash.today_mood.unwrap().level, MoodLevel::Bad);

        let now = at("2024-01-01T09:00:00Z");
        let dash = build_dashboard(&[], &[], &moods, &now, &DashboardConfig::default());
        assert_eq!(dash.today_mood.unwrap().level, MoodLevel::Good);
    }

    #[test]
    fn test_empty_dashboard() {
        let now = at("2024-01-01T10:00:00Z");
        let dash = build_dashboard(&[], &[], &[], &now, &DashboardConfig::default());
        assert!(dash.upcoming.is_empty());
        assert!(dash.recent_symptoms.is_empty());
        assert!(dash.today_mood.is_none());
    }
}
