//! Health journal: symptoms, moods and eScripts.
//!
//! Plain validated CRUD over the independent journal collections. Unlike
//! medications these records have no reminders attached, so every
//! operation is a single load-modify-save made under the store's lock for
//! that collection.

use crate::store::{load_records, save_records, Record};
use crate::{EScript, Error, Mood, MoodLevel, RecordStore, Result, ScriptStatus, Symptom};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// Inclusive bounds of the symptom severity scale
pub const SEVERITY_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

/// Input for logging a symptom
#[derive(Clone, Debug, Default)]
pub struct NewSymptom {
    pub name: String,
    pub severity: u8,
    pub notes: Option<String>,
}

/// Input for adding an eScript token
#[derive(Clone, Debug, Default)]
pub struct NewEScript {
    pub token_code: String,
    pub medication_name: String,
    pub prescriber: Option<String>,
    pub repeats: Option<u32>,
    pub expiry_date: Option<NaiveDate>,
}

/// Journal operations over a record store
#[derive(Debug)]
pub struct Journal<S> {
    store: S,
}

impl<S: RecordStore> Journal<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// All records of one kind, in insertion order
    pub fn list<T: Record>(&self) -> Result<Vec<T>> {
        load_records(&self.store)
    }

    /// Remove a record by id, returning it
    pub fn delete<T: Record>(&mut self, id: Uuid) -> Result<T> {
        let _lock = self.store.lock_collection(T::KIND)?;
        let mut records: Vec<T> = load_records(&self.store)?;
        let index = records
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| Error::NotFound(format!("{} record {}", T::KIND, id)))?;

        let removed = records.remove(index);
        save_records(&mut self.store, &records)?;
        tracing::info!("Deleted {} record {}", T::KIND, id);
        Ok(removed)
    }

    fn append<T: Record>(&mut self, record: T) -> Result<T> {
        let _lock = self.store.lock_collection(T::KIND)?;
        let mut records: Vec<T> = load_records(&self.store)?;
        records.push(record.clone());
        save_records(&mut self.store, &records)?;
        tracing::info!("Added {} record {}", T::KIND, record.id());
        Ok(record)
    }

    pub fn add_symptom(&mut self, input: NewSymptom, now: DateTime<Utc>) -> Result<Symptom> {
        let name = required("symptom name", &input.name)?;
        if !SEVERITY_RANGE.contains(&input.severity) {
            return Err(Error::validation(format!(
                "severity must be between {} and {}, got {}",
                SEVERITY_RANGE.start(),
                SEVERITY_RANGE.end(),
                input.severity
            )));
        }

        self.append(Symptom {
            id: Uuid::new_v4(),
            name,
            severity: input.severity,
            notes: optional(input.notes),
            recorded_at: now,
        })
    }

    pub fn add_mood(
        &mut self,
        level: MoodLevel,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Mood> {
        self.append(Mood {
            id: Uuid::new_v4(),
            level,
            notes: optional(notes),
            recorded_at: now,
        })
    }

    /// Mean mood score over every entry, `None` when nothing is logged
    pub fn average_mood(&self) -> Result<Option<f64>> {
        let moods: Vec<Mood> = self.list()?;
        if moods.is_empty() {
            return Ok(None);
        }
        let total: u32 = moods.iter().map(|m| m.level.value() as u32).sum();
        Ok(Some(total as f64 / moods.len() as f64))
    }

    pub fn add_escript(&mut self, input: NewEScript, now: DateTime<Utc>) -> Result<EScript> {
        let token_code = required("token code", &input.token_code)?;
        let medication_name = required("medication name", &input.medication_name)?;
        let repeats = input.repeats.unwrap_or(0);

        self.append(EScript {
            id: Uuid::new_v4(),
            token_code,
            medication_name,
            prescriber: optional(input.prescriber),
            repeats,
            remaining_repeats: repeats,
            expiry_date: input.expiry_date,
            added_at: now,
            status: ScriptStatus::Active,
        })
    }

    /// Consume one repeat of an eScript; it expires when none remain
    pub fn use_escript_repeat(&mut self, id: Uuid) -> Result<EScript> {
        let _lock = self.store.lock_collection(EScript::KIND)?;
        let mut scripts: Vec<EScript> = load_records(&self.store)?;
        let script = scripts
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::NotFound(format!("escript {}", id)))?;

        if script.remaining_repeats == 0 {
            return Err(Error::validation(format!(
                "no repeats remaining on {}",
                script.token_code
            )));
        }

        script.remaining_repeats -= 1;
        if script.remaining_repeats == 0 {
            script.status = ScriptStatus::Expired;
        }
        let updated = script.clone();

        save_records(&mut self.store, &scripts)?;
        tracing::info!(
            "Used repeat of {}, {} remaining",
            updated.token_code,
            updated.remaining_repeats
        );
        Ok(updated)
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn journal() -> Journal<MemoryStore> {
        Journal::new(MemoryStore::new())
    }

    #[test]
    fn test_add_and_list_symptoms() {
        let mut journal = journal();
        journal
            .add_symptom(
                NewSymptom {
                    name: " Headache ".into(),
                    severity: 6,
                    notes: Some("after lunch".into()),
                },
                Utc::now(),
            )
            .unwrap();

        let symptoms: Vec<Symptom> = journal.list().unwrap();
        assert_eq!(symptoms.len(), 1);
        assert_eq!(symptoms[0].name, "Headache");
        assert_eq!(symptoms[0].notes.as_deref(), Some("after lunch"));
    }

    #[test]
    fn test_symptom_severity_out_of_range() {
        let mut journal = journal();
        for severity in [0, 11] {
            let result = journal.add_symptom(
                NewSymptom {
                    name: "Nausea".into(),
                    severity,
                    notes: None,
                },
                Utc::now(),
            );
            assert!(matches!(result, Err(Error::Validation(_))));
        }
        assert!(journal.list::<Symptom>().unwrap().is_empty());
    }

    #[test]
    fn test_symptom_requires_name() {
        let mut journal = journal();
        let result = journal.add_symptom(
            NewSymptom {
                name: "".into(),
                severity: 3,
                notes: None,
            },
            Utc::now(),
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_average_mood() {
        let mut journal = journal();
        assert_eq!(journal.average_mood().unwrap(), None);

        journal.add_mood(MoodLevel::Great, None, Utc::now()).unwrap();
        journal.add_mood(MoodLevel::Okay, Some(" ".into()), Utc::now()).unwrap();

        assert_eq!(journal.average_mood().unwrap(), Some(4.0));
        let moods: Vec<Mood> = journal.list().unwrap();
        assert!(moods[1].notes.is_none());
    }

    #[test]
    fn test_delete_record() {
        let mut journal = journal();
        let mood = journal.add_mood(MoodLevel::Bad, None, Utc::now()).unwrap();

        let removed: Mood = journal.delete(mood.id).unwrap();
        assert_eq!(removed.id, mood.id);
        assert!(journal.list::<Mood>().unwrap().is_empty());

        let again = journal.delete::<Mood>(mood.id);
        assert!(matches!(again, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_escript_repeats_run_out() {
        let mut journal = journal();
        let script = journal
            .add_escript(
                NewEScript {
                    token_code: "ABC123".into(),
                    medication_name: "Amoxicillin".into(),
                    repeats: Some(2),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(script.status, ScriptStatus::Active);
        assert_eq!(script.remaining_repeats, 2);

        let once = journal.use_escript_repeat(script.id).unwrap();
        assert_eq!(once.remaining_repeats, 1);
        assert_eq!(once.status, ScriptStatus::Active);

        let twice = journal.use_escript_repeat(script.id).unwrap();
        assert_eq!(twice.remaining_repeats, 0);
        assert_eq!(twice.status, ScriptStatus::Expired);

        let result = journal.use_escript_repeat(script.id);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_escript_requires_token_and_medication() {
        let mut journal = journal();
        let result = journal.add_escript(
            NewEScript {
                token_code: "XYZ".into(),
                ..Default::default()
            },
            Utc::now(),
        );
        assert!(matches!(result, Err(Error::Validation(_))));

        let script = journal
            .add_escript(
                NewEScript {
                    token_code: "XYZ".into(),
                    medication_name: "Metformin".into(),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(script.repeats, 0);
        assert_eq!(script.status, ScriptStatus::Active);
    }

    #[test]
    fn test_concurrent_appends_are_all_kept() {
        let temp_dir = tempfile::tempdir().unwrap();

        let handles: Vec<_> = (0..4)
            .map(|thread| {
                let dir = temp_dir.path().to_path_buf();
                std::thread::spawn(move || {
                    let mut journal = Journal::new(crate::JsonFileStore::new(dir));
                    for n in 0..10 {
                        journal
                            .add_symptom(
                                NewSymptom {
                                    name: format!("Symptom {}-{}", thread, n),
                                    severity: 2,
                                    notes: None,
                                },
                                Utc::now(),
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let journal = Journal::new(crate::JsonFileStore::new(temp_dir.path()));
        assert_eq!(journal.list::<Symptom>().unwrap().len(), 40);
    }

    #[test]
    fn test_failed_save_leaves_collection_untouched() {
        let mut store = MemoryStore::new();
        store.set_fail_saves(true);
        let mut journal = Journal::new(store);

        let result = journal.add_mood(MoodLevel::Good, None, Utc::now());
        assert!(matches!(result, Err(Error::Io(_))));
        assert!(journal.list::<Mood>().unwrap().is_empty());
    }
}
