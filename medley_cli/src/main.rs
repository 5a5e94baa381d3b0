use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use medley_core::*;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

type Coordinator = MedicationCoordinator<JsonFileStore, FileFacility, SystemClock>;

#[derive(Parser)]
#[command(name = "medley")]
#[command(about = "Medication reminders and health journal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show upcoming doses, recent symptoms and today's mood (default)
    Dashboard,

    /// Add a medication and schedule its reminder
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        dosage: String,

        /// daily, twice_daily, weekly or as_needed
        #[arg(long, default_value = "daily")]
        frequency: Frequency,

        /// Time of day as HH:MM
        #[arg(long, default_value = "09:00")]
        time: TimeOfDay,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List medications
    List,

    /// Mark a dose as taken
    Take {
        /// Name, reminder number or id
        key: String,
    },

    /// Edit a medication
    Edit {
        /// Name, reminder number or id
        key: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        dosage: Option<String>,

        /// daily, twice_daily, weekly or as_needed
        #[arg(long)]
        frequency: Option<Frequency>,

        #[arg(long)]
        time: Option<TimeOfDay>,

        #[arg(long, conflicts_with = "clear_notes")]
        notes: Option<String>,

        #[arg(long)]
        clear_notes: bool,

        #[arg(long, conflicts_with = "disable_reminder")]
        enable_reminder: bool,

        #[arg(long)]
        disable_reminder: bool,
    },

    /// Delete a medication and its reminder
    Delete {
        /// Name, reminder number or id
        key: String,
    },

    /// Show pending reminders
    Reminders,

    /// Deliver reminders that are due now
    Due,

    /// Make pending reminders match the medication list
    Sync,

    /// Symptom journal
    #[command(subcommand)]
    Symptom(SymptomCommand),

    /// Mood journal
    #[command(subcommand)]
    Mood(MoodCommand),

    /// eScript tokens
    #[command(subcommand)]
    Script(ScriptCommand),

    /// Delete all records and cancel all reminders
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum SymptomCommand {
    Add {
        #[arg(long)]
        name: String,

        /// 1 (mild) to 10 (severe)
        #[arg(long)]
        severity: u8,

        #[arg(long)]
        notes: Option<String>,
    },
    List,
    Delete { id: String },
}

#[derive(Subcommand)]
enum MoodCommand {
    Add {
        /// great, good, okay, not_good, bad or 1-5
        level: MoodLevel,

        #[arg(long)]
        notes: Option<String>,
    },
    List,
    Delete { id: String },
}

#[derive(Subcommand)]
enum ScriptCommand {
    Add {
        #[arg(long)]
        token: String,

        #[arg(long)]
        medication: String,

        #[arg(long)]
        prescriber: Option<String>,

        #[arg(long)]
        repeats: Option<u32>,

        /// Expiry date as YYYY-MM-DD
        #[arg(long)]
        expires: Option<NaiveDate>,
    },
    List,
    /// Consume one repeat
    Use { id: String },
    Delete { id: String },
}

fn main() -> Result<()> {
    // Initialize logging
    medley_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data_dir().to_path_buf());
    tracing::debug!("Using data directory {:?}", data_dir);

    match cli.command {
        Some(Commands::Dashboard) | None => cmd_dashboard(&data_dir, &config),
        Some(Commands::Add {
            name,
            dosage,
            frequency,
            time,
            notes,
        }) => cmd_add(
            &data_dir,
            &config,
            NewMedication {
                name,
                dosage,
                frequency,
                time_of_day: time,
                notes,
            },
        ),
        Some(Commands::List) => cmd_list(&data_dir, &config),
        Some(Commands::Take { key }) => cmd_take(&data_dir, &config, &key),
        Some(Commands::Edit {
            key,
            name,
            dosage,
            frequency,
            time,
            notes,
            clear_notes,
            enable_reminder,
            disable_reminder,
        }) => {
            let update = MedicationUpdate {
                name,
                dosage,
                frequency,
                time_of_day: time,
                notes: if clear_notes { Some(None) } else { notes.map(Some) },
                reminder_enabled: if enable_reminder {
                    Some(true)
                } else if disable_reminder {
                    Some(false)
                } else {
                    None
                },
            };
            cmd_edit(&data_dir, &config, &key, update)
        }
        Some(Commands::Delete { key }) => cmd_delete(&data_dir, &config, &key),
        Some(Commands::Reminders) => cmd_reminders(&data_dir, &config),
        Some(Commands::Due) => cmd_due(&data_dir, &config),
        Some(Commands::Sync) => cmd_sync(&data_dir, &config),
        Some(Commands::Symptom(cmd)) => cmd_symptom(&data_dir, cmd),
        Some(Commands::Mood(cmd)) => cmd_mood(&data_dir, cmd),
        Some(Commands::Script(cmd)) => cmd_script(&data_dir, cmd),
        Some(Commands::Reset { yes }) => cmd_reset(&data_dir, &config, yes),
    }
}

fn reminders_path(data_dir: &Path) -> PathBuf {
    data_dir.join("reminders.json")
}

/// Open the coordinator over the data directory without touching reminders
fn open_coordinator(data_dir: &Path, config: &Config) -> Result<Coordinator> {
    std::fs::create_dir_all(data_dir)?;
    let scheduler = ReminderScheduler::with_title(
        FileFacility::new(reminders_path(data_dir)),
        config.reminders.title.clone(),
    );
    MedicationCoordinator::new(JsonFileStore::new(data_dir), scheduler, SystemClock)
}

/// Open the coordinator and bring pending reminders in line with the medications
fn start_coordinator(data_dir: &Path, config: &Config) -> Result<Coordinator> {
    let mut coordinator = open_coordinator(data_dir, config)?;
    let report = coordinator.resync_reminders()?;
    for failure in &report.failures {
        eprintln!("⚠ Reminders unavailable: {}", failure);
    }
    Ok(coordinator)
}

/// Read-only: never resyncs or creates files
fn cmd_dashboard(data_dir: &Path, config: &Config) -> Result<()> {
    let journal = Journal::new(JsonFileStore::new(data_dir));
    let medications: Vec<Medication> = journal.list()?;
    let symptoms: Vec<Symptom> = journal.list()?;
    let moods: Vec<Mood> = journal.list()?;

    let dashboard = build_dashboard(
        &medications,
        &symptoms,
        &moods,
        &Local::now(),
        &config.dashboard,
    );

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  MEDLEY");
    println!("╰─────────────────────────────────────────╯");

    println!("\nUpcoming doses:");
    if dashboard.upcoming.is_empty() {
        println!("  Nothing due in the next {} hours", config.dashboard.upcoming_window_hours);
    }
    for medication in &dashboard.upcoming {
        println!(
            "  → {} ({}) at {}",
            medication.name,
            medication.dosage,
            local(medication.next_dose_at)
        );
    }

    println!("\nRecent symptoms:");
    if dashboard.recent_symptoms.is_empty() {
        println!("  None logged");
    }
    for symptom in &dashboard.recent_symptoms {
        println!("  → {} (severity {})", symptom.name, symptom.severity);
    }

    println!("\nToday's mood:");
    match &dashboard.today_mood {
        Some(mood) => println!("  {} {}", mood.level.emoji(), mood.level.label()),
        None => println!("  Not logged yet"),
    }
    println!();

    Ok(())
}

fn cmd_add(data_dir: &Path, config: &Config, request: NewMedication) -> Result<()> {
    let mut coordinator = start_coordinator(data_dir, config)?;
    let change = coordinator.add_medication(request)?;

    println!(
        "✓ Added {} ({}), {} at {}",
        change.medication.name,
        change.medication.dosage,
        change.medication.frequency,
        change.medication.time_of_day
    );
    println!("  Next dose: {}", local(change.medication.next_dose_at));
    report_reminder(&change.reminder);
    Ok(())
}

fn cmd_list(data_dir: &Path, config: &Config) -> Result<()> {
    let coordinator = start_coordinator(data_dir, config)?;
    let medications = coordinator.medications();
    let now = SystemClock.now_utc();

    if medications.is_empty() {
        println!("No medications yet.");
        return Ok(());
    }

    for medication in medications {
        println!(
            "{:<4} {} ({})",
            medication.notification_id.to_string(),
            medication.name,
            medication.dosage
        );
        let overdue = if medication.next_dose_at <= now { " (overdue)" } else { "" };
        println!(
            "     {} at {}, next dose {}{}",
            medication.frequency,
            medication.time_of_day,
            local(medication.next_dose_at),
            overdue
        );
        if let Some(taken) = medication.last_taken_at {
            println!("     Last taken {}", local(taken));
        }
        if !medication.reminder_enabled {
            println!("     Reminder off");
        }
        if let Some(notes) = &medication.notes {
            println!("     {}", notes);
        }
    }
    Ok(())
}

fn cmd_take(data_dir: &Path, config: &Config, key: &str) -> Result<()> {
    let mut coordinator = start_coordinator(data_dir, config)?;
    let id = coordinator.resolve(key)?;
    let change = coordinator.mark_taken(id)?;

    println!("✓ Marked {} as taken", change.medication.name);
    println!("  Next dose: {}", local(change.medication.next_dose_at));
    report_reminder(&change.reminder);
    Ok(())
}

fn cmd_edit(data_dir: &Path, config: &Config, key: &str, update: MedicationUpdate) -> Result<()> {
    let mut coordinator = start_coordinator(data_dir, config)?;
    let id = coordinator.resolve(key)?;
    let change = coordinator.update_medication(id, update)?;

    println!("✓ Updated {}", change.medication.name);
    println!("  Next dose: {}", local(change.medication.next_dose_at));
    report_reminder(&change.reminder);
    Ok(())
}

fn cmd_delete(data_dir: &Path, config: &Config, key: &str) -> Result<()> {
    let mut coordinator = open_coordinator(data_dir, config)?;
    let id = coordinator.resolve(key)?;
    let change = coordinator.delete_medication(id)?;

    println!("✓ Deleted {}", change.medication.name);
    report_reminder(&change.reminder);
    Ok(())
}

fn cmd_reminders(data_dir: &Path, config: &Config) -> Result<()> {
    let coordinator = open_coordinator(data_dir, config)?;
    let pending = coordinator.pending_reminders()?;

    if pending.is_empty() {
        println!("No pending reminders.");
        return Ok(());
    }

    for reminder in pending {
        let repeat = match reminder.repeat {
            RepeatUnit::None => "once",
            RepeatUnit::Day => "daily",
            RepeatUnit::Week => "weekly",
        };
        println!(
            "{:<4} {} ({}): {}",
            reminder.notification_id.to_string(),
            local(reminder.fires_at),
            repeat,
            reminder.payload.body
        );
    }
    Ok(())
}

fn cmd_due(data_dir: &Path, config: &Config) -> Result<()> {
    let facility = FileFacility::new(reminders_path(data_dir));
    let fired = facility.fire_due(SystemClock.now_utc())?;

    if fired.is_empty() {
        println!("No reminders due.");
    }
    for reminder in &fired {
        println!("🔔 {}: {}", reminder.payload.title, reminder.payload.body);
    }

    // Fired one-shot reminders need a replacement for the next dose
    start_coordinator(data_dir, config)?;
    Ok(())
}

fn cmd_sync(data_dir: &Path, config: &Config) -> Result<()> {
    let mut coordinator = open_coordinator(data_dir, config)?;
    let report = coordinator.resync_reminders()?;

    println!("✓ Reminders in sync");
    println!("  Overdue doses: {}", report.overdue);
    println!("  Scheduled: {}", report.scheduled);
    println!("  Orphans cancelled: {}", report.orphans_cancelled);
    for failure in &report.failures {
        eprintln!("⚠ Reminders unavailable: {}", failure);
    }
    Ok(())
}

fn cmd_symptom(data_dir: &Path, cmd: SymptomCommand) -> Result<()> {
    let mut journal = open_journal(data_dir)?;

    match cmd {
        SymptomCommand::Add {
            name,
            severity,
            notes,
        } => {
            let symptom = journal.add_symptom(
                NewSymptom {
                    name,
                    severity,
                    notes,
                },
                SystemClock.now_utc(),
            )?;
            println!("✓ Logged {} (severity {})", symptom.name, symptom.severity);
        }
        SymptomCommand::List => {
            let symptoms: Vec<Symptom> = journal.list()?;
            if symptoms.is_empty() {
                println!("No symptoms logged.");
            }
            for symptom in symptoms.iter().rev() {
                println!(
                    "{}  {}  {} (severity {})",
                    short_id(symptom.id),
                    local(symptom.recorded_at),
                    symptom.name,
                    symptom.severity
                );
            }
        }
        SymptomCommand::Delete { id } => {
            let id = resolve_record::<Symptom>(&journal, &id)?;
            let removed: Symptom = journal.delete(id)?;
            println!("✓ Deleted symptom {}", removed.name);
        }
    }
    Ok(())
}

fn cmd_mood(data_dir: &Path, cmd: MoodCommand) -> Result<()> {
    let mut journal = open_journal(data_dir)?;

    match cmd {
        MoodCommand::Add { level, notes } => {
            let mood = journal.add_mood(level, notes, SystemClock.now_utc())?;
            println!("✓ Logged mood {} {}", mood.level.emoji(), mood.level.label());
        }
        MoodCommand::List => {
            let moods: Vec<Mood> = journal.list()?;
            if moods.is_empty() {
                println!("No moods logged.");
                return Ok(());
            }
            if let Some(average) = journal.average_mood()? {
                println!("Average mood: {:.1}/5", average);
            }
            for mood in moods.iter().rev() {
                println!(
                    "{}  {}  {} {}",
                    short_id(mood.id),
                    local(mood.recorded_at),
                    mood.level.emoji(),
                    mood.level.label()
                );
            }
        }
        MoodCommand::Delete { id } => {
            let id = resolve_record::<Mood>(&journal, &id)?;
            let removed: Mood = journal.delete(id)?;
            println!("✓ Deleted mood {}", removed.level.label());
        }
    }
    Ok(())
}

fn cmd_script(data_dir: &Path, cmd: ScriptCommand) -> Result<()> {
    let mut journal = open_journal(data_dir)?;

    match cmd {
        ScriptCommand::Add {
            token,
            medication,
            prescriber,
            repeats,
            expires,
        } => {
            let script = journal.add_escript(
                NewEScript {
                    token_code: token,
                    medication_name: medication,
                    prescriber,
                    repeats,
                    expiry_date: expires,
                },
                SystemClock.now_utc(),
            )?;
            println!(
                "✓ Added eScript {} for {} ({} repeats)",
                script.token_code, script.medication_name, script.repeats
            );
        }
        ScriptCommand::List => {
            let scripts: Vec<EScript> = journal.list()?;
            if scripts.is_empty() {
                println!("No eScripts.");
            }
            let today = Local::now().date_naive();
            for script in &scripts {
                let status = if script.status == ScriptStatus::Expired || script.is_past_expiry(today) {
                    "expired"
                } else {
                    "active"
                };
                println!(
                    "{}  {}  {} ({}/{} repeats, {})",
                    short_id(script.id),
                    script.token_code,
                    script.medication_name,
                    script.remaining_repeats,
                    script.repeats,
                    status
                );
            }
        }
        ScriptCommand::Use { id } => {
            let id = resolve_record::<EScript>(&journal, &id)?;
            let script = journal.use_escript_repeat(id)?;
            println!(
                "✓ Used a repeat of {}, {} remaining",
                script.token_code, script.remaining_repeats
            );
        }
        ScriptCommand::Delete { id } => {
            let id = resolve_record::<EScript>(&journal, &id)?;
            let removed: EScript = journal.delete(id)?;
            println!("✓ Deleted eScript {}", removed.token_code);
        }
    }
    Ok(())
}

fn cmd_reset(data_dir: &Path, config: &Config, yes: bool) -> Result<()> {
    if !yes && !confirm("Delete all medications, journal entries and reminders?")? {
        println!("Nothing deleted.");
        return Ok(());
    }

    let mut coordinator = open_coordinator(data_dir, config)?;
    let outcome = coordinator.reset()?;
    println!("✓ All data cleared");
    report_reminder(&outcome);
    Ok(())
}

fn open_journal(data_dir: &Path) -> Result<Journal<JsonFileStore>> {
    std::fs::create_dir_all(data_dir)?;
    Ok(Journal::new(JsonFileStore::new(data_dir)))
}

/// Resolve a full id or unique id prefix within one journal collection
fn resolve_record<T: Record>(journal: &Journal<JsonFileStore>, key: &str) -> Result<Uuid> {
    let key = key.trim().to_lowercase();
    if key.is_empty() {
        return Err(Error::validation("record id is empty"));
    }

    let records: Vec<T> = journal.list()?;
    let matches: Vec<Uuid> = records
        .iter()
        .map(|r| r.id())
        .filter(|id| id.to_string().starts_with(&key))
        .collect();

    match matches.as_slice() {
        [] => Err(Error::NotFound(format!("{} record {}", T::KIND, key))),
        [only] => Ok(*only),
        many => Err(Error::validation(format!(
            "{} matches {} {} records",
            key,
            many.len(),
            T::KIND
        ))),
    }
}

fn report_reminder(outcome: &ReminderOutcome) {
    match outcome {
        ReminderOutcome::Scheduled(reminder) => {
            println!(
                "  Reminder {} set for {}",
                reminder.notification_id,
                local(reminder.fires_at)
            );
        }
        ReminderOutcome::Cancelled => println!("  Reminder cancelled"),
        ReminderOutcome::Unavailable(reason) => {
            eprintln!("⚠ Reminder not updated: {}", reason);
        }
    }
}

fn local(instant: DateTime<Utc>) -> String {
    instant.with_timezone(&Local).format("%a %d %b %H:%M").to_string()
}

fn short_id(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} Type 'yes' to confirm: ", question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(input.trim().eq_ignore_ascii_case("yes"))
}
