use chrono::{DateTime, Local, Utc};
use clap::{Args, Parser, Subcommand};
use prises_core::codec::{export_filename, write_export};
use prises_core::*;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "prises")]
#[command(about = "Medication intake tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage medications
    #[command(subcommand)]
    Med(MedCommand),

    /// Record an intake now (medication id, id prefix or name)
    Take { medication: String },

    /// Manage recorded shots
    #[command(subcommand)]
    Shot(ShotCommand),

    /// Write every medication and shot to a timestamped JSON file
    Export {
        /// Directory for the export file (defaults to config, then current dir)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Replace medications and/or shots from exported JSON files
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Add medications from a tab-separated list (name, note, color, delay)
    ImportList { file: PathBuf },

    /// Choose how medications are displayed (list or button)
    View { mode: ViewMode },

    /// Show medications and recent shots (default)
    Status,
}

#[derive(Subcommand)]
enum MedCommand {
    /// Add a medication
    Add {
        name: String,
        #[command(flatten)]
        fields: MedFields,
    },
    /// Edit a medication; unspecified fields keep their value
    Edit {
        medication: String,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: MedFields,
        /// Remove the note
        #[arg(long, conflicts_with = "note")]
        clear_note: bool,
        /// Remove the color
        #[arg(long, conflicts_with = "color")]
        clear_color: bool,
        /// Remove the delay
        #[arg(long, conflicts_with = "delay")]
        clear_delay: bool,
    },
    /// Delete a medication (its shots are kept)
    Rm { medication: String },
    /// List medications
    List,
}

#[derive(Args)]
struct MedFields {
    /// Free-text note
    #[arg(long)]
    note: Option<String>,
    /// CSS color, e.g. #2196f3
    #[arg(long)]
    color: Option<String>,
    /// Minimum hours between doses
    #[arg(long)]
    delay: Option<f64>,
}

#[derive(Subcommand)]
enum ShotCommand {
    /// List shots, most recent first
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Delete a shot
    Rm { shot: String },
    /// Correct a shot's time: HH:MM (today, or yesterday if later than now)
    /// or YYYY-MM-DDTHH:MM
    Edit { shot: String, when: RetimeRequest },
}

fn main() -> Result<()> {
    prises_core::logging::init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(data_dir) = cli.data_dir {
        config.data.data_dir = data_dir;
    }

    tracing::debug!("Opening store under {:?}", config.storage_dir());
    let mut store = Store::open(&config);

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Med(command) => cmd_med(&mut store, command),
        Commands::Take { medication } => cmd_take(&mut store, &medication),
        Commands::Shot(command) => cmd_shot(&mut store, command),
        Commands::Export { out_dir } => cmd_export(&store, out_dir, &config),
        Commands::Import { files } => cmd_import(&mut store, &files),
        Commands::ImportList { file } => cmd_import_list(&mut store, &file),
        Commands::View { mode } => {
            store.dispatch(Action::SetUi(UiPatch::default().medic_view_mode(mode)))?;
            println!("✓ Medications shown as {:?}", mode);
            Ok(())
        }
        Commands::Status => {
            print_medications(&store);
            println!();
            print_shots(&store, 5);
            Ok(())
        }
    }
}

fn cmd_med(store: &mut Store<FileStorage>, command: MedCommand) -> Result<()> {
    match command {
        MedCommand::Add { name, fields } => {
            let medication = Medication {
                uuid: None,
                primary: name,
                secondary: fields.note,
                color: fields.color,
                delay: fields.delay,
            };
            medication.validate()?;

            let outcome = store.dispatch(Action::CreateMedication(medication))?;
            if let Some(uuid) = outcome.created() {
                println!("✓ Added medication {}", short(&uuid));
            }
            Ok(())
        }

        MedCommand::Edit {
            medication,
            name,
            fields,
            clear_note,
            clear_color,
            clear_delay,
        } => {
            let uuid = resolve_medication(store, &medication)?;
            // Edits replace the whole record, so start from the stored one
            let mut record = store
                .medication(&uuid)
                .cloned()
                .ok_or_else(|| Error::NotFound(medication.clone()))?;

            if let Some(name) = name {
                record.primary = name;
            }
            overlay(&mut record.secondary, fields.note, clear_note);
            overlay(&mut record.color, fields.color, clear_color);
            overlay(&mut record.delay, fields.delay, clear_delay);
            record.validate()?;

            store.dispatch(Action::EditMedication(record))?;
            println!("✓ Updated medication {}", short(&uuid));
            Ok(())
        }

        MedCommand::Rm { medication } => {
            let uuid = resolve_medication(store, &medication)?;
            store.dispatch(Action::DeleteMedication(uuid))?;
            println!("✓ Deleted medication {}", short(&uuid));
            Ok(())
        }

        MedCommand::List => {
            print_medications(store);
            Ok(())
        }
    }
}

fn cmd_take(store: &mut Store<FileStorage>, medication: &str) -> Result<()> {
    let uuid = resolve_medication(store, medication)?;
    let status = store
        .medication(&uuid)
        .map(|m| store.dose_status(m, Utc::now()));

    let shot_id = store.take(uuid)?;
    let shot = store
        .shot(&shot_id)
        .ok_or_else(|| Error::NotFound(format!("shot {}", shot_id)))?;

    println!("✓ Took {} at {}", shot.primary, format_ts(shot.ts));
    if let Some(DoseStatus::WaitUntil(next)) = status {
        eprintln!(
            "⚠ Minimum delay not elapsed: next dose was due at {}",
            next.with_timezone(&Local).format("%H:%M")
        );
    }
    Ok(())
}

fn cmd_shot(store: &mut Store<FileStorage>, command: ShotCommand) -> Result<()> {
    match command {
        ShotCommand::List { limit } => {
            print_shots(store, limit);
            Ok(())
        }

        ShotCommand::Rm { shot } => {
            let uuid = resolve_shot(store, &shot)?;
            store.dispatch(Action::DeleteShot(uuid))?;
            println!("✓ Deleted shot {}", short(&uuid));
            Ok(())
        }

        ShotCommand::Edit { shot, when } => {
            let uuid = resolve_shot(store, &shot)?;
            store.dispatch(Action::SetUi(UiPatch::default().shot_to_edit(Some(uuid))))?;
            let ts = store.retime_shot(uuid, when)?;
            println!("✓ Shot {} moved to {}", short(&uuid), format_ts(ts));
            Ok(())
        }
    }
}

fn cmd_export(store: &Store<FileStorage>, out_dir: Option<PathBuf>, config: &Config) -> Result<()> {
    let dir = out_dir
        .or_else(|| config.export.directory.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let filename = export_filename(&Local::now(), &config.export.suffix);

    let document = store.export_document();
    let path = write_export(&document, &dir, &filename)?;

    println!(
        "✓ Exported {} medications and {} shots",
        document.medications.len(),
        document.shots.len()
    );
    println!("  File: {}", path.display());
    Ok(())
}

fn cmd_import(store: &mut Store<FileStorage>, files: &[PathBuf]) -> Result<()> {
    let report = store.import_files(files);

    for file in &report.files {
        match &file.result {
            Ok(summary) => {
                let mut parts = Vec::new();
                if let Some(n) = summary.medications {
                    parts.push(format!("{} medications", n));
                }
                if let Some(n) = summary.shots {
                    parts.push(format!("{} shots", n));
                }
                println!("✓ {}: {}", file.path.display(), parts.join(", "));
            }
            Err(e) => eprintln!("✗ {}: {}", file.path.display(), e),
        }
    }

    if report.applied() == 0 {
        return Err(Error::Import("no file could be imported".into()));
    }
    Ok(())
}

fn cmd_import_list(store: &mut Store<FileStorage>, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)?;
    let created = store.import_list(&raw)?;
    println!("✓ Added {} medications", created.len());
    Ok(())
}

// ============================================================================
// Lookup
// ============================================================================

/// Full uuid, display name, or unambiguous id prefix
fn resolve_medication(store: &Store<FileStorage>, arg: &str) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(arg) {
        if store.medication(&uuid).is_some() {
            return Ok(uuid);
        }
    }
    if let Some(uuid) = store.find_medication(arg).and_then(|m| m.uuid) {
        return Ok(uuid);
    }
    let ids: Vec<Uuid> = store.medications().iter().filter_map(|m| m.uuid).collect();
    resolve_prefix(&ids, arg, "medication")
}

fn resolve_shot(store: &Store<FileStorage>, arg: &str) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(arg) {
        if store.shot(&uuid).is_some() {
            return Ok(uuid);
        }
    }
    let ids: Vec<Uuid> = store.shots().iter().filter_map(|s| s.uuid).collect();
    resolve_prefix(&ids, arg, "shot")
}

fn resolve_prefix(ids: &[Uuid], prefix: &str, kind: &str) -> Result<Uuid> {
    let prefix = prefix.trim().to_lowercase();
    if prefix.is_empty() {
        return Err(Error::NotFound(format!("empty {} id", kind)));
    }
    let matches: Vec<&Uuid> = ids
        .iter()
        .filter(|id| id.to_string().starts_with(&prefix))
        .collect();

    match matches.as_slice() {
        [only] => Ok(**only),
        [] => Err(Error::NotFound(format!("{} {}", kind, prefix))),
        _ => Err(Error::NotFound(format!(
            "{} id {} is ambiguous ({} matches)",
            kind,
            prefix,
            matches.len()
        ))),
    }
}

fn overlay<T>(slot: &mut Option<T>, value: Option<T>, clear: bool) {
    if clear {
        *slot = None;
    } else if value.is_some() {
        *slot = value;
    }
}

// ============================================================================
// Display
// ============================================================================

fn print_medications(store: &Store<FileStorage>) {
    let medications = store.medications();
    if medications.is_empty() {
        println!("No medications yet. Add one with `prises med add <name>`.");
        return;
    }

    match store.ui().medic_view_mode {
        ViewMode::List => {
            for medication in medications {
                let id = medication.uuid.as_ref().map(short).unwrap_or_default();
                let mut line = format!("  {}  {}", id, medication.primary);
                if let Some(ref note) = medication.secondary {
                    line.push_str(&format!(" ({})", note));
                }
                if let Some(delay) = medication.delay {
                    line.push_str(&format!(" ⏱ {}h", delay));
                }
                if let DoseStatus::WaitUntil(next) = store.dose_status(medication, Utc::now()) {
                    line.push_str(&format!(
                        " - next at {}",
                        next.with_timezone(&Local).format("%H:%M")
                    ));
                }
                println!("{}", line);
            }
        }
        ViewMode::Button => {
            let buttons: Vec<String> = medications
                .iter()
                .map(|m| format!("[ {} ]", m.primary))
                .collect();
            println!("{}", buttons.join(" "));
        }
    }
}

fn print_shots(store: &Store<FileStorage>, limit: usize) {
    println!("Latest shots:");
    let shots = store.shots();
    if shots.is_empty() {
        println!("  Nothing yet");
        return;
    }

    for shot in shots.into_iter().take(limit) {
        let id = shot.uuid.as_ref().map(short).unwrap_or_default();
        let mut line = format!(
            "  {}  {}  {} ({})",
            id,
            format_ts(shot.ts),
            shot.primary,
            relative(shot.ts)
        );
        if let Some(ref note) = shot.secondary {
            line.push_str(&format!(" - {}", note));
        }
        println!("{}", line);
    }
}

fn short(uuid: &Uuid) -> String {
    uuid.to_string()[..8].to_string()
}

fn format_ts(ts: i64) -> String {
    DateTime::from_timestamp_millis(ts)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn relative(ts: i64) -> String {
    let minutes = Utc::now().timestamp_millis().saturating_sub(ts) / 60_000;
    match minutes {
        m if m < 1 => "just now".into(),
        m if m < 60 => format!("{} min ago", m),
        m if m < 48 * 60 => format!("{} h ago", m / 60),
        m => format!("{} days ago", m / (24 * 60)),
    }
}
