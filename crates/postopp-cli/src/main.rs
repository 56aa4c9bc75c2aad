//! PostOpp command-line journal
//!
//! Every command opens the journal, passes the PIN gate when a PIN is set
//! and then runs one store operation.

mod config;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use postopp_storage_sqlite::{
    catalog, find_symptom, Clock, CustomSymptomStorage, DecodedLog, GateEffect, GateEvent,
    GateState, Journal, SettingsStorage, Symptom, SymptomLog, SystemClock,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Longest `history --days` window accepted
const MAX_HISTORY_DAYS: i64 = 36_500;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Parser)]
#[command(name = "postopp")]
#[command(about = "Local encrypted symptom journal", long_about = None)]
struct Cli {
    /// Journal database path
    #[arg(long, global = true, env = "POSTOPP_DB")]
    db: Option<PathBuf>,

    /// PIN used to unlock the journal
    #[arg(long, global = true, env = "POSTOPP_PIN", hide_env_values = true)]
    pin: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show lock state, log count and settings
    Status,

    /// Record a symptom
    Log {
        /// Symptom id (see `symptoms list`)
        symptom: String,

        /// Pain level 1-10
        #[arg(short, long)]
        pain: u8,

        /// Free-form notes
        #[arg(short, long)]
        notes: Option<String>,

        /// Latitude
        #[arg(long, requires = "longitude", allow_hyphen_values = true)]
        latitude: Option<f64>,

        /// Longitude
        #[arg(long, requires = "latitude", allow_hyphen_values = true)]
        longitude: Option<f64>,

        /// Location accuracy in meters
        #[arg(long)]
        accuracy: Option<f64>,

        /// Timestamp in ms since epoch (defaults to now)
        #[arg(long)]
        timestamp: Option<i64>,
    },

    /// List logs, newest first
    History {
        /// Only this symptom
        #[arg(short, long)]
        symptom: Option<String>,

        /// Only the last N days
        #[arg(short, long, value_parser = clap::value_parser!(i64).range(1..=MAX_HISTORY_DAYS))]
        days: Option<i64>,

        /// Maximum rows shown
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Record the follow-up pain level for a log
    FollowUp {
        /// Log id
        id: i64,

        /// Pain level 1-10
        #[arg(short, long)]
        pain: u8,
    },

    /// Write a plaintext JSON backup
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a JSON backup
    Import {
        /// Backup file
        file: PathBuf,
    },

    /// Set or change the 4-digit PIN
    SetPin {
        /// New PIN
        new_pin: String,
    },

    /// Remove the PIN
    DisablePin,

    /// Erase every log and remove the PIN
    ForgotPin {
        /// Confirm that all logs will be deleted
        #[arg(long)]
        yes: bool,
    },

    /// Delete every log
    Clear {
        /// Type DELETE to confirm
        #[arg(long)]
        confirm: String,
    },

    /// Manage symptoms
    Symptoms {
        #[command(subcommand)]
        command: SymptomCommands,
    },
}

#[derive(Subcommand)]
enum SymptomCommands {
    /// List built-in and custom symptoms
    List,

    /// Add a custom symptom
    Add {
        /// Display name
        name: String,

        /// Short label
        #[arg(long)]
        short_name: Option<String>,

        /// Emoji icon
        #[arg(long, default_value = "🩹")]
        icon: String,

        /// Hex color
        #[arg(long, default_value = "#808080")]
        color: String,
    },

    /// Remove a custom symptom
    Remove {
        /// Custom symptom id
        id: String,
    },

    /// Show or hide a symptom on the home screen
    Toggle {
        /// Symptom id
        id: String,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so exports on stdout stay clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let path = config::resolve_db_path(cli.db);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let mut journal = Journal::open(&path, clock.clone())
        .with_context(|| format!("Failed to open journal at {}", path.display()))?;

    // Forgot-PIN is the one command that runs behind a locked gate
    if !matches!(cli.command, Commands::ForgotPin { .. }) {
        unlock(&mut journal, cli.pin.as_deref())?;
    }

    match cli.command {
        Commands::Status => status(&journal)?,
        Commands::Log {
            symptom,
            pain,
            notes,
            latitude,
            longitude,
            accuracy,
            timestamp,
        } => {
            let timestamp = timestamp.unwrap_or_else(|| clock.now_ms());
            let mut log = SymptomLog::new(symptom, pain, timestamp);
            if let (Some(lat), Some(lon)) = (latitude, longitude) {
                log = log.with_location(lat, lon, accuracy);
            }
            if let Some(notes) = notes {
                log = log.with_notes(notes);
            }
            let id = journal
                .logs()
                .create(journal.session(), &log)
                .map_err(user_error)?;
            println!("Logged #{} ({} at pain {})", id, log.symptom_id, log.pain_level);
        }
        Commands::History {
            symptom,
            days,
            limit,
        } => history(&journal, clock.now_ms(), symptom, days, limit)?,
        Commands::FollowUp { id, pain } => {
            let log = journal.record_follow_up(id, pain).map_err(user_error)?;
            println!(
                "Follow-up recorded for #{}: {} -> {}",
                id,
                log.pain_level,
                pain
            );
        }
        Commands::Export { output } => {
            let json = journal.export_backup().map_err(user_error)?.to_json()?;
            match output {
                Some(file) => {
                    std::fs::write(&file, json)
                        .with_context(|| format!("Failed to write {}", file.display()))?;
                    info!("Backup written to {}", file.display());
                }
                None => println!("{}", json),
            }
        }
        Commands::Import { file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let summary = journal.import_backup(&json).map_err(user_error)?;
            println!(
                "Imported {} logs ({} skipped)",
                summary.imported, summary.skipped
            );
        }
        Commands::SetPin { new_pin } => {
            let summary = journal.enable_pin(&new_pin).map_err(user_error)?;
            println!("PIN set; {} logs re-encrypted", summary.resealed);
        }
        Commands::DisablePin => {
            let summary = journal.disable_pin().map_err(user_error)?;
            println!("PIN removed; {} logs re-encrypted", summary.resealed);
        }
        Commands::Clear { confirm } => {
            let deleted = journal.clear_all_data(&confirm).map_err(user_error)?;
            println!("Deleted {} logs", deleted);
        }
        Commands::Symptoms { command } => symptoms(&mut journal, command)?,
        Commands::ForgotPin { yes } => forgot_pin(&mut journal, yes)?,
    }

    Ok(())
}

fn user_error(e: postopp_storage_sqlite::Error) -> anyhow::Error {
    anyhow::anyhow!(e.user_message())
}

fn report(effects: &[GateEffect]) {
    for effect in effects {
        if let Some(message) = effect.user_message() {
            eprintln!("{}", message);
        }
    }
}

fn unlock(journal: &mut Journal, pin: Option<&str>) -> anyhow::Result<()> {
    if journal.is_unlocked() {
        return Ok(());
    }
    let Some(pin) = pin else {
        bail!("The journal is locked. Pass --pin or set POSTOPP_PIN.");
    };

    let effects = journal.enter_pin(pin).map_err(user_error)?;
    report(&effects);

    if !journal.is_unlocked() {
        bail!("Journal is still locked");
    }
    Ok(())
}

fn forgot_pin(journal: &mut Journal, confirmed: bool) -> anyhow::Result<()> {
    if !journal.settings().pin_enabled {
        println!("No PIN is set");
        return Ok(());
    }
    let effects = journal
        .handle(GateEvent::ForgotPin { confirmed })
        .map_err(user_error)?;
    report(&effects);

    if effects.iter().any(|e| matches!(e, GateEffect::WipeAndUnlock)) {
        println!("All logs erased and PIN removed");
    } else if !confirmed {
        eprintln!("Re-run with --yes to erase all logs");
    }
    Ok(())
}

fn status(journal: &Journal) -> anyhow::Result<()> {
    let settings = journal.settings();
    let state = match journal.gate_state() {
        GateState::NoPinConfigured => "open (no PIN)",
        GateState::Unlocked => "unlocked",
        GateState::Locked | GateState::Unlocking { .. } => "locked",
        GateState::LockedOut { .. } => "locked out",
    };

    println!("Journal:        {}", state);
    println!("Logs:           {}", journal.logs().count().map_err(user_error)?);
    println!("Active:         {}", settings.active_symptom_ids.join(", "));
    println!("Follow-up:      {} min", settings.follow_up_delay_minutes);
    println!(
        "Notifications:  {}",
        if settings.notifications_enabled { "on" } else { "off" }
    );
    println!("Last export:    {}", format_ms(settings.last_export_date));
    Ok(())
}

/// Start of a window covering the last `days` days before `now_ms`
fn window_start(now_ms: i64, days: i64) -> i64 {
    now_ms.saturating_sub(days.saturating_mul(DAY_MS))
}

fn history(
    journal: &Journal,
    now_ms: i64,
    symptom: Option<String>,
    days: Option<i64>,
    limit: usize,
) -> anyhow::Result<()> {
    let start = days.map(|d| window_start(now_ms, d));
    let store = journal.logs();

    let rows: Vec<SymptomLog> = match symptom {
        Some(id) => store
            .get_by_symptom(journal.session(), &id, start, None)
            .map_err(user_error)?,
        None => {
            let decoded = match start {
                Some(start) => store.get_by_range(journal.session(), start, i64::MAX),
                None => store.get_all(journal.session()),
            }
            .map_err(user_error)?;
            decoded.into_iter().map(DecodedLog::into_placeholder).collect()
        }
    };

    let customs = CustomSymptomStorage::list(journal.database().conn()).map_err(user_error)?;
    for log in rows.iter().take(limit) {
        let name = find_symptom(&log.symptom_id, &customs)
            .map(|s| s.name)
            .unwrap_or_else(|| log.symptom_id.clone());
        let follow_up = log
            .follow_up_pain_level
            .map(|p| format!(" -> {}", p))
            .unwrap_or_default();
        println!(
            "#{:<5} {}  {:<16} {:>2}{}  {}",
            log.id.unwrap_or_default(),
            format_ms(Some(log.timestamp)),
            name,
            log.pain_level,
            follow_up,
            log.notes
        );
    }
    if rows.len() > limit {
        println!("... {} more", rows.len() - limit);
    }
    Ok(())
}

fn symptoms(journal: &mut Journal, command: SymptomCommands) -> anyhow::Result<()> {
    let conn = journal.database().conn();
    match command {
        SymptomCommands::List => {
            let active = &journal.settings().active_symptom_ids;
            let customs = CustomSymptomStorage::list(conn).map_err(user_error)?;
            let all = catalog()
                .into_iter()
                .chain(customs.iter().map(Symptom::from));
            for symptom in all {
                let marker = if active.contains(&symptom.id) { "*" } else { " " };
                println!(
                    "{} {} {:<28} {:<16} {}",
                    marker,
                    symptom.icon,
                    symptom.id,
                    symptom.name,
                    symptom.category.display_name()
                );
            }
        }
        SymptomCommands::Add {
            name,
            short_name,
            icon,
            color,
        } => {
            let short_name = short_name.unwrap_or_else(|| name.clone());
            let added = CustomSymptomStorage::add(conn, &name, &short_name, &icon, &color)
                .map_err(user_error)?;
            println!("Added {}", added.id);
        }
        SymptomCommands::Remove { id } => {
            CustomSymptomStorage::remove(conn, &id).map_err(user_error)?;
            println!("Removed {}", id);
        }
        SymptomCommands::Toggle { id } => {
            let active = SettingsStorage::toggle_active_symptom(conn, &id).map_err(user_error)?;
            println!("Active: {}", active.join(", "));
            journal.reload_settings().map_err(user_error)?;
        }
    }
    Ok(())
}

fn format_ms(ms: Option<i64>) -> String {
    ms.and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
        .map(|dt| dt.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_start() {
        assert_eq!(window_start(10 * DAY_MS, 3), 7 * DAY_MS);
        assert_eq!(window_start(i64::MIN, 1), i64::MIN);
        assert_eq!(window_start(0, i64::MAX), -i64::MAX);
    }

    #[test]
    fn test_days_out_of_range_rejected() {
        assert!(Cli::try_parse_from(["postopp", "history", "--days", "7"]).is_ok());
        assert!(Cli::try_parse_from(["postopp", "history", "--days", "0"]).is_err());
        assert!(
            Cli::try_parse_from(["postopp", "history", "--days", "9999999999999999"]).is_err()
        );
    }
}
