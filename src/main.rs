use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use oncocal::config::{Config, Settings};
use oncocal::days::{format_ranges, parse_days_with, ParsePolicy};
use oncocal::display::{events_json, print_events, protocol_text};
use oncocal::error::ScheduleError;
use oncocal::reminder::{agenda_body, notify_agenda};
use oncocal::schedule::{events_on, parse_anchor, project, sort_chronologically, ScheduleEvent};
use oncocal::store::{import_legacy_file, load_database, TreatmentSource};

#[derive(Parser)]
#[command(name = "oncocal")]
#[command(
    about = "Chemotherapy protocol calendar",
    long_about = "Projects the treatment days of a chemotherapy protocol phase onto calendar dates, starting from a chosen day 1. Protocols are stored as JSON for easy import/export."
)]
#[command(version)]
struct Cli {
    /// Path to the protocol store (default: ~/.oncocal.json, or $ONCOCAL_STORE)
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Selection {
    /// Protocol name (e.g. "PERSEUS")
    protocol: String,
    /// Protocol version (default: first stored version)
    #[arg(short, long)]
    version: Option<String>,
    /// Phase name (e.g. "Induction")
    #[arg(short, long)]
    phase: String,
}

#[derive(Args)]
struct ProjectionArgs {
    /// Day 1 of the phase (YYYY-MM-DD)
    #[arg(short, long)]
    start: String,
    /// Event duration: "one-hour-slot" or "all-day" (or $ONCOCAL_DURATION)
    #[arg(long)]
    duration: Option<String>,
    /// Slot start time for one-hour slots (e.g. "9:00", "morning")
    #[arg(long)]
    at: Option<String>,
    /// Reject malformed day ranges instead of skipping them
    #[arg(long)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored protocols
    #[command(visible_alias = "p")]
    Protocols,
    /// List the phases of a protocol
    Phases {
        protocol: String,
        #[arg(short, long)]
        version: Option<String>,
    },
    /// Show the treatment summary of a phase
    Show {
        #[command(flatten)]
        selection: Selection,
    },
    /// Project a phase onto the calendar
    #[command(visible_alias = "s")]
    Schedule {
        #[command(flatten)]
        selection: Selection,
        #[command(flatten)]
        projection: ProjectionArgs,
        /// Sort events by date instead of treatment order
        #[arg(long)]
        sorted: bool,
        /// Print calendar events as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the treatments due on one date
    #[command(visible_alias = "a")]
    Agenda {
        #[command(flatten)]
        selection: Selection,
        #[command(flatten)]
        projection: ProjectionArgs,
        /// Date to show (YYYY-MM-DD, default: today)
        #[arg(short, long)]
        date: Option<String>,
        /// Also send a desktop notification
        #[arg(short, long)]
        notify: bool,
    },
    /// Preview how a day-range text is read (e.g. "2 to 5, 9")
    Days {
        text: String,
        #[arg(long)]
        strict: bool,
    },
    /// Import a protocol from a per-phase JSON file
    Import {
        file: PathBuf,
        /// Protocol name to store it under
        #[arg(short, long)]
        name: String,
        #[arg(short, long, default_value = "1")]
        version: String,
        /// Overwrite an existing protocol with the same name and version
        #[arg(long)]
        replace: bool,
    },
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(
    store: Option<PathBuf>,
    projection: Option<&ProjectionArgs>,
) -> Result<Config, ScheduleError> {
    let settings = Settings {
        store,
        duration: projection.and_then(|p| p.duration.clone()),
        slot_time: projection.and_then(|p| p.at.clone()),
        strict: projection.is_some_and(|p| p.strict),
    };
    Config::resolve(settings.with_env())
}

fn project_selection(
    config: &Config,
    selection: &Selection,
    start: &str,
) -> Result<Vec<ScheduleEvent>, Box<dyn std::error::Error>> {
    let anchor = parse_anchor(start)?;
    let db = load_database(&config.store_path)?;
    let treatments = db.list_treatments(
        &selection.protocol,
        selection.version.as_deref(),
        &selection.phase,
    )?;
    Ok(project(&treatments, anchor, &config.options)?)
}

fn run(cli: Cli) -> CliResult {
    match cli.command {
        Commands::Protocols => {
            let config = resolve_config(cli.store, None)?;
            let db = load_database(&config.store_path)?;
            if db.protocols.is_empty() {
                println!("No protocols stored. Add one with: oncocal import <FILE> --name <NAME>");
                return Ok(());
            }
            println!("\nProtocols:");
            println!("{}", "=".repeat(60));
            for protocol in &db.protocols {
                let mut line = format!("  {} (version {})", protocol.name, protocol.version);
                if let Some(cancer_type) = &protocol.cancer_type {
                    line.push_str(&format!(" - {}", cancer_type));
                    if let Some(subtype) = &protocol.subtype {
                        line.push_str(&format!(" / {}", subtype));
                    }
                }
                println!("{}", line);
            }
            println!();
        }
        Commands::Phases { protocol, version } => {
            let config = resolve_config(cli.store, None)?;
            let db = load_database(&config.store_path)?;
            for name in db.phase_names(&protocol, version.as_deref())? {
                println!("{}", name);
            }
        }
        Commands::Show { selection } => {
            let config = resolve_config(cli.store, None)?;
            let db = load_database(&config.store_path)?;
            let protocol = db.find(&selection.protocol, selection.version.as_deref())?;
            let treatments = db.list_treatments(
                &selection.protocol,
                selection.version.as_deref(),
                &selection.phase,
            )?;

            println!("\n{} (version {}) - {}", protocol.name, protocol.version, selection.phase);
            println!("{}", "=".repeat(60));
            if let Some(phase) = protocol.phase(&selection.phase) {
                if let Some(instructions) = &phase.instructions {
                    println!("{}\n", instructions);
                }
            }
            println!("{}", protocol_text(&treatments));
            println!();
        }
        Commands::Schedule {
            selection,
            projection,
            sorted,
            json,
        } => {
            let config = resolve_config(cli.store, Some(&projection))?;
            let mut events = project_selection(&config, &selection, &projection.start)?;
            if sorted {
                sort_chronologically(&mut events);
            }

            if json {
                println!("{}", events_json(&events)?);
            } else {
                let heading = format!(
                    "{} - {} (day 1: {}, {})",
                    selection.protocol, selection.phase, projection.start, config.options.duration
                );
                print_events(&heading, &events);
            }
        }
        Commands::Agenda {
            selection,
            projection,
            date,
            notify,
        } => {
            let config = resolve_config(cli.store, Some(&projection))?;
            let events = project_selection(&config, &selection, &projection.start)?;
            let date = match date {
                Some(text) => parse_anchor(&text)?,
                None => Local::now().date_naive(),
            };

            match agenda_body(&events, date) {
                Some(body) => {
                    println!(
                        "\n{} treatments for {}",
                        selection.protocol,
                        date.format("%a %Y-%m-%d")
                    );
                    println!("{}", "=".repeat(60));
                    println!("{}\n", body);
                }
                None => println!("No treatments scheduled for {}.", date),
            }

            let due = !events_on(&events, date).is_empty();
            if notify && due && !notify_agenda(&selection.protocol, &events, date) {
                eprintln!("Warning: failed to send desktop notification");
            }
        }
        Commands::Days { text, strict } => {
            let policy = if strict { ParsePolicy::Strict } else { ParsePolicy::Lenient };
            let parsed = parse_days_with(&text, policy)?;
            println!("Days: {}", format_ranges(&parsed.ranges));
            println!("Count: {}", parsed.day_count());
            for skipped in &parsed.skipped {
                println!("Skipped '{}': {}", skipped.segment, skipped.reason);
            }
        }
        Commands::Import {
            file,
            name,
            version,
            replace,
        } => {
            let config = resolve_config(cli.store, None)?;
            let protocol = import_legacy_file(&config.store_path, &file, &name, &version, replace)?;
            println!(
                "Imported protocol: {} (version {}, {} phase(s))",
                protocol.name,
                protocol.version,
                protocol.phases.len()
            );
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
