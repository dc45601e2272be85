// Schedly command-line front end.
// Prints the service response as pretty JSON; exits non-zero on failure.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use schedly_lib::error::SchedulingFailure;
use schedly_lib::services::people::{AvailabilityInput, HourValue};
use schedly_lib::state::{load_config, AppState};

#[derive(Parser)]
#[command(name = "schedly")]
#[command(about = "Book meetings from plain-language requests")]
#[command(version)]
struct Cli {
    /// Database file (overrides dbPath in ~/.schedly/config.json)
    #[arg(long, global = true, env = "SCHEDLY_DB")]
    db: Option<PathBuf>,

    /// IANA timezone for working hours and "today"/"tomorrow" (overrides referenceTimezone)
    #[arg(long, global = true)]
    timezone: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage people
    #[command(subcommand)]
    Person(PersonCommand),

    /// Manage weekly availability
    #[command(subcommand)]
    Availability(AvailabilityCommand),

    /// Show a person with their availability and appointments
    Profile {
        person_id: String,
    },

    /// Schedule a meeting from a free-text request
    Schedule {
        /// Id of the person making the request (the host)
        #[arg(long = "as", value_name = "PERSON_ID")]
        host: String,

        /// The request, e.g. "Schedule a meeting with John tomorrow at 2pm"
        #[arg(required = true, num_args = 1..)]
        request: Vec<String>,
    },

    /// Move an appointment to a new time (RFC 3339)
    Reschedule {
        appointment_id: String,
        date: String,
    },
}

#[derive(Subcommand)]
enum PersonCommand {
    /// Register a person by email
    Add {
        email: String,
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Subcommand)]
enum AvailabilityCommand {
    /// Replace a person's weekly window
    Set(AvailabilityArgs),
}

#[derive(Args)]
struct AvailabilityArgs {
    person_id: String,

    /// First bookable hour, e.g. 9 or 09:00
    #[arg(long)]
    start: String,

    /// Hour bookings must start before, e.g. 17
    #[arg(long)]
    end: String,

    /// Weekdays, 0 = Sunday .. 6 = Saturday
    #[arg(long, value_delimiter = ',', required = true)]
    days: Vec<i64>,
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to render response: {}", e),
    }
}

fn finish<T: Serialize>(result: Result<T, SchedulingFailure>) -> ExitCode {
    match result {
        Ok(value) => {
            print_json(&value);
            ExitCode::SUCCESS
        }
        Err(failure) => {
            print_json(&failure);
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(db) = cli.db {
        config.db_path = Some(db);
    }
    if let Some(tz) = cli.timezone {
        config.reference_timezone = tz;
    }

    let state = match AppState::from_config(config) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let service = &state.service;

    match cli.command {
        Command::Person(PersonCommand::Add { email, name }) => {
            finish(service.register_person(&email, name.as_deref()).await)
        }
        Command::Availability(AvailabilityCommand::Set(args)) => {
            let input = AvailabilityInput {
                start_time: Some(HourValue::Text(args.start)),
                end_time: Some(HourValue::Text(args.end)),
                days: Some(args.days),
            };
            finish(service.set_availability(&args.person_id, &input).await)
        }
        Command::Profile { person_id } => finish(service.get_profile(&person_id).await),
        Command::Schedule { host, request } => {
            finish(service.schedule_from_text(&host, &request.join(" ")).await)
        }
        Command::Reschedule {
            appointment_id,
            date,
        } => finish(service.reschedule(&appointment_id, &date).await),
    }
}
