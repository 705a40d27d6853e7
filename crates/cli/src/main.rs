use std::path::PathBuf;
use std::sync::Arc;

use api_shared::issue_token;
use carebook_core::models::{AppointmentFilter, NewAvailability, NewDoctor, NewHomeCareProvider};
use carebook_core::{Actor, CoreConfig, CoreServices, LocalDatabase, Page, Role, RolePolicy};
use chrono::{Duration, NaiveTime};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "carebook")]
#[command(about = "Carebook administration CLI")]
struct Cli {
    /// SQLite data file shared with the server
    #[arg(long, env = "CAREBOOK_DATA_FILE", global = true)]
    data_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a doctor under an existing user id
    AddDoctor {
        user_id: i64,
        name: String,
        specialty: String,
        /// Consultation fee (optional)
        #[arg(long)]
        fee: Option<f64>,
    },
    /// Register a home-care provider under an existing user id
    AddHomeCareProvider {
        user_id: i64,
        name: String,
        /// Hourly rate (optional)
        #[arg(long)]
        rate: Option<f64>,
    },
    /// Publish a weekly availability window for a doctor
    SetAvailability {
        doctor_id: i64,
        /// Day of week, 0 = Sunday
        day: i64,
        /// Start time (HH:MM)
        start: String,
        /// End time (HH:MM)
        end: String,
    },
    /// List bookings
    ListAppointments {
        #[arg(long)]
        patient: Option<i64>,
        /// scheduled, completed or cancelled
        #[arg(long)]
        status: Option<String>,
    },
    /// Mint a bearer token for development
    IssueToken {
        user_id: i64,
        /// doctor, patient, home_care_provider or admin
        role: String,
        /// Lifetime in hours
        #[arg(long, default_value_t = 24)]
        hours: i64,
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        secret: String,
    },
}

fn operator() -> Actor {
    Actor::new(0, Role::Admin)
}

fn open_services(
    data_file: Option<PathBuf>,
) -> Result<CoreServices<LocalDatabase>, Box<dyn std::error::Error>> {
    let path = data_file.ok_or("a data file is required (--data-file or CAREBOOK_DATA_FILE)")?;
    let db = LocalDatabase::open(&path)?;
    Ok(CoreServices::new(
        Arc::new(db),
        Arc::new(RolePolicy),
        Arc::new(CoreConfig::default()),
    ))
}

fn parse_time(value: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(value, "%H:%M")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::AddDoctor {
            user_id,
            name,
            specialty,
            fee,
        }) => {
            let services = open_services(cli.data_file)?;
            let doctor = services.providers.create_doctor(
                &operator(),
                NewDoctor {
                    user_id,
                    name,
                    specialty,
                    consultation_fee: fee,
                },
            )?;
            println!("Registered doctor {} ({})", doctor.id, doctor.name);
        }
        Some(Commands::AddHomeCareProvider {
            user_id,
            name,
            rate,
        }) => {
            let services = open_services(cli.data_file)?;
            let provider = services.providers.create_home_care_provider(
                &operator(),
                NewHomeCareProvider {
                    user_id,
                    name,
                    hourly_rate: rate,
                },
            )?;
            println!("Registered home care provider {} ({})", provider.id, provider.name);
        }
        Some(Commands::SetAvailability {
            doctor_id,
            day,
            start,
            end,
        }) => {
            let services = open_services(cli.data_file)?;
            let window = services.availability.set(
                &operator(),
                NewAvailability {
                    doctor_id,
                    day_of_week: day,
                    start_time: parse_time(&start)?,
                    end_time: parse_time(&end)?,
                },
            )?;
            println!(
                "Availability {}: doctor {} day {} {}-{}",
                window.id, window.doctor_id, window.day_of_week, window.start_time, window.end_time
            );
        }
        Some(Commands::ListAppointments { patient, status }) => {
            let services = open_services(cli.data_file)?;
            let filter = AppointmentFilter {
                patient_id: patient,
                status: status.as_deref().map(str::parse).transpose()?,
                ..Default::default()
            };
            let appointments = services
                .appointments
                .list(&operator(), filter, Page::all())?;
            if appointments.is_empty() {
                println!("No appointments found.");
            }
            for a in appointments {
                println!(
                    "ID: {}, Patient: {}, Provider: {} {}, {} {}-{}, Status: {}",
                    a.id,
                    a.patient_id,
                    a.provider.provider_type(),
                    a.provider.id(),
                    a.date,
                    a.start_time,
                    a.end_time,
                    a.status
                );
            }
        }
        Some(Commands::IssueToken {
            user_id,
            role,
            hours,
            secret,
        }) => {
            let role: Role = role.parse()?;
            let token = issue_token(&secret, Actor::new(user_id, role), Duration::hours(hours))?;
            println!("{token}");
        }
        None => {
            println!("No command given. Use --help for usage.");
        }
    }

    Ok(())
}
