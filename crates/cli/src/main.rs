use api_shared::{AlertRes, ClassificationDto, JwtKeys, ReadingRes, Role};
use clap::{Parser, Subcommand};
use spmr_core::{classify, FileTriageStore, PatientId, TriageConfig, TriageStore, VitalSigns};

#[derive(Parser)]
#[command(name = "spmr")]
#[command(about = "SPMR remote-monitoring triage CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a reading with the rule engine
    Classify {
        /// Heart rate (bpm)
        #[arg(long)]
        hr: Option<f64>,
        /// Oxygen saturation (%)
        #[arg(long)]
        spo2: Option<f64>,
        /// Body temperature (°C)
        #[arg(long)]
        temp: Option<f64>,
        /// Respiratory rate (breaths/min)
        #[arg(long)]
        rr: Option<f64>,
    },
    /// Issue a bearer token signed with JWT_SECRET_KEY
    IssueToken {
        /// User id to put in the `sub` claim
        subject: String,
        /// patient, doctor or admin
        #[arg(long, default_value = "patient")]
        role: Role,
        /// Lifetime in hours
        #[arg(long, default_value_t = 1)]
        hours: i64,
    },
    /// List stored alerts for a patient
    Alerts {
        /// Patient id
        patient_id: String,
    },
    /// List stored readings for a patient
    Vitals {
        /// Patient id
        patient_id: String,
    },
}

fn open_store(cfg: &TriageConfig) -> FileTriageStore {
    FileTriageStore::new(cfg.data_dir())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let cfg = TriageConfig::from_lookup(|key| std::env::var(key).ok())?;

    match cli.command {
        Some(Commands::Classify { hr, spo2, temp, rr }) => {
            let vitals = VitalSigns { hr, spo2, temp, rr };
            let result = classify(&vitals, cfg.thresholds());
            let dto = ClassificationDto::from(&result);
            println!("{}", serde_json::to_string_pretty(&dto)?);
        }
        Some(Commands::IssueToken {
            subject,
            role,
            hours,
        }) => {
            let secret = std::env::var("JWT_SECRET_KEY")
                .map_err(|_| "JWT_SECRET_KEY must be set to issue tokens")?;
            let token = JwtKeys::from_secret(secret.as_bytes()).issue(
                &subject,
                role,
                chrono::Duration::hours(hours),
            )?;
            println!("{}", token);
        }
        Some(Commands::Alerts { patient_id }) => {
            let patient_id = PatientId::parse(&patient_id)?;
            let alerts = open_store(&cfg).list_alerts(&patient_id)?;
            if alerts.is_empty() {
                println!("No alerts found.");
            } else {
                let rows: Vec<AlertRes> = alerts.iter().map(Into::into).collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            }
        }
        Some(Commands::Vitals { patient_id }) => {
            let patient_id = PatientId::parse(&patient_id)?;
            let readings = open_store(&cfg).list_readings(&patient_id)?;
            if readings.is_empty() {
                println!("No readings found.");
            } else {
                let rows: Vec<ReadingRes> = readings.iter().map(Into::into).collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            }
        }
        None => {
            println!("Use 'spmr --help' for commands");
        }
    }

    Ok(())
}
