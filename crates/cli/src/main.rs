use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use registry_core::constants::{DEFAULT_PATIENT_DATA_DIR, MAX_INDEX, MAX_PATIENTS};
use registry_core::{CoreConfig, Gender, MutationPolicy, Patient, PatientService, Ready};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "registry")]
#[command(about = "Patient registry CLI")]
struct Cli {
    /// Directory holding patients.bin and index.dat (env: PATIENT_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Record store capacity (env: REGISTRY_MAX_PATIENTS)
    #[arg(long, global = true)]
    max_patients: Option<usize>,
    /// Identifier index capacity (env: REGISTRY_MAX_INDEX)
    #[arg(long, global = true)]
    max_index: Option<usize>,
    /// `reload` or `incremental` (env: REGISTRY_MUTATION_POLICY)
    #[arg(long, global = true)]
    policy: Option<MutationPolicy>,
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List all patients in store order
    List,
    /// Show one patient and its store position
    Get {
        /// National identifier (CI)
        ci: String,
    },
    /// Add a new patient
    Add(PatientArgs),
    /// Replace every field of an existing patient
    Update(PatientArgs),
    /// Delete a patient
    Delete {
        /// National identifier (CI)
        ci: String,
    },
    /// Set a patient's appointment date
    Schedule {
        /// National identifier (CI)
        ci: String,
        /// Appointment date (YYYY-MM-DD)
        date: String,
    },
    /// List patients with a disability
    Disabled,
    /// List patients with an appointment on a date
    ByDate {
        /// Appointment date (YYYY-MM-DD)
        date: String,
    },
    /// List patients seen by a specialty (exact match)
    BySpecialty { specialty: String },
    /// List female patients
    Female,
    /// List male patients
    Male,
    /// List patients younger than LIMIT
    UnderAge { limit: u16 },
    /// Show the identifier index
    Index,
    /// Show registry counts
    Summary,
}

#[derive(Args, Debug)]
struct PatientArgs {
    /// National identifier (CI), up to 8 digits
    ci: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    age: u16,
    #[arg(long)]
    diagnosis: String,
    /// M or F
    #[arg(long)]
    gender: Gender,
    /// The patient has a disability
    #[arg(long)]
    disability: bool,
    /// Doctor specialty
    #[arg(long)]
    specialty: String,
    /// Appointment date (YYYY-MM-DD)
    #[arg(long)]
    date: Option<String>,
}

impl PatientArgs {
    fn into_patient(self) -> Patient {
        Patient {
            id: self.ci,
            name: self.name,
            age: self.age,
            diagnosis: self.diagnosis,
            gender: self.gender,
            disability: self.disability,
            doc_specialty: self.specialty,
            appointment_date: self.date.unwrap_or_default(),
        }
    }
}

#[derive(Serialize)]
struct IndexRow<'a> {
    slot: usize,
    ci: &'a str,
    position: usize,
}

/// Resolves the core configuration: flags first, then the environment, then defaults.
fn resolve_config(cli: &Cli, env: impl Fn(&str) -> Option<String>) -> anyhow::Result<CoreConfig> {
    let data_dir = cli
        .data_dir
        .clone()
        .or_else(|| env("PATIENT_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PATIENT_DATA_DIR));

    let max_patients = match cli.max_patients {
        Some(n) => n,
        None => env_parse(&env, "REGISTRY_MAX_PATIENTS")?.unwrap_or(MAX_PATIENTS),
    };
    let max_index = match cli.max_index {
        Some(n) => n,
        None => env_parse(&env, "REGISTRY_MAX_INDEX")?.unwrap_or(MAX_INDEX),
    };
    let policy = match cli.policy {
        Some(policy) => policy,
        None => env_parse(&env, "REGISTRY_MUTATION_POLICY")?.unwrap_or_default(),
    };

    Ok(CoreConfig::new(data_dir, max_patients, max_index, policy)?)
}

fn env_parse<T>(env: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env(key)
        .map(|value| {
            value
                .parse::<T>()
                .with_context(|| format!("invalid {key}={value:?}"))
        })
        .transpose()
}

fn run(cli: Cli, cfg: Arc<CoreConfig>, out: &mut dyn Write) -> anyhow::Result<()> {
    let mut service = PatientService::open(cfg.clone()).with_context(|| {
        format!(
            "failed to open registry in {}",
            cfg.patient_data_dir().display()
        )
    })?;
    let json = cli.json;

    match cli.command {
        Commands::List => print_patients(out, json, service.list_all())?,
        Commands::Get { ci } => {
            let (position, patient) = service.locate(&ci)?;
            if json {
                print_json(out, patient)?;
            } else {
                writeln!(out, "Position: {position}")?;
                writeln!(out, "{patient}")?;
            }
        }
        Commands::Add(args) => {
            let patient = args.into_patient();
            let ci = patient.id.clone();
            let position = service.add(patient)?;
            service.save()?;
            writeln!(out, "Added patient {ci} at position {position}")?;
        }
        Commands::Update(args) => {
            let patient = args.into_patient();
            let ci = patient.id.clone();
            service.update(patient)?;
            service.save()?;
            writeln!(out, "Updated patient {ci}")?;
        }
        Commands::Delete { ci } => {
            let removed = service.delete(&ci)?;
            service.save()?;
            writeln!(out, "Deleted patient {} ({})", removed.id, removed.name)?;
        }
        Commands::Schedule { ci, date } => {
            let patient = service.schedule(&ci, &date)?;
            service.save()?;
            writeln!(
                out,
                "Scheduled patient {} for {}",
                patient.id, patient.appointment_date
            )?;
        }
        Commands::Disabled => print_patients(out, json, &service.list_disabled()?)?,
        Commands::ByDate { date } => {
            print_patients(out, json, &service.list_by_appointment_date(&date)?)?
        }
        Commands::BySpecialty { specialty } => {
            print_patients(out, json, &service.list_by_specialty(&specialty)?)?
        }
        Commands::Female => print_patients(out, json, &service.list_female()?)?,
        Commands::Male => print_patients(out, json, &service.list_male()?)?,
        Commands::UnderAge { limit } => {
            print_patients(out, json, &service.list_under_age(limit)?)?
        }
        Commands::Index => print_index(out, json, &service)?,
        Commands::Summary => {
            let summary = service.summary();
            if json {
                print_json(out, &summary)?;
            } else {
                writeln!(out, "{summary}")?;
            }
        }
    }

    Ok(())
}

fn print_patients(out: &mut dyn Write, json: bool, patients: &[Patient]) -> anyhow::Result<()> {
    if json {
        return print_json(out, patients);
    }
    if patients.is_empty() {
        writeln!(out, "No patients found.")?;
        return Ok(());
    }
    for (i, patient) in patients.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        writeln!(out, "{patient}")?;
    }
    Ok(())
}

fn print_index(
    out: &mut dyn Write,
    json: bool,
    service: &PatientService<Ready>,
) -> anyhow::Result<()> {
    let rows: Vec<IndexRow> = service
        .index_entries()
        .into_iter()
        .map(|(slot, entry)| IndexRow {
            slot,
            ci: entry.id.as_str(),
            position: entry.position,
        })
        .collect();

    if json {
        return print_json(out, &rows);
    }
    if rows.is_empty() {
        writeln!(out, "Index is empty.")?;
        return Ok(());
    }
    for row in rows {
        writeln!(
            out,
            "Slot: {:>4}  CI: {:>8}  Position: {}",
            row.slot, row.ci, row.position
        )?;
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("registry=info,registry_core=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = Arc::new(resolve_config(&cli, |key| std::env::var(key).ok())?);
    tracing::debug!(
        "data dir {}, capacity {}/{}, policy {:?}",
        cfg.patient_data_dir().display(),
        cfg.patient_capacity(),
        cfg.index_capacity(),
        cfg.mutation_policy()
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run(cli, cfg, &mut out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use registry_core::{ErrorKind, RegistryError};
    use std::collections::HashMap;
    use std::path::Path;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("registry").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn run_in(dir: &Path, args: &[&str]) -> anyhow::Result<String> {
        let dir = dir.to_str().expect("utf-8 temp path");
        let mut full = vec!["--data-dir", dir];
        full.extend_from_slice(args);
        let cli = parse(&full);
        let cfg = Arc::new(resolve_config(&cli, no_env)?);
        let mut out = Vec::new();
        run(cli, cfg, &mut out)?;
        Ok(String::from_utf8(out).expect("utf-8 output"))
    }

    const ADD: &[&str] = &[
        "add",
        "00000001",
        "--name",
        "A",
        "--age",
        "30",
        "--diagnosis",
        "D",
        "--gender",
        "m",
        "--specialty",
        "Gen",
        "--date",
        "2024-01-01",
    ];

    #[test]
    fn test_config_defaults() {
        let cfg = resolve_config(&parse(&["list"]), no_env).unwrap();
        assert_eq!(cfg.patient_data_dir(), Path::new("data"));
        assert_eq!(cfg.patient_capacity(), MAX_PATIENTS);
        assert_eq!(cfg.index_capacity(), MAX_INDEX);
        assert_eq!(cfg.mutation_policy(), MutationPolicy::Incremental);
    }

    #[test]
    fn test_config_env_and_flag_override() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("PATIENT_DATA_DIR", "/srv/registry"),
            ("REGISTRY_MAX_PATIENTS", "50"),
            ("REGISTRY_MAX_INDEX", "500"),
            ("REGISTRY_MUTATION_POLICY", "reload"),
        ]);
        let lookup = |key: &str| env.get(key).map(|v| v.to_string());

        let cfg = resolve_config(&parse(&["list"]), lookup).unwrap();
        assert_eq!(cfg.patient_data_dir(), Path::new("/srv/registry"));
        assert_eq!(cfg.patient_capacity(), 50);
        assert_eq!(cfg.mutation_policy(), MutationPolicy::ReloadAfterWrite);

        let cli = parse(&["--max-patients", "10", "--policy", "incremental", "list"]);
        let cfg = resolve_config(&cli, lookup).unwrap();
        assert_eq!(cfg.patient_capacity(), 10);
        assert_eq!(cfg.index_capacity(), 500);
        assert_eq!(cfg.mutation_policy(), MutationPolicy::Incremental);
    }

    #[test]
    fn test_config_rejects_bad_env() {
        let lookup = |key: &str| (key == "REGISTRY_MAX_INDEX").then(|| "lots".to_string());
        let err = resolve_config(&parse(&["list"]), lookup).unwrap_err();
        assert!(err.to_string().contains("REGISTRY_MAX_INDEX"));

        let cli = parse(&["--max-patients", "20", "--max-index", "10", "list"]);
        assert!(resolve_config(&cli, no_env).is_err());
    }

    #[test]
    fn test_add_get_and_list_json() {
        let temp = TempDir::new().unwrap();
        let added = run_in(temp.path(), ADD).unwrap();
        assert_eq!(added, "Added patient 00000001 at position 0\n");

        let shown = run_in(temp.path(), &["get", "00000001"]).unwrap();
        assert!(shown.starts_with("Position: 0\nCI: 00000001\n"));
        assert!(shown.contains("Gender: Male"));

        let listed = run_in(temp.path(), &["--json", "list"]).unwrap();
        let patients: Vec<Patient> = serde_json::from_str(&listed).unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].appointment_date, "2024-01-01");

        // Mutations save the index as well as the records.
        assert!(temp.path().join("index.dat").exists());
    }

    #[test]
    fn test_schedule_delete_and_index() {
        let temp = TempDir::new().unwrap();
        run_in(temp.path(), ADD).unwrap();

        let scheduled = run_in(temp.path(), &["schedule", "00000001", "2025-12-24"]).unwrap();
        assert_eq!(scheduled, "Scheduled patient 00000001 for 2025-12-24\n");

        let index = run_in(temp.path(), &["index", "--json"]).unwrap();
        let rows: serde_json::Value = serde_json::from_str(&index).unwrap();
        assert_eq!(rows[0]["ci"], "00000001");
        assert_eq!(rows[0]["slot"], 1);

        run_in(temp.path(), &["delete", "00000001"]).unwrap();
        let listed = run_in(temp.path(), &["list"]).unwrap();
        assert_eq!(listed, "No patients found.\n");
    }

    #[test]
    fn test_errors_keep_their_kind() {
        let temp = TempDir::new().unwrap();
        let err = run_in(temp.path(), &["get", "12345678"]).unwrap_err();
        let kind = err.downcast_ref::<RegistryError>().map(RegistryError::kind);
        assert_eq!(kind, Some(ErrorKind::NotFound));

        let err = run_in(temp.path(), &["under-age", "0"]).unwrap_err();
        let kind = err.downcast_ref::<RegistryError>().map(RegistryError::kind);
        assert_eq!(kind, Some(ErrorKind::InvalidArgument));
    }

    #[test]
    fn test_gender_flag_is_validated() {
        let mut args = vec!["registry"];
        args.extend_from_slice(ADD);
        let pos = args.iter().position(|a| *a == "m").unwrap();
        args[pos] = "x";
        assert!(Cli::try_parse_from(args).is_err());
    }
}
