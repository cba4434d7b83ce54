use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use encoding_rs::Encoding;
use surgery_extract::db;
use surgery_extract::decode;
use surgery_extract::settings::Settings;
use surgery_extract::SurgeryRecord;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "surgery_extract",
    about = "Extract surgical cases from HIS markup exports"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract cases from export files and print them
    Extract {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// One JSON object per line instead of a table
        #[arg(long)]
        json: bool,
        /// Encoding label of the exports (default: from settings)
        #[arg(long)]
        encoding: Option<String>,
    },
    /// Extract cases and append them to the surgery schedule
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Surgery date, YYYY-MM-DD (default: today)
        #[arg(short, long)]
        date: Option<String>,
        /// Ward (default: from settings)
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        creator: Option<String>,
        /// Encoding label of the exports (default: from settings)
        #[arg(long)]
        encoding: Option<String>,
    },
    /// Show the schedule for one day and ward
    List {
        /// YYYY-MM-DD (default: today)
        #[arg(short, long)]
        date: Option<String>,
        #[arg(long)]
        department: Option<String>,
        /// Ignore date and ward, list everything
        #[arg(long, conflicts_with_all = ["date", "department"])]
        all: bool,
    },
    /// A ward's surgeries over a date range, grouped by day
    History {
        /// First day, YYYY-MM-DD
        #[arg(long)]
        from: String,
        /// Last day, YYYY-MM-DD (default: today)
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        department: Option<String>,
    },
    /// Change fields of one schedule entry
    Edit(EditArgs),
    /// Remove one schedule entry
    Delete { id: i64 },
    /// Show schedule statistics
    Stats,
}

#[derive(Args)]
struct EditArgs {
    id: i64,
    /// YYYY-MM-DD
    #[arg(short, long)]
    date: Option<String>,
    #[arg(long)]
    order: Option<i64>,
    #[arg(long)]
    bed: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    gender: Option<String>,
    #[arg(long)]
    age: Option<i64>,
    #[arg(long)]
    hospital_number: Option<String>,
    #[arg(long)]
    diagnosis: Option<String>,
    #[arg(long)]
    operation: Option<String>,
    #[arg(long)]
    surgeon: Option<String>,
    #[arg(long)]
    assistant: Option<String>,
    #[arg(long)]
    anesthesia_doctor: Option<String>,
    #[arg(long)]
    anesthesia_type: Option<String>,
    #[arg(long)]
    pre_op_prep: Option<String>,
    /// Recorded as the row's editor (default: 系统用户)
    #[arg(long)]
    editor: Option<String>,
}

impl EditArgs {
    /// Overlay the given options onto a stored row.
    fn apply(self, row: &mut db::ScheduleRow) {
        let r = &mut row.record;
        set(&mut row.date, self.date);
        set(&mut row.operation_order, self.order);
        set(&mut row.assistant, self.assistant);
        set(&mut row.pre_op_prep, self.pre_op_prep);
        set(&mut r.bed_number, self.bed);
        set(&mut r.patient_name, self.name);
        set(&mut r.gender, self.gender);
        set(&mut r.age, self.age);
        set(&mut r.hospital_number, self.hospital_number);
        set(&mut r.diagnosis, self.diagnosis);
        set(&mut r.operation, self.operation);
        set(&mut r.main_surgeon, self.surgeon);
        set(&mut r.anesthesia_doctor, self.anesthesia_doctor);
        set(&mut r.anesthesia_type, self.anesthesia_type);
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load().context("Failed to load settings")?;

    let result = match cli.command {
        Commands::Extract {
            files,
            json,
            encoding,
        } => {
            let encoding = match encoding {
                Some(label) => decode::resolve(&label),
                None => settings.encoding(),
            };
            let results = extract_files(&files, encoding)?;
            let mut failed = 0;
            if !json {
                print_header();
            }
            for (path, result) in &results {
                match result {
                    Ok(rec) if json => println!("{}", serde_json::to_string(rec)?),
                    Ok(rec) => print_record(path, rec),
                    Err(e) => {
                        failed += 1;
                        eprintln!("{}: {:#}", path.display(), e);
                    }
                }
            }
            if failed > 0 {
                bail!("{} of {} files failed", failed, results.len());
            }
            Ok(())
        }
        Commands::Import {
            files,
            date,
            department,
            creator,
            encoding,
        } => {
            let date = date.unwrap_or_else(today);
            let department = department.unwrap_or_else(|| settings.department.clone());
            let creator = creator.unwrap_or_else(|| settings.creator.clone());

            let conn = db::connect(&settings.db_path)
                .with_context(|| format!("Failed to open {}", settings.db_path))?;
            db::init_schema(&conn)?;

            let encoding = match encoding {
                Some(label) => decode::resolve(&label),
                None => settings.encoding(),
            };
            let results = extract_files(&files, encoding)?;
            let mut order = db::next_operation_order(&conn, &date, &department)?;
            let mut rows = Vec::new();
            let mut failed = 0;
            for (path, result) in results {
                match result {
                    Ok(record) => {
                        rows.push(db::NewSurgery {
                            department: department.clone(),
                            date: date.clone(),
                            operation_order: order,
                            creator: creator.clone(),
                            record,
                        });
                        order += 1;
                    }
                    Err(e) => {
                        failed += 1;
                        eprintln!("{}: {:#}", path.display(), e);
                    }
                }
            }

            let inserted = db::insert_surgeries(&conn, &rows)?;
            println!("Imported {} cases into {} / {}.", inserted, date, department);
            if failed > 0 {
                bail!("{} of {} files failed", failed, files.len());
            }
            Ok(())
        }
        Commands::List {
            date,
            department,
            all,
        } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let rows = if all {
                db::fetch_schedule(&conn, None, None)?
            } else {
                let date = date.unwrap_or_else(today);
                let department = department.unwrap_or_else(|| settings.department.clone());
                db::fetch_schedule(&conn, Some(&date), Some(&department))?
            };
            if rows.is_empty() {
                println!("No surgeries scheduled.");
                return Ok(());
            }

            print_schedule_header();
            for row in &rows {
                print_schedule_row(row);
            }
            println!("\n{} surgeries", rows.len());
            Ok(())
        }
        Commands::History {
            from,
            to,
            department,
        } => {
            let to = to.unwrap_or_else(today);
            let department = department.unwrap_or_else(|| settings.department.clone());
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let days = db::fetch_history(&conn, &department, &from, &to)?;
            if days.is_empty() {
                println!("No surgeries for {} between {} and {}.", department, from, to);
                return Ok(());
            }
            let mut total = 0;
            for (date, rows) in &days {
                println!("\n== {} ({} surgeries) ==", date, rows.len());
                print_schedule_header();
                for row in rows {
                    print_schedule_row(row);
                }
                total += rows.len();
            }
            println!("\n{} surgeries over {} days", total, days.len());
            Ok(())
        }
        Commands::Edit(args) => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let id = args.id;
            let Some(mut row) = db::fetch_surgery(&conn, id)? else {
                bail!("No surgery with id {}", id)
            };
            let editor = args
                .editor
                .clone()
                .unwrap_or_else(|| db::DEFAULT_EDITOR.to_string());
            args.apply(&mut row);
            db::update_surgery(&conn, &row, &editor)?;
            println!("Updated surgery {} (editor {}).", id, editor);
            Ok(())
        }
        Commands::Delete { id } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            if db::delete_surgery(&conn, id)? {
                println!("Deleted surgery {}.", id);
                Ok(())
            } else {
                bail!("No surgery with id {}", id)
            }
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Surgeries: {}", s.total);
            println!("Days:      {}", s.dates);
            for (department, count) in &s.by_department {
                println!("  {}: {}", department, count);
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Read and extract every file in parallel. Results keep argument order.
fn extract_files(
    files: &[PathBuf],
    encoding: &'static Encoding,
) -> anyhow::Result<Vec<(PathBuf, anyhow::Result<SurgeryRecord>)>> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    info!(files = files.len(), encoding = encoding.name(), "Extracting");
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let results: Vec<_> = files
        .par_iter()
        .map(|path| {
            let result = extract_file(path, encoding);
            if let Err(e) = &result {
                warn!(file = %path.display(), error = %e, "Extraction failed");
            }
            pb.inc(1);
            (path.clone(), result)
        })
        .collect();

    pb.finish_and_clear();
    Ok(results)
}

fn extract_file(path: &Path, encoding: &'static Encoding) -> anyhow::Result<SurgeryRecord> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let record = surgery_extract::extract_with(&bytes, encoding)?;
    Ok(record)
}

fn print_schedule_header() {
    println!(
        "{:>5} | {:<10} | {:<8} | {:>2} | {:<5} | {:<8} | {:<2} | {:>3} | {:<24} | {:<8} | {:<8} | {:<8}",
        "ID", "Date", "Ward", "#", "Bed", "Name", "Sex", "Age", "Operation", "Surgeon", "Anesth.", "Editor"
    );
    println!("{}", "-".repeat(123));
}

fn print_schedule_row(row: &db::ScheduleRow) {
    let r = &row.record;
    println!(
        "{:>5} | {:<10} | {:<8} | {:>2} | {:<5} | {:<8} | {:<2} | {:>3} | {:<24} | {:<8} | {:<8} | {:<8}",
        row.id,
        row.date,
        truncate(&row.department, 8),
        row.operation_order,
        truncate(&r.bed_number, 5),
        truncate(&r.patient_name, 8),
        r.gender,
        r.age,
        truncate(&r.operation, 24),
        truncate(&r.main_surgeon, 8),
        truncate(&r.anesthesia_type, 8),
        truncate(&row.editor, 8),
    );
}

fn print_header() {
    println!(
        "{:<20} | {:<5} | {:<8} | {:<2} | {:>3} | {:<10} | {:<24} | {:<8} | {:<8}",
        "File", "Bed", "Name", "Sex", "Age", "Hosp. No.", "Operation", "Surgeon", "Anesth."
    );
    println!("{}", "-".repeat(110));
}

fn print_record(path: &Path, r: &SurgeryRecord) {
    let file = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    println!(
        "{:<20} | {:<5} | {:<8} | {:<2} | {:>3} | {:<10} | {:<24} | {:<8} | {:<8}",
        truncate(&file, 20),
        truncate(&r.bed_number, 5),
        truncate(&r.patient_name, 8),
        r.gender,
        r.age,
        truncate(&r.hospital_number, 10),
        truncate(&r.operation, 24),
        truncate(&r.main_surgeon, 8),
        truncate(&r.anesthesia_type, 8),
    );
}

fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
