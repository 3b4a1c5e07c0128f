use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    backup::{backup_file_name, create_backup, export_backup, parse_backup},
    export::{clinical_logs_csv, records_json, skills_matrix_csv, students_csv},
    import::parse_students_csv,
    load_settings,
    predictor::cohort_readiness,
    AppCommand, InstructorSession, KeyEvent, KeyOutcome,
};
use shared::domain::{ClinicalLogId, StudentId, StudentStatus};
use storage::RecordStore;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "nursed", about = "Nursing program records from the command line")]
struct Cli {
    /// Overrides the configured database URL.
    #[arg(long)]
    database_url: Option<String>,
    /// Overrides the directory holding the local profile cache.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    ListStudents,
    ImportStudents {
        path: PathBuf,
        /// Cohort for rows without one; defaults to the profile preference.
        #[arg(long)]
        cohort: Option<String>,
    },
    ExportStudents {
        out: PathBuf,
        #[arg(long)]
        json: bool,
    },
    ExportSkills {
        out: PathBuf,
    },
    ExportLogs {
        out: PathBuf,
    },
    /// Writes every student and clinical log to a JSON backup.
    Backup {
        /// Defaults to `nursed-backup-<date>.json` in the current directory.
        out: Option<PathBuf>,
    },
    /// Merges a JSON backup into the database; existing records are
    /// overwritten, nothing is deleted.
    Restore {
        path: PathBuf,
    },
    Predict,
    ShowProfile,
    SetProfile {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        credentials: Option<String>,
        #[arg(long)]
        institution: Option<String>,
    },
    Recent,
    /// Reads editing commands from stdin; type `help` for the list.
    Shell,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings();
    if let Some(url) = cli.database_url {
        settings.database_url = url;
    }
    if let Some(dir) = cli.data_dir {
        settings.data_dir = dir;
    }
    let session = InstructorSession::open(&settings).await?;

    match cli.command {
        Command::ListStudents => {
            for s in session.store().list_students().await? {
                println!(
                    "{}\t{}\t{}\t{}\t{:.0}/{:.0}h\t{} skills",
                    s.id,
                    s.full_name(),
                    s.cohort,
                    s.status,
                    s.clinical_hours_completed,
                    s.clinical_hours_required,
                    s.skills_completed.len()
                );
            }
        }
        Command::ImportStudents { path, cohort } => {
            let file = fs::File::open(&path)
                .with_context(|| format!("failed to open '{}'", path.display()))?;
            let cohort =
                cohort.unwrap_or_else(|| session.profile().load().preferences.default_cohort);
            let outcome = parse_students_csv(file, &cohort)?;
            for error in &outcome.errors {
                warn!(line = error.line, "skipped row: {}", error.message);
            }
            let mut created = 0;
            for student in &outcome.students {
                match session.store().create_student(student).await {
                    Ok(()) => created += 1,
                    Err(err) => warn!(student_id = %student.id, "import failed: {err:#}"),
                }
            }
            println!(
                "imported {created} student(s), skipped {} row(s)",
                outcome.errors.len() + outcome.students.len() - created
            );
        }
        Command::ExportStudents { out, json } => {
            let students = session.store().list_students().await?;
            let bytes = if json {
                records_json(&students)?
            } else {
                students_csv(&students)?
            };
            write_export(&out, &bytes)?;
        }
        Command::ExportSkills { out } => {
            let students = session.store().list_students().await?;
            write_export(&out, &skills_matrix_csv(&students)?)?;
        }
        Command::ExportLogs { out } => {
            let students = session.store().list_students().await?;
            let logs = session.store().list_clinical_logs(None).await?;
            write_export(&out, &clinical_logs_csv(&logs, &students)?)?;
        }
        Command::Backup { out } => {
            let exported_by = session.profile().load().display_name();
            let backup = create_backup(session.store().as_ref(), &exported_by).await?;
            let out = out.unwrap_or_else(|| {
                PathBuf::from(backup_file_name(backup.timestamp.date_naive()))
            });
            write_export(&out, &export_backup(&backup)?)?;
            println!(
                "backed up {} student(s) and {} clinical log(s) to {}",
                backup.metadata.student_count,
                backup.metadata.log_count,
                out.display()
            );
        }
        Command::Restore { path } => {
            let bytes =
                fs::read(&path).with_context(|| format!("failed to read '{}'", path.display()))?;
            let backup = parse_backup(&bytes)
                .with_context(|| format!("'{}' is not a usable backup", path.display()))?;
            let report = session.restore_backup(&backup).await?;
            for failure in &report.failures {
                warn!("not restored: {failure}");
            }
            println!(
                "restored {} student(s) and {} clinical log(s), {} failed",
                report.students_restored,
                report.logs_restored,
                report.failures.len()
            );
        }
        Command::Predict => {
            let students = session.store().list_students().await?;
            let readiness = cohort_readiness(&students);
            println!("{}", serde_json::to_string_pretty(&readiness)?);
        }
        Command::ShowProfile => {
            let profile = session.profile().load();
            println!("{}", profile.display_name());
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Command::SetProfile {
            first_name,
            last_name,
            email,
            credentials,
            institution,
        } => {
            let profile = session.profile().update(|p| {
                if let Some(v) = first_name {
                    p.first_name = v;
                }
                if let Some(v) = last_name {
                    p.last_name = v;
                }
                if let Some(v) = email {
                    p.email = v;
                }
                if let Some(v) = credentials {
                    p.credentials = v;
                }
                if let Some(v) = institution {
                    p.institution = v;
                }
            })?;
            println!("saved profile for {}", profile.display_name());
        }
        Command::Recent => {
            for entry in session.recently_viewed().list() {
                println!("{}\t{} {}", entry.id, entry.first_name, entry.last_name);
            }
        }
        Command::Shell => run_shell(&session).await?,
    }

    Ok(())
}

fn write_export(out: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(out, bytes).with_context(|| format!("failed to write '{}'", out.display()))?;
    info!(path = %out.display(), bytes = bytes.len(), "export written");
    Ok(())
}

const SHELL_HELP: &str = "\
commands:
  view <student-id>                 open a student and add to recently viewed
  delete <student-id>               delete a student with logs and grades
  delete-log <log-id>               delete a clinical log
  status <status> <student-id>...   set active | at-risk | graduated
  toggle <student-id> <skill-id>    flip a skill (auto-saved after a pause)
  save                              save pending skill changes now
  undo | redo                       step through history
  key <chord>                       dispatch a shortcut, e.g. meta+shift+z
  history                           show the undo stack
  quit";

async fn run_shell(session: &InstructorSession) -> Result<()> {
    session.load_skills_ledger().await?;

    let mut save_status = session.skills().subscribe_status();
    let status_task = tokio::spawn(async move {
        while save_status.changed().await.is_ok() {
            let status = *save_status.borrow_and_update();
            info!(%status, "skills ledger");
        }
    });

    println!("{SHELL_HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, args)) = words.split_first() else {
            continue;
        };
        if command == "quit" || command == "exit" {
            break;
        }
        if let Err(err) = run_shell_command(session, command, args).await {
            println!("error: {err:#}");
        }
    }

    let report = session.save_skills_now().await;
    for failure in &report.failed {
        warn!(
            student_id = %failure.key,
            attempts = failure.failed_attempts,
            "unsaved skills on exit: {}",
            failure.error
        );
    }
    status_task.abort();
    Ok(())
}

async fn run_shell_command(
    session: &InstructorSession,
    command: &str,
    args: &[&str],
) -> Result<()> {
    match (command, args) {
        ("help", _) => println!("{SHELL_HELP}"),
        ("view", [id]) => match session.view_student(&StudentId::new(*id)).await? {
            Some(s) => println!("{}\t{}\t{}", s.id, s.full_name(), s.status),
            None => println!("no student {id}"),
        },
        ("delete", [id]) => {
            let deleted = session.delete_student(&StudentId::new(*id)).await?;
            println!("{}", if deleted { "deleted" } else { "not found" });
        }
        ("delete-log", [id]) => {
            let deleted = session.delete_clinical_log(&ClinicalLogId::new(*id)).await?;
            println!("{}", if deleted { "deleted" } else { "not found" });
        }
        ("status", [status, ids @ ..]) if !ids.is_empty() => {
            let Some(status) = StudentStatus::parse_loose(status) else {
                bail!("unknown status '{status}'");
            };
            let ids: Vec<StudentId> = ids.iter().map(|id| StudentId::new(*id)).collect();
            let changed = session.bulk_update_status(&ids, status).await?;
            println!("changed {changed} student(s)");
        }
        ("toggle", [id, skill]) => {
            let done = session.toggle_skill(&StudentId::new(*id), skill).await?;
            println!("{skill} {}", if done { "completed" } else { "cleared" });
        }
        ("save", []) => {
            let report = session.save_skills_now().await;
            println!(
                "saved {} student(s), {} failed",
                report.saved.len(),
                report.failed.len()
            );
        }
        ("undo", []) => dispatch(session, KeyEvent::parse_chord("meta+z")).await,
        ("redo", []) => dispatch(session, KeyEvent::parse_chord("meta+shift+z")).await,
        ("key", [chord]) => dispatch(session, KeyEvent::parse_chord(chord)).await,
        ("history", []) => {
            for action in session.history().undo_stack().await.iter().rev() {
                println!(
                    "{}\t{}\t{}",
                    action.created_at().format("%H:%M:%S"),
                    action.kind().label(),
                    action.description()
                );
            }
        }
        _ => bail!("unrecognized command; type `help`"),
    }
    Ok(())
}

async fn dispatch(session: &InstructorSession, event: Option<KeyEvent>) {
    let Some(event) = event else {
        println!("could not parse chord");
        return;
    };
    match session.handle_key(&event).await {
        KeyOutcome::Ignored => println!("no shortcut bound"),
        KeyOutcome::Handled(AppCommand::Undo | AppCommand::Redo) => {
            let snapshot = session.history().snapshot().await;
            println!(
                "undo: {} | redo: {}",
                snapshot.undo_depth, snapshot.redo_depth
            );
        }
        KeyOutcome::Handled(command) => println!("{command:?}"),
        KeyOutcome::Failed { message, .. } => println!("{message}"),
    }
}
