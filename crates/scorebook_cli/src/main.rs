//! Command line front end for scorebook project files.
//!
//! # Responsibility
//! - Create a project file of blank sheets.
//! - List every displayable sheet stub of a project with its progress.
//! - Apply an optional JSON config: logging, book defaults, edit and view.

use clap::{Parser, Subcommand};
use log::error;
use scorebook_core::{core_version, init_logging, CoreConfig, SqliteBook, ViewParameters};
use std::error::Error;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "scorebook")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Create and inspect scorebook project files", long_about = None)]
struct Cli {
    /// JSON config file; built-in defaults when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a project file holding blank sheets
    Create {
        /// Project file to create
        project: PathBuf,

        /// Number of sheets in the book
        sheet_count: u32,

        /// Book name used in stub ids; defaults to the file stem
        #[arg(long)]
        radix: Option<String>,
    },

    /// List the sheet stubs of a project file
    List {
        /// Project file to open
        project: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut out = io::stdout().lock();
    match run(cli, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("scorebook: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, out: &mut dyn Write) -> Result<(), Box<dyn Error>> {
    let config = load_config(cli.config.as_deref())?;
    if let Some(log_dir) = &config.logging.log_dir {
        init_logging(&config.logging.level, log_dir)?;
    }
    writeln!(out, "scorebook_core version={}", core_version())?;

    match cli.command {
        Commands::Create {
            project,
            sheet_count,
            radix,
        } => {
            let radix = radix.unwrap_or_else(|| radix_of(&project));
            let mut book = SqliteBook::create(&project, &radix, sheet_count, config.book)?;
            book.set_history_limit(config.edit.history_limit);
            writeln!(out, "created {} sheets={}", project.display(), book.sheet_count())?;
        }
        Commands::List { project } => {
            let mut book = SqliteBook::open(&project)?;
            book.set_history_limit(config.edit.history_limit);
            writeln!(out, "book sheets={}", book.sheet_count())?;
            for stub in book.displayable_stubs(&config.view) {
                let latest = stub.latest_step().map(|step| step.as_str()).unwrap_or("-");
                writeln!(
                    out,
                    "{} latest={} valid={}",
                    stub.id(&book),
                    latest,
                    stub.is_valid()
                )?;
            }
        }
    }
    Ok(())
}

/// Config from `path`, or defaults that show every sheet.
fn load_config(path: Option<&Path>) -> Result<CoreConfig, Box<dyn Error>> {
    match path {
        Some(path) => Ok(CoreConfig::load(path)?),
        None => Ok(CoreConfig {
            view: ViewParameters {
                invalid_sheet_display: true,
                ..ViewParameters::default()
            },
            ..CoreConfig::default()
        }),
    }
}

fn radix_of(project: &Path) -> String {
    project
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "book".to_string())
}

#[cfg(test)]
mod tests {
    use super::{load_config, radix_of, run, Cli};
    use clap::Parser;
    use scorebook_core::BookDefaults;
    use std::io::Write;
    use std::path::Path;

    fn run_to_string(args: &[&str]) -> String {
        let cli = Cli::try_parse_from(args).unwrap();
        let mut out = Vec::new();
        run(cli, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn parses_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["scorebook", "list", "a.sbk", "--config", "c.json"]).unwrap();
        assert_eq!(cli.config.as_deref(), Some(Path::new("c.json")));
        assert!(Cli::try_parse_from(["scorebook", "create", "a.sbk"]).is_err());
    }

    #[test]
    fn defaults_show_invalid_sheets() {
        let config = load_config(None).unwrap();
        assert!(config.view.invalid_sheet_display);
        assert_eq!(config.book, BookDefaults::default());
    }

    #[test]
    fn create_uses_config_book_defaults_then_lists_stubs() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("Concerto.sbk");
        let config_path = dir.path().join("config.json");
        let mut config = std::fs::File::create(&config_path).unwrap();
        write!(
            config,
            r#"{{ "book": {{ "language": "deu" }}, "edit": {{ "history_limit": 3 }} }}"#
        )
        .unwrap();

        let created = run_to_string(&[
            "scorebook",
            "create",
            project.to_str().unwrap(),
            "2",
            "--config",
            config_path.to_str().unwrap(),
        ]);
        assert!(created.contains("sheets=2"));

        let book = scorebook_core::SqliteBook::open(&project).unwrap();
        assert_eq!(book.defaults().language, "deu");
        drop(book);

        let listed = run_to_string(&["scorebook", "list", project.to_str().unwrap()]);
        let stubs: Vec<&str> = listed.lines().skip(2).collect();
        assert_eq!(stubs.len(), 2);
        assert!(stubs[0].starts_with("Concerto"));
        assert!(stubs[0].ends_with("latest=- valid=true"));
    }

    #[test]
    fn relative_log_dir_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{ "logging": { "log_dir": "logs" } }"#).unwrap();
        let cli = Cli::try_parse_from([
            "scorebook",
            "list",
            "missing.sbk",
            "--config",
            config_path.to_str().unwrap(),
        ])
        .unwrap();
        let err = run(cli, &mut Vec::new()).unwrap_err();
        assert!(err.to_string().contains("logs"));
    }

    #[test]
    fn radix_falls_back_to_file_stem() {
        assert_eq!(radix_of(Path::new("/tmp/Concerto.sbk")), "Concerto");
    }
}
