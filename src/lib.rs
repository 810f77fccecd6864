//! mkproj: scaffold new project trees from a language catalog.
//!
//! A catalog (an SQLite file under the configuration directory) lists the
//! supported languages and, per language, the folders to create, the empty
//! files to touch and the template files to copy. `mkproj new <NAME> <LANG>`
//! looks the language up, plans those operations and applies them under
//! `<NAME>`.
//!
//! # Commands
//!
//! ```bash
//! mkproj new demo py            # scaffold ./demo for language "py"
//! mkproj new demo py --dry-run  # print the plan, write nothing
//! mkproj ls                     # supported languages
//! mkproj show py                # folders, files and templates for "py"
//! mkproj catalog init           # create an empty catalog schema
//! ```
//!
//! # Exit codes
//!
//! Every `new` run ends in exactly one outcome, see
//! [`core::error::ResultKind::exit_code`]. Configuration and usage problems
//! exit with [`core::error::EXIT_USAGE`].
//!
//! # Crate Structure
//!
//! - [`core`]: catalog access, resolution, planning and the executor

pub mod core;

use core::{
    broker::CatalogBroker,
    config::{self, ScaffoldConfig},
    db,
    error::{EXIT_USAGE, ResultKind, ScaffoldError},
    output::{Envelope, OutputFormat, supported_languages_line},
    plan::ScaffoldPlan,
    scaffold::{self, ScaffoldOptions, ScaffoldReport, ScaffoldRequest, Scaffolder},
};

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

pub const MKPROJ_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[clap(
    name = "mkproj",
    version = env!("CARGO_PKG_VERSION"),
    about = "Scaffold a new project tree for a language"
)]
struct Cli {
    /// Configuration directory holding the catalog and templates.
    #[clap(long, global = true)]
    config_dir: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct NewCli {
    /// Name (path) of the project directory to create. Must not exist yet.
    name: String,
    /// Language short name as listed by `mkproj ls` (case-sensitive).
    language: String,
    /// Resolve and print the plan without touching the filesystem.
    #[clap(long)]
    dry_run: bool,
    /// Remove the project directory again if any step fails.
    #[clap(long)]
    cleanup_on_failure: bool,
    /// Output format: 'text' or 'json'.
    #[clap(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(clap::Args, Debug)]
struct CatalogCli {
    #[clap(subcommand)]
    command: CatalogCommand,
}

#[derive(Subcommand, Debug)]
enum CatalogCommand {
    /// Create the catalog tables (idempotent)
    Init,
    /// Print the resolved configuration directory and catalog path
    Path,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scaffold a new project
    New(NewCli),
    /// List supported languages
    Ls {
        #[clap(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Show the folders, files and templates a language scaffolds
    Show {
        language: String,
        #[clap(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Catalog maintenance
    Catalog(CatalogCli),
    /// Print version
    Version,
}

pub fn run() -> Result<(), ScaffoldError> {
    // clap exits 2 on usage errors, which is taken by StoreUnavailable.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            e.print().map_err(ScaffoldError::IoError)?;
            std::process::exit(EXIT_USAGE);
        }
    };

    if matches!(cli.command, Command::Version) {
        println!("v{}", MKPROJ_VERSION);
        return Ok(());
    }

    let config_dir = config::resolve_config_dir(cli.config_dir)?;
    let config = ScaffoldConfig::load(&config_dir)?;
    let broker = if config.config_dir.is_dir() {
        CatalogBroker::new(config.audit_log_path())
    } else {
        CatalogBroker::unaudited()
    };

    match cli.command {
        Command::New(args) => cmd_new(&config, &broker, args),
        Command::Ls { format } => cmd_ls(&config, &broker, format),
        Command::Show { language, format } => cmd_show(&config, &broker, &language, format),
        Command::Catalog(catalog_cli) => match catalog_cli.command {
            CatalogCommand::Init => {
                db::initialize_catalog(&config.catalog_path)?;
                println!(
                    "{} Catalog initialized at {}",
                    "✓".bright_green(),
                    config.catalog_path.display()
                );
                Ok(())
            }
            CatalogCommand::Path => {
                println!("config_dir: {}", config.config_dir.display());
                println!("catalog:    {}", config.catalog_path.display());
                Ok(())
            }
        },
        Command::Version => Ok(()),
    }
}

fn cmd_new(
    config: &ScaffoldConfig,
    broker: &CatalogBroker,
    args: NewCli,
) -> Result<(), ScaffoldError> {
    let request = ScaffoldRequest::new(args.name, args.language)?;
    let opts = ScaffoldOptions {
        dry_run: args.dry_run,
        cleanup_on_failure: args.cleanup_on_failure,
        progress: args.format == OutputFormat::Text && !args.dry_run,
    };

    let outcome = Scaffolder::new(config, broker).run(&request, &opts);

    if !args.dry_run {
        let kind = match &outcome {
            Ok(_) => Some(ResultKind::Success),
            Err(e) => e.kind(),
        };
        if let Err(e) = broker.record_run(request.project_name(), request.language_token(), kind)
        {
            eprintln!("{} could not record run: {}", "warning:".bright_yellow(), e);
        }
    }

    match args.format {
        OutputFormat::Text => {
            if let Ok(report) = &outcome {
                print_report_text(report);
            }
        }
        OutputFormat::Json => {
            let body = match &outcome {
                Ok(report) => serde_json::json!({
                    "result": ResultKind::Success.as_str(),
                    "report": report,
                }),
                Err(e) => error_body(e),
            };
            let status = if outcome.is_ok() { "ok" } else { "error" };
            println!("{}", Envelope::new("new", status, body).render());
        }
    }

    outcome.map(|_| ())
}

fn cmd_ls(
    config: &ScaffoldConfig,
    broker: &CatalogBroker,
    format: OutputFormat,
) -> Result<(), ScaffoldError> {
    let languages = broker.with_catalog(&config.catalog_path, "catalog.list", |catalog| {
        catalog.language_names()
    })?;

    match format {
        OutputFormat::Text => {
            if languages.is_empty() {
                println!("No languages in catalog {}", config.catalog_path.display());
                return Ok(());
            }
            let width = languages
                .iter()
                .map(|(s, _)| s.len())
                .max()
                .unwrap_or(0)
                .max("LABEL".len());
            let header = format!("{:<width$}  NAME", "LABEL", width = width);
            println!("{}", header.bold());
            for (short, name) in &languages {
                println!("{:<width$}  {}", short, name, width = width);
            }
        }
        OutputFormat::Json => {
            let items: Vec<_> = languages
                .iter()
                .map(|(short, name)| serde_json::json!({ "short_name": short, "name": name }))
                .collect();
            let body = serde_json::json!({ "languages": items });
            println!("{}", Envelope::new("ls", "ok", body).render());
        }
    }
    Ok(())
}

fn cmd_show(
    config: &ScaffoldConfig,
    broker: &CatalogBroker,
    language: &str,
    format: OutputFormat,
) -> Result<(), ScaffoldError> {
    let (language_id, plan) = scaffold::load_plan(broker, &config.catalog_path, language)?;

    match format {
        OutputFormat::Text => {
            println!("Language: {} (id {})", language.bright_white().bold(), language_id);
            print_plan(&plan);
        }
        OutputFormat::Json => {
            let body = serde_json::json!({
                "language": language,
                "language_id": language_id,
                "plan": plan,
            });
            println!("{}", Envelope::new("show", "ok", body).render());
        }
    }
    Ok(())
}

fn print_plan(plan: &ScaffoldPlan) {
    if plan.is_empty() {
        println!("  (nothing beyond the project folder)");
        return;
    }
    println!("{}", "FOLDERS".bold());
    for folder in &plan.folders {
        println!("  {}/", folder);
    }
    println!("{}", "FILES".bold());
    for file in &plan.plain_files {
        println!("  {}", file);
    }
    println!("{}", "TEMPLATES".bold());
    for t in &plan.templates {
        println!("  {} <- {}", t.dest, t.src);
    }
}

fn print_report_text(report: &ScaffoldReport) {
    if report.dry_run {
        println!(
            "Dry run: would scaffold {} for {}",
            report.project_root.display().to_string().bright_white().bold(),
            report.language
        );
        print_plan(&report.plan);
        return;
    }
    println!(
        "{} Created {} ({}): {} folders, {} files, {} templates",
        "✓".bright_green(),
        report.project_root.display().to_string().bright_white().bold(),
        report.language,
        report.plan.folders.len(),
        report.plan.plain_files.len(),
        report.plan.templates.len()
    );
}

fn error_body(e: &ScaffoldError) -> serde_json::Value {
    let result = e.kind().map(|k| k.as_str()).unwrap_or("internal_error");
    let mut body = serde_json::json!({
        "result": result,
        "error": e.to_string(),
    });
    if let ScaffoldError::LanguageUnsupported { supported, .. } = e {
        body["supported"] = serde_json::json!(supported);
    }
    body
}

/// Print a failure for humans on stderr.
pub fn report_error(e: &ScaffoldError) {
    let label = e.kind().map(|k| k.as_str()).unwrap_or("error");
    eprintln!("{} [{}] {}", "✗".bright_red(), label, e);
    if let ScaffoldError::LanguageUnsupported { supported, .. } = e {
        eprintln!("  You have to specify a supported language.");
        eprintln!(
            "  Currently supported languages: {}",
            supported_languages_line(supported)
        );
    }
}

/// Exit code for a finished `run()`.
pub fn exit_code(result: &Result<(), ScaffoldError>) -> i32 {
    match result {
        Ok(()) => ResultKind::Success.exit_code(),
        Err(e) => e.exit_code(),
    }
}
