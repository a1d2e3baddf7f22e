use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use mole::apps::{AppRecord, ApplicationInventory, RemovalEngine, SystemTrash};
use mole::cleaner::CleanEngine;
use mole::cli::args::{AppSort, AppsAction, AuthAction, Cli, Commands, ConfigAction, OutputFormat};
use mole::cli::output;
use mole::common::config::Config;
use mole::common::format;
use mole::optimizer::MaintenanceStepRunner;
use mole::privilege::{Credential, CredentialStore, Elevator, Executor};
use mole::scanner::catalog::ReclaimPathCatalog;
use mole::scanner::ScanEngine;
use mole::signals::Signals;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let log_to_file = Config::load().map(|c| c.log_to_file).unwrap_or(false);
    let _log_guard = init_logging(cli.verbose, log_to_file);

    match cli.command {
        Commands::Scan => cmd_scan(&cli).await,
        Commands::Clean { yes } => cmd_clean(&cli, yes).await,
        Commands::Apps { ref action } => cmd_apps(&cli, action).await,
        Commands::Optimize => cmd_optimize(&cli).await,
        Commands::Auth { ref action } => cmd_auth(&cli, action),
        Commands::Config { ref action } => cmd_config(action),

        Commands::Completions { ref shell } => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            let shell = match shell {
                mole::cli::args::CompletionShell::Bash => clap_complete::Shell::Bash,
                mole::cli::args::CompletionShell::Zsh => clap_complete::Shell::Zsh,
                mole::cli::args::CompletionShell::Fish => clap_complete::Shell::Fish,
            };
            clap_complete::generate(shell, &mut cmd, "mole", &mut std::io::stdout());
            Ok(())
        }
    }
}

// ─── Setup ────────────────────────────────────────────────────────────────────

/// Console logging on `--verbose` or `RUST_LOG`, plus an optional daily file
fn init_logging(verbose: bool, to_file: bool) -> Option<WorkerGuard> {
    let console_filter = if std::env::var_os("RUST_LOG").is_some() {
        Some(EnvFilter::from_default_env())
    } else if verbose {
        Some(EnvFilter::new("mole=debug"))
    } else {
        None
    };

    let mut guard = None;
    let file_layer = if to_file && std::fs::create_dir_all(Config::logs_dir()).is_ok() {
        let appender = tracing_appender::rolling::daily(Config::logs_dir(), "mole.log");
        let (writer, worker) = tracing_appender::non_blocking(appender);
        guard = Some(worker);
        Some(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(EnvFilter::new("mole=info")),
        )
    } else {
        None
    };

    if console_filter.is_none() && file_layer.is_none() {
        return None;
    }

    let console_layer = console_filter.map(|filter| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .without_time()
            .with_filter(filter)
    });

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
    guard
}

fn show_progress(cli: &Cli) -> bool {
    !cli.quiet && matches!(cli.format, OutputFormat::Human)
}

fn elevator_for(config: &Config) -> Elevator {
    let store = CredentialStore::open(Config::credential_path(), config.persist_credential);
    Elevator::new(Executor::default(), store)
        .with_native_prompt_fallback(config.native_prompt_fallback)
}

/// Spinner mirroring the latest progress line of `signals`
struct Progress {
    bar: ProgressBar,
    follower: tokio::task::JoinHandle<()>,
}

impl Progress {
    fn follow(signals: &Signals) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));

        let mut rx = signals.subscribe_log();
        let target = bar.clone();
        let follower = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let line = rx.borrow_and_update().clone();
                target.set_message(line);
            }
        });
        Self { bar, follower }
    }

    fn finish(self) {
        self.follower.abort();
        self.bar.finish_and_clear();
    }
}

/// Run `work` with a spinner when the output is meant for a person
async fn with_progress<T>(cli: &Cli, signals: &Signals, work: impl std::future::Future<Output = T>) -> T {
    if !show_progress(cli) {
        return work.await;
    }
    let progress = Progress::follow(signals);
    let result = work.await;
    progress.finish();
    result
}

fn confirm(question: &str) -> Result<bool> {
    print!("  {} {} [y/N] ", "❓", question);
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

// ─── Scan ─────────────────────────────────────────────────────────────────────

async fn cmd_scan(cli: &Cli) -> Result<()> {
    let config = Config::load()?;
    let catalog = ReclaimPathCatalog::for_current_user(&config.extra_user_paths);
    let signals = Signals::new();
    let engine = ScanEngine::new(catalog.clone(), signals.clone())
        .with_progress_every(config.progress_every);

    let result = with_progress(cli, &signals, engine.start_scan()).await;

    match cli.format {
        OutputFormat::Human => output::print_scan_result(&result, &catalog),
        OutputFormat::Json => output::print_json(&result),
        OutputFormat::Quiet => output::print_scan_quiet(&result),
    }
    Ok(())
}

// ─── Clean ────────────────────────────────────────────────────────────────────

async fn cmd_clean(cli: &Cli, yes: bool) -> Result<()> {
    let config = Config::load()?;

    if !yes && !confirm("Clear caches and logs? This cannot be undone.")? {
        println!("  {} Cancelled", "✗".red());
        return Ok(());
    }

    let catalog = ReclaimPathCatalog::for_current_user(&config.extra_user_paths);
    let signals = Signals::new();
    let engine = CleanEngine::new(catalog, elevator_for(&config), signals.clone())
        .with_min_duration(config.min_clean_duration());

    let outcome = with_progress(cli, &signals, engine.clean()).await;

    match cli.format {
        OutputFormat::Human => output::print_clean_outcome(&outcome),
        OutputFormat::Json => output::print_json(&outcome),
        OutputFormat::Quiet => output::print_clean_quiet(&outcome),
    }
    Ok(())
}

// ─── Apps ─────────────────────────────────────────────────────────────────────

/// Single match for `name`, preferring an exact (case-insensitive) hit
fn pick_app(inventory: &ApplicationInventory, name: &str) -> Option<AppRecord> {
    let matches = inventory.find_by_name(name);
    if matches.is_empty() {
        println!("  No app found matching '{}'", name);
        return None;
    }
    if let Some(exact) = matches.iter().find(|a| a.name.eq_ignore_ascii_case(name)) {
        return Some(exact.clone());
    }
    if matches.len() > 1 {
        println!("  Multiple apps match '{}'. Be more specific:", name);
        for app in &matches {
            println!("    {} {}", "•".dimmed(), app.name);
        }
        return None;
    }
    matches.into_iter().next()
}

async fn cmd_apps(cli: &Cli, action: &AppsAction) -> Result<()> {
    let config = Config::load()?;
    let inventory = ApplicationInventory::spawn(&config.applications_dir);

    if show_progress(cli) {
        println!();
        println!("  {} Scanning applications...", "🔍");
    }
    inventory
        .scan()
        .await
        .with_context(|| format!("Failed to list {}", config.applications_dir.display()))?;

    let signals = Signals::new();
    let engine = RemovalEngine::new(
        inventory.clone(),
        Arc::new(SystemTrash),
        signals.clone(),
    )
    .with_pacing(config.removal_pacing());

    match action {
        AppsAction::List { sort } => {
            let mut apps = inventory.apps();
            match sort {
                AppSort::Name => {
                    apps.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
                }
                AppSort::Size => apps.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes)),
            }

            match cli.format {
                OutputFormat::Human => output::print_app_list(&apps),
                OutputFormat::Json => output::print_json(&apps),
                OutputFormat::Quiet => {
                    for a in &apps {
                        println!("{}  {}", a.name, a.size_bytes.map(format::format_size).unwrap_or_default());
                    }
                }
            }
            Ok(())
        }

        AppsAction::Info { name } => {
            let Some(app) = pick_app(&inventory, name) else {
                return Ok(());
            };
            let plan = engine.plan(&app).await?;
            match cli.format {
                OutputFormat::Json => output::print_json(&plan),
                _ => output::print_app_info(&app, &plan),
            }
            Ok(())
        }

        AppsAction::Remove { name, dry_run, yes } => {
            let Some(app) = pick_app(&inventory, name) else {
                return Ok(());
            };
            let plan = engine.plan(&app).await?;

            if *dry_run {
                match cli.format {
                    OutputFormat::Json => output::print_json(&plan),
                    _ => output::print_removal_plan(&plan),
                }
                return Ok(());
            }

            if !*yes {
                output::print_app_info(&app, &plan);
                let question = format!(
                    "Move '{}' and its leftover files ({}) to the Trash?",
                    app.name,
                    format::format_size(plan.total_bytes())
                );
                if !confirm(&question)? {
                    println!("  {} Cancelled", "✗".red());
                    return Ok(());
                }
            }

            let report = with_progress(cli, &signals, engine.remove(&app)).await?;
            match cli.format {
                OutputFormat::Human => output::print_uninstall_report(&report),
                OutputFormat::Json => output::print_json(&report),
                OutputFormat::Quiet => {
                    println!("{}  {}  {}", report.app_name, report.trashed.len(), format::format_size(report.bytes_freed));
                }
            }
            Ok(())
        }
    }
}

// ─── Optimize ─────────────────────────────────────────────────────────────────

async fn cmd_optimize(cli: &Cli) -> Result<()> {
    let config = Config::load()?;
    let signals = Signals::new();
    let runner = MaintenanceStepRunner::new(elevator_for(&config), signals.clone())
        .with_pacing(config.step_pacing());

    let report = with_progress(cli, &signals, runner.run()).await;

    match cli.format {
        OutputFormat::Human => output::print_maintenance_report(&report),
        OutputFormat::Json => output::print_json(&report),
        OutputFormat::Quiet => {
            let state = if report.paused { "paused" } else { "done" };
            println!("{}  {}  {}", report.steps.len(), report.failures(), state);
        }
    }
    Ok(())
}

// ─── Auth ─────────────────────────────────────────────────────────────────────

fn cmd_auth(cli: &Cli, action: &AuthAction) -> Result<()> {
    let config = Config::load()?;
    let store = CredentialStore::open(Config::credential_path(), config.persist_credential);

    match action {
        AuthAction::Login => {
            let stdin = std::io::stdin();
            if stdin.is_terminal() {
                eprint!("  Password: ");
                std::io::stderr().flush()?;
            }
            let mut line = String::new();
            stdin
                .lock()
                .read_line(&mut line)
                .context("Failed to read password from stdin")?;
            let secret = line.trim_end_matches(['\r', '\n']);
            if secret.is_empty() {
                anyhow::bail!("No password given on stdin");
            }

            store.set(Credential::new(secret));
            if config.persist_credential {
                println!("  {} Password cached at {}", "✓".green(), format::format_path(store.path()));
            } else {
                println!(
                    "  {} persist_credential is off; the password will not outlive this process",
                    "⚠".yellow()
                );
            }
            Ok(())
        }
        AuthAction::Logout => {
            store.clear();
            println!("  {} Cached password removed", "✓".green());
            Ok(())
        }
        AuthAction::Status => {
            let cached = store.is_cached();
            match cli.format {
                OutputFormat::Json => output::print_json(&serde_json::json!({
                    "cached": cached,
                    "path": store.path().display().to_string(),
                    "persist": config.persist_credential,
                })),
                OutputFormat::Quiet => println!("{}", if cached { "cached" } else { "none" }),
                OutputFormat::Human => {
                    if cached {
                        println!("  {} Password cached ({})", "🔓", format::format_path(store.path()));
                    } else {
                        println!("  {} No password cached. Run {}", "🔒", "mole auth login".cyan());
                    }
                }
            }
            Ok(())
        }
    }
}

// ─── Config ───────────────────────────────────────────────────────────────────

fn cmd_config(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init => {
            Config::init_dirs()?;
            let config = Config::default();
            config.save()?;
            println!("  {} Mole initialized at ~/.mole", "✓".green());
            println!("  Created: config.toml, logs/");
            Ok(())
        }
        ConfigAction::Show => {
            let config = Config::load()?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        ConfigAction::Reset => {
            let config = Config::default();
            config.save()?;
            println!("  {} Configuration reset to defaults", "✓".green());
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", Config::config_path().display());
            Ok(())
        }
    }
}
