//! Sieve - build per-app proxy lists from rule subscriptions.
//!
//! The `sieve` binary manages rule subscriptions and turns an installed
//! package list into a proxy or bypass list for third-party clients.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::builder::PossibleValuesParser;
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use sieve_app::app::{format_subscription_row, format_sync_report, AppError, SieveApp};
use sieve_app::packages::load_packages;
use sieve_app::settings::{AppSettings, SETTING_KEYS};
use sieve_core::{ExportFormat, HttpConfFetcher, RuleMode, SieveError};
use sieve_storage::Database;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Sieve - per-app proxy lists from rule subscriptions
#[derive(Parser, Debug)]
#[command(name = "sieve", version, about)]
struct Args {
    /// Database file (default: app data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Directory for downloaded subscription configs
    #[arg(long, global = true)]
    conf_dir: Option<PathBuf>,

    /// Download timeout in seconds
    #[arg(long, global = true, default_value_t = 30)]
    timeout: u64,

    /// Enable debug logging (also mirrored to stderr)
    #[arg(long, global = true)]
    debug: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download a subscription config and store it
    Add {
        /// Subscription URL (http or https)
        #[arg(value_name = "URL")]
        url: String,

        /// Name to fall back on when the server and URL do not provide one
        #[arg(long)]
        name: Option<String>,
    },

    /// List subscriptions
    List {
        /// Only show subscriptions of this mode
        #[arg(long, value_parser = parse_mode)]
        mode: Option<RuleMode>,
    },

    /// Show one subscription and its rules
    Show {
        #[arg(value_name = "ID")]
        id: i64,
    },

    /// Re-download subscriptions
    Sync {
        /// Only sync enabled subscriptions of this mode (default: every mode)
        #[arg(long, value_parser = parse_mode, conflicts_with = "id")]
        mode: Option<RuleMode>,

        /// Only sync this subscription
        #[arg(long)]
        id: Option<i64>,
    },

    /// Enable a subscription
    Enable {
        #[arg(value_name = "ID")]
        id: i64,
    },

    /// Disable a subscription
    Disable {
        #[arg(value_name = "ID")]
        id: i64,
    },

    /// Delete a subscription and the rules only it used
    Delete {
        #[arg(value_name = "ID")]
        id: i64,
    },

    /// Print the packages matched by a mode's active rules
    Filter {
        /// Package list (JSON or one package per line, `-` for stdin)
        #[arg(long, value_name = "FILE")]
        packages: PathBuf,

        /// Mode to filter by (default: settings)
        #[arg(long, value_parser = parse_mode)]
        mode: Option<RuleMode>,
    },

    /// Render the matched packages for a proxy client
    Export {
        /// Package list (JSON or one package per line, `-` for stdin)
        #[arg(long, value_name = "FILE")]
        packages: PathBuf,

        /// Mode to filter by (default: settings)
        #[arg(long, value_parser = parse_mode)]
        mode: Option<RuleMode>,

        /// surfboard, nekobox, clash-meta or flclash (default: settings)
        #[arg(long, value_parser = parse_format)]
        format: Option<ExportFormat>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show or change settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    /// Print current settings
    Show,

    /// Change one setting
    Set {
        #[arg(value_parser = PossibleValuesParser::new(SETTING_KEYS))]
        key: String,
        value: String,
    },
}

fn parse_mode(s: &str) -> std::result::Result<RuleMode, String> {
    RuleMode::parse(&s.to_lowercase()).ok_or_else(|| format!("unknown mode '{s}' (proxy or bypass)"))
}

fn parse_format(s: &str) -> std::result::Result<ExportFormat, String> {
    ExportFormat::parse(s).ok_or_else(|| {
        format!("unknown format '{s}' (surfboard, nekobox, clash-meta or flclash)")
    })
}

/// Get the logs directory path.
fn logs_dir() -> Option<PathBuf> {
    ProjectDirs::from("me", "rosuh", "sieve").map(|dirs| dirs.data_dir().join("logs"))
}

/// Initialize logging with file rotation.
fn init_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_level = if args.debug { "debug" } else { &args.log_level };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sieve={},warn", log_level)));

    if let Some(log_dir) = logs_dir() {
        if std::fs::create_dir_all(&log_dir).is_ok() {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(5)
                .filename_prefix("sieve")
                .filename_suffix("log")
                .build(&log_dir)
                .ok();

            if let Some(appender) = file_appender {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);

                if args.debug {
                    tracing_subscriber::registry()
                        .with(env_filter)
                        .with(fmt::layer().with_writer(std::io::stderr))
                        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                        .init();
                } else {
                    tracing_subscriber::registry()
                        .with(env_filter)
                        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                        .init();
                }

                tracing::debug!("Logging to {:?}", log_dir);
                return Some(guard);
            }
        }
    }

    // Console only; stdout stays reserved for command output
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::warn!("File logging unavailable, using console only");
    None
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(&args);

    let db = match &args.db {
        Some(path) => Database::with_path(path),
        None => Database::new(),
    }
    .context("Failed to open database")?;

    let conf_dir = match &args.conf_dir {
        Some(dir) => dir.clone(),
        None => Database::default_conf_dir().context("Failed to locate config directory")?,
    };

    let fetcher = HttpConfFetcher::with_timeout(Duration::from_secs(args.timeout))?;
    let app = SieveApp::new(db, Arc::new(fetcher), conf_dir);

    run(&app, args.command).await
}

async fn run(app: &SieveApp, command: Command) -> Result<()> {
    let settings = AppSettings::load(app.db()).context("Failed to load settings")?;

    match command {
        Command::Add { url, name } => {
            let added = match app.add(name.as_deref(), &url).await {
                Ok(added) => added,
                Err(AppError::Core(SieveError::InvalidUrl(_))) => {
                    bail!("Subscription check failed: '{url}' is not an http(s) URL")
                }
                Err(e) => {
                    return Err(anyhow::Error::new(e).context(format!("Failed to add subscription {url}")))
                }
            };
            let s = &added.subscription;
            println!(
                "Added #{} {} ({}, {} rules)",
                s.subscription_id,
                s.name,
                s.mode,
                added.rules.len()
            );
        }

        Command::List { mode } => {
            let now = Utc::now();
            let subscriptions = app.subscriptions(mode)?;
            if subscriptions.is_empty() {
                println!("No subscriptions");
            }
            for subscription in &subscriptions {
                println!("{}", format_subscription_row(subscription, now));
            }
        }

        Command::Show { id } => {
            let subscription = app.subscription(id)?;
            let s = &subscription.subscription;
            println!("#{} {}", s.subscription_id, s.name);
            println!("  url:       {}", s.url);
            println!("  mode:      {}", s.mode);
            println!("  enabled:   {}", s.enable);
            println!("  priority:  {}", s.priority);
            println!(
                "  last sync: {} ({})",
                s.last_sync_status.as_str(),
                sieve_core::relative_time(s.last_sync_time, Utc::now())
            );
            println!("  file:      {}", s.file_path);
            println!("  rules:     {}", subscription.rules.len());
            for rule in &subscription.rules {
                println!("    {},{}", rule.rule_type, rule.rule_value);
            }
        }

        Command::Sync { mode, id } => {
            if let Some(id) = id {
                let synced = app
                    .sync_one(id)
                    .await
                    .with_context(|| format!("Failed to sync subscription #{id}"))?;
                println!("Synced #{} ({} rules)", id, synced.rules.len());
                return Ok(());
            }

            let modes = match mode {
                Some(mode) => vec![mode],
                None => RuleMode::ALL.to_vec(),
            };
            let mut failed = 0;
            for mode in modes {
                let report = app.sync_mode(mode).await?;
                println!("{}", format_sync_report(mode, &report));
                failed += report.failed.len();
            }
            if failed > 0 {
                bail!("{failed} subscription(s) failed to sync");
            }
        }

        Command::Enable { id } => {
            app.set_enabled(id, true)?;
            println!("Enabled #{id}");
        }

        Command::Disable { id } => {
            app.set_enabled(id, false)?;
            println!("Disabled #{id}");
        }

        Command::Delete { id } => {
            app.delete(id)?;
            println!("Deleted #{id}");
        }

        Command::Filter { packages, mode } => {
            let mode = mode.unwrap_or(settings.default_mode);
            let apps = load_packages(&packages)?;
            for app_info in app.filter(&apps, mode)? {
                println!("{}", app_info.package_name);
            }
        }

        Command::Export {
            packages,
            mode,
            format,
            output,
        } => {
            let mode = mode.unwrap_or(settings.default_mode);
            let format = format.unwrap_or(settings.default_export_format);
            let apps = load_packages(&packages)?;
            let rendered = app.export(&apps, mode, format)?;

            match output {
                Some(path) => {
                    std::fs::write(&path, &rendered)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    eprintln!(
                        "Wrote {} export to {} (import in {}, {})",
                        format,
                        path.display(),
                        format.client_name(),
                        format.client_package()
                    );
                }
                None => println!("{rendered}"),
            }
        }

        Command::Settings { command } => match command {
            SettingsCommand::Show => {
                for (key, value) in settings.entries() {
                    println!("{key} = {value}");
                }
            }
            SettingsCommand::Set { key, value } => {
                let mut settings = settings;
                settings.set(&key, &value)?;
                settings.save(app.db())?;
                println!("{key} = {value}");
            }
        },
    }

    Ok(())
}
