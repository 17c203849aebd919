use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sitepush::config::{Credentials, SitepushConfig};
use sitepush::publish::{document, Provider, Providers};
use sitepush::scheduler::{record::parse_timestamp, NewSchedule, Runner, ScheduleStore};

#[derive(Parser)]
#[command(
    name = "sitepush",
    about = "Publish visual designs as static sites to Vercel or Netlify, now or on a schedule",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a sitepush.toml (overrides SITEPUSH_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (API server + schedule runner)
    Serve {
        /// Bind address (defaults to server.bind from the config)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Print the static document built from markup and stylesheet files
    Build {
        #[arg(long)]
        html: Option<PathBuf>,

        #[arg(long)]
        css: Option<PathBuf>,
    },

    /// Deploy immediately, bypassing the scheduler
    Deploy {
        /// Target provider: vercel or netlify
        provider: Provider,

        /// Deployment / site name
        #[arg(long)]
        name: String,

        #[arg(long)]
        html: Option<PathBuf>,

        #[arg(long)]
        css: Option<PathBuf>,
    },

    /// Manage scheduled deploys
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },
}

#[derive(Subcommand)]
enum ScheduleAction {
    /// Schedule a deploy of the given content
    Add {
        /// Owning project ID
        #[arg(long)]
        project: String,

        /// Target provider: vercel or netlify
        #[arg(long)]
        provider: Provider,

        /// Deployment / site name
        #[arg(long)]
        name: String,

        /// When to deploy (ISO-8601)
        #[arg(long)]
        at: String,

        #[arg(long)]
        html: Option<PathBuf>,

        #[arg(long)]
        css: Option<PathBuf>,
    },

    /// List a project's schedules, newest first
    List {
        #[arg(long)]
        project: String,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Execute one batch of due schedules and exit
    RunDue,
}

fn read_optional(path: Option<&Path>) -> Result<String> {
    match path {
        Some(p) => std::fs::read_to_string(p).with_context(|| format!("failed to read {}", p.display())),
        None => Ok(String::new()),
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SitepushConfig::load(path)?,
        None => SitepushConfig::load_or_default(),
    };
    init_tracing(config.logging.json);

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            tracing::info!(bind = %config.server.bind, "Starting sitepush daemon");
            sitepush::serve(config, Credentials::from_env()).await?;
        }
        Commands::Build { html, css } => {
            let html = read_optional(html.as_deref())?;
            let css = read_optional(css.as_deref())?;
            println!("{}", document::build(&html, &css));
        }
        Commands::Deploy { provider, name, html, css } => {
            let html = read_optional(html.as_deref())?;
            let css = read_optional(css.as_deref())?;
            let providers = Providers::from_config(&config.providers, &Credentials::from_env())?;

            tracing::info!(%provider, %name, "Deploying");
            let result = providers.get(provider)?.deploy(&name, &html, &css).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Schedule { action } => {
            let pool = sitepush::storage::open_pool(&config.server.database)?;
            let store = ScheduleStore::new(pool);

            match action {
                ScheduleAction::Add { project, provider, name, at, html, css } => {
                    let record = store
                        .create(NewSchedule {
                            project_id: project,
                            provider,
                            name,
                            html: read_optional(html.as_deref())?,
                            css: read_optional(css.as_deref())?,
                            scheduled_at: parse_timestamp(&at)?,
                        })
                        .await?;
                    println!("Schedule '{}' created for {}.", record.id, record.scheduled_at.to_rfc3339());
                }
                ScheduleAction::List { project, json } => {
                    let list = store.list_for_project(&project).await?;
                    if json {
                        println!("{}", serde_json::to_string_pretty(&list)?);
                    } else if list.is_empty() {
                        println!("No schedules found.");
                    } else {
                        println!("{:<36} | {:<8} | {:<25} | {:<9} | Result", "ID", "Provider", "Scheduled", "Status");
                        println!("{:-<36}-|-{:-<8}-|-{:-<25}-|-{:-<9}-|-{:-<30}", "", "", "", "", "");
                        for r in list {
                            let outcome = r.result_url.or(r.error_message).unwrap_or_default();
                            println!(
                                "{:<36} | {:<8} | {:<25} | {:<9} | {}",
                                r.id,
                                r.provider,
                                r.scheduled_at.to_rfc3339(),
                                r.status,
                                outcome
                            );
                        }
                    }
                }
                ScheduleAction::RunDue => {
                    let providers = Providers::from_config(&config.providers, &Credentials::from_env())?;
                    let runner = Runner::new(store, providers).with_batch_size(config.runner.batch_size);
                    let summary = runner.run_due().await?;
                    println!(
                        "selected={} completed={} failed={} skipped={}",
                        summary.selected, summary.completed, summary.failed, summary.skipped
                    );
                }
            }
        }
    }

    Ok(())
}
