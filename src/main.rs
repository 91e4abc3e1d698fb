use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;

mod ai;
mod api;
mod config;
mod content;
mod db;
mod error;
mod models;
mod pipeline;
mod services;
mod worker;

use api::ApiState;
use config::Config;
use error::{AppError, Result};
use models::DraftRequest;
use pipeline::Engine;
use worker::{MemoryScheduleStore, ScheduleStore, SqliteScheduleStore, Worker};

#[derive(Parser)]
#[command(name = "geo-engine", version, about = "Draft generation engine for llmgeo WordPress sites")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve,
    /// Run the scheduled job loop
    Worker,
    /// Refresh a site's cached profile and media
    Analyze { site: i64 },
    /// Generate and publish one draft
    Generate {
        site: i64,
        #[arg(long)]
        topic: String,
        #[arg(long, default_value_t = 1)]
        images: u8,
        #[arg(long)]
        frequency: Option<String>,
    },
    /// Manage registered sites
    Site {
        #[command(subcommand)]
        action: SiteAction,
    },
}

#[derive(Subcommand)]
enum SiteAction {
    Add {
        #[arg(long)]
        url: String,
        #[arg(long)]
        secret: String,
    },
    List,
    Activate { id: i64 },
    Deactivate { id: i64 },
}

#[derive(Serialize)]
struct SiteRow<'a> {
    id: i64,
    site_url: &'a str,
    is_active: bool,
    created_at: String,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let engine = Engine::from_config(&config).await?;

    match cli.command {
        Command::Serve => {
            let state = ApiState::new(Arc::new(engine), config.admin_token());
            api::serve(state, config.bind).await?;
        }
        Command::Worker => {
            let store: Box<dyn ScheduleStore> = if config.worker.durable_schedule {
                Box::new(SqliteScheduleStore::new(engine.repository().clone()))
            } else {
                tracing::warn!("Schedule kept in memory; every job is due again after a restart");
                Box::new(MemoryScheduleStore::default())
            };
            if config.worker.jobs.is_empty() {
                tracing::warn!("No worker jobs configured");
            }
            Worker::new(Arc::new(engine), store, &config.worker).run().await;
        }
        Command::Analyze { site } => {
            print_json(&engine.analyze(site).await?)?;
        }
        Command::Generate {
            site,
            topic,
            images,
            frequency,
        } => {
            let request = DraftRequest {
                frequency,
                ..DraftRequest::new(topic, images)
            };
            print_json(&engine.generate_draft(site, &request).await?)?;
        }
        Command::Site { action } => {
            let repository = engine.repository();
            match action {
                SiteAction::Add { url, secret } => {
                    let id = repository.insert_site(&url, &secret).await?;
                    println!("Added site {id}");
                }
                SiteAction::List => {
                    let sites = repository.list_sites().await?;
                    let rows: Vec<SiteRow> = sites
                        .iter()
                        .map(|site| SiteRow {
                            id: site.id,
                            site_url: &site.site_url,
                            is_active: site.is_active,
                            created_at: site.created_at.to_rfc3339(),
                        })
                        .collect();
                    print_json(&rows)?;
                }
                SiteAction::Activate { id } => {
                    if !repository.set_site_active(id, true).await? {
                        return Err(AppError::SiteNotFound(id));
                    }
                    println!("Site {id} activated");
                }
                SiteAction::Deactivate { id } => {
                    if !repository.set_site_active(id, false).await? {
                        return Err(AppError::SiteNotFound(id));
                    }
                    println!("Site {id} deactivated");
                }
            }
        }
    }

    Ok(())
}
