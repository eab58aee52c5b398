//! Classdrop CLI: upload files through a session the same way the web client does.
//!
//! Set CLASSDROP_API_URL (or API_URL) and CLASSDROP_API_TOKEN (or API_TOKEN).

use anyhow::Context;
use clap::{Parser, Subcommand};
use classdrop_api_client::{DirectUploader, GrantClient, ProcessingWatcher};
use classdrop_cli::{all_completed, init_tracing, read_source_file, render_task_line};
use classdrop_core::{resolve, AuthToken, ClientConfig, TaskStatus};
use classdrop_session::{SessionComponents, SessionConfig, SessionEvent, UploadSession};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser)]
#[command(name = "classdrop", about = "Classroom file upload client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and upload files under a role's policy
    Upload {
        /// Caller role: student, parent, educator or administrator
        #[arg(long)]
        role: String,
        /// Category recorded on every task
        #[arg(long, default_value = "general")]
        category: String,
        /// Destination folder sent with each grant request
        #[arg(long, default_value = "uploads")]
        folder: String,
        /// Print the final task list as JSON
        #[arg(long)]
        json: bool,
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show the upload policy for a role
    Policy {
        #[arg(long)]
        role: String,
    },
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

async fn upload(
    config: ClientConfig,
    role: &str,
    category: &str,
    folder: &str,
    json: bool,
    paths: Vec<PathBuf>,
) -> anyhow::Result<bool> {
    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        files.push(read_source_file(path).await?);
    }

    let components = SessionComponents {
        grants: Arc::new(GrantClient::from_config(&config).context("Failed to create API client")?),
        transfer: Arc::new(DirectUploader::from_config(&config)?),
        processing: Arc::new(
            ProcessingWatcher::from_config(&config).context("Failed to create API client")?,
        ),
    };
    let token = config
        .api_token
        .as_deref()
        .context("CLASSDROP_API_TOKEN (or API_TOKEN) is not set")?;
    let auth = AuthToken::new(token);
    let session = UploadSession::new(role, auth, components, SessionConfig::from(&config))?;

    let mut events = session.subscribe();
    let receipt = session.submit(files, category, folder);
    if let Some(error) = receipt.batch_error {
        anyhow::bail!("{}", error.message);
    }

    let mut last_status: HashMap<_, TaskStatus> = HashMap::new();
    let mut interrupted = false;
    while !session.is_all_terminal() {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SessionEvent::TaskUpdated(task)) => {
                    if last_status.insert(task.id, task.status) != Some(task.status) {
                        eprintln!("{}", render_task_line(&task));
                    } else {
                        tracing::debug!(task_id = %task.id, progress = task.progress_percent, "Upload progress");
                    }
                }
                Ok(SessionEvent::AllTerminal) => break,
                Ok(SessionEvent::BatchRejected(_)) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Dropped progress events");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                eprintln!("Interrupted, cancelling uploads");
                session.cancel_all();
            }
        }
    }
    session.wait_until_terminal().await;

    let tasks = session.snapshot();
    if json {
        print_json(&tasks)?;
    } else {
        for task in &tasks {
            println!("{}", render_task_line(task));
        }
    }
    Ok(all_completed(&tasks))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Policy { role } => {
            let policy = resolve(&role)?;
            print_json(&policy)?;
        }
        Commands::Upload {
            role,
            category,
            folder,
            json,
            files,
        } => {
            let config = ClientConfig::from_env().context(
                "Invalid configuration. Set CLASSDROP_API_URL and CLASSDROP_API_TOKEN",
            )?;
            let ok = upload(config, &role, &category, &folder, json, files).await?;
            if !ok {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
