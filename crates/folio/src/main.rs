//! # folio
//!
//! Render service binary. Loads settings, initializes logging, wires the
//! Chrome engine and the AWS adapters into the pipeline, then either handles
//! one event (`invoke`) or serves HTTP (`serve`).

#![deny(unsafe_code)]

mod invoke;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use folio_aws::{CredentialsProvider, S3ObjectStore, SnsChannel};
use folio_browser::{BrowserOptions, CdpEngine};
use folio_core::context::{InvocationContext, LogLocators};
use folio_core::ids::InvocationId;
use folio_runtime::{Orchestrator, PipelineOptions};
use folio_settings::{FolioSettings, InvocationSettings};

/// Render web content to PDF or HTML and publish it to S3.
#[derive(Parser, Debug)]
#[command(name = "folio", version, about)]
struct Cli {
    /// Settings file (overrides `FOLIO_SETTINGS_PATH`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Handle one event and print the response.
    Invoke {
        /// Event file (`{"body": ...}`); stdin when omitted.
        #[arg(long)]
        event: Option<PathBuf>,

        /// Invocation id; generated when omitted.
        #[arg(long)]
        request_id: Option<String>,
    },
    /// Serve the pipeline over HTTP.
    Serve {
        /// Host to bind (overrides settings).
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides settings).
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => folio_settings::load_settings_from_path(path),
        None => folio_settings::load_settings(),
    }
    .context("failed to load settings")?;

    folio_core::logging::init_subscriber(&settings.logging.level, settings.logging.format);
    tracing::debug!(?settings, "settings loaded");

    let orchestrator = build_orchestrator(&settings);

    match cli.command {
        Command::Invoke { event, request_id } => {
            let event = invoke::read_event(event.as_deref()).await?;
            let id = request_id.map_or_else(InvocationId::new, InvocationId::from_string);
            let context = invocation_context(&settings.invocation, id);
            let _ = invoke::run(&orchestrator, &event, context, &mut std::io::stdout()).await?;
        }
        Command::Serve { host, port } => {
            let host = host.unwrap_or_else(|| settings.server.host.clone());
            let port = port.unwrap_or(settings.server.port);
            let state = server::AppState::new(orchestrator, settings.invocation.clone());
            server::serve(state, &host, port).await?;
        }
    }
    Ok(())
}

/// Wire the engine and AWS adapters into an orchestrator.
fn build_orchestrator(settings: &FolioSettings) -> Orchestrator {
    let browser = &settings.browser;
    let engine = CdpEngine::new(BrowserOptions {
        chrome_path: browser.chrome_path.as_ref().map(PathBuf::from),
        extra_args: browser.extra_args.clone(),
        dumpio: browser.dumpio,
        launch_timeout: browser.launch_timeout(),
    });

    let aws = &settings.aws;
    let credentials = CredentialsProvider::Environment;
    let store = S3ObjectStore::new(credentials.clone())
        .with_endpoint(aws.endpoint_url.clone())
        .with_request_credentials(aws.use_request_credentials);
    let channel = SnsChannel::new(credentials).with_endpoint(aws.endpoint_url.clone());
    if aws.alert_topic_arn.is_none() {
        tracing::info!("no alert topic configured; server errors will not be alerted");
    }

    Orchestrator::new(
        Arc::new(engine),
        Arc::new(store),
        Arc::new(channel),
        PipelineOptions {
            ignore_https_errors: browser.ignore_https_errors,
            alert_topic: aws.alert_topic_arn.clone(),
        },
    )
}

/// Context for one invocation, its time budget starting now.
fn invocation_context(settings: &InvocationSettings, id: InvocationId) -> InvocationContext {
    InvocationContext::new(
        id,
        settings.function_name.clone(),
        settings.time_budget(),
        LogLocators {
            group: settings.log_group_name.clone(),
            stream: settings.log_stream_name.clone(),
        },
    )
}
