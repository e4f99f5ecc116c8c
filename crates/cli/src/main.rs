mod commands;
mod config;
mod shell;

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use inspecta_gateway::BackendApi;
use inspecta_workflow::{ControllerOptions, InspectionController, WorkflowEvent};

use crate::config::ClientConfig;
use crate::shell::Shell;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (if present) before anything reads env vars.
    dotenvy::dotenv().ok();

    // --- Tracing ---
    // Logs go to stderr so they do not interleave with the prompt.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inspecta=info,inspecta_workflow=debug".into()),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    // --- Configuration ---
    let config = ClientConfig::from_env()?;
    tracing::info!(api_base_url = %config.api_base_url, "Loaded configuration");

    // --- Backend gateway ---
    let api = Arc::new(BackendApi::new(&config.api_base_url));
    match api.model_info().await {
        Ok(info) => tracing::info!(
            version = info.version.as_deref().unwrap_or("unknown"),
            build = info.build.as_deref().unwrap_or("-"),
            "Backend model info loaded",
        ),
        Err(e) => tracing::warn!(error = %e, "Backend model info unavailable"),
    }

    // --- Workflow ---
    let controller = InspectionController::new(
        api,
        ControllerOptions {
            confidence: config.confidence,
            debug_images: config.debug_images,
            watch_session: config.watch_session,
            ..Default::default()
        },
    );
    controller.load_reference_data().await;

    // --- Event log ---
    let mut events = controller.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event log lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // --- Interactive loop ---
    Shell::new(controller.clone()).run().await?;

    controller.stop_watching();
    tracing::info!("Bye");
    Ok(())
}

fn log_event(event: &WorkflowEvent) {
    match event {
        WorkflowEvent::StepChanged { from, to } => {
            tracing::debug!(from = %from, to = %to, "Step changed");
        }
        WorkflowEvent::ErrorRaised { message } => {
            tracing::debug!(message = %message, "Error shown");
        }
        WorkflowEvent::PhotoAnalyzed { photo_key, quality } => {
            tracing::info!(photo_key = photo_key.as_str(), ?quality, "Photo analysed");
        }
        WorkflowEvent::Aborted { reason } => {
            tracing::warn!(reason = %reason, "Inspection aborted");
        }
        WorkflowEvent::Finalized { inspection_id } => {
            tracing::info!(inspection_id = inspection_id.as_deref().unwrap_or("-"), "Inspection finalized");
        }
        WorkflowEvent::SessionReset { session_id } => {
            tracing::info!(session_id = %session_id, "Session reset");
        }
    }
}
