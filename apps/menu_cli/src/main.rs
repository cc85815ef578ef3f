use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    ActionKind, ActionState, HttpMenuBackend, MenuController, MenuUpload,
    MenuView, SessionEvent,
};
use futures::future::join_all;
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tracing::warn;
use tracing_subscriber::EnvFilter;

const EVENT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Reads a menu photo through the menu server, then finds or generates pictures
/// for the chosen items.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    server_url: String,
    /// Menu photo to upload.
    #[arg(long)]
    file: Option<PathBuf>,
    /// Item indices to search the web for. Repeatable.
    #[arg(long)]
    find: Vec<usize>,
    /// Item indices to generate an image for. Repeatable.
    #[arg(long)]
    generate: Vec<usize>,
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let backend = HttpMenuBackend::with_timeout(
        args.server_url.clone(),
        Duration::from_secs(args.timeout_secs),
    )?;
    let controller = MenuController::new(Arc::new(backend));

    let printer = spawn_printer(controller.subscribe_events(), print_event);

    let upload = match &args.file {
        Some(path) => Some(read_upload(path).await?),
        None => None,
    };
    let items = controller.extract(upload).await?;
    if items.is_empty() {
        println!("No menu items found.");
    }
    for (index, item) in items.iter().enumerate() {
        println!("[{index}] {} - {}", item.title, item.description);
    }

    let generation = controller.generation().await;
    let mut handles = Vec::new();
    let requested = args
        .find
        .iter()
        .map(|&index| (index, ActionKind::Search))
        .chain(args.generate.iter().map(|&index| (index, ActionKind::Generate)));
    for (index, kind) in requested {
        match controller.trigger(generation, index, kind).await {
            Some(handle) => handles.push(handle),
            None => warn!(index, %kind, "no such menu item"),
        }
    }
    for joined in join_all(handles).await {
        if let Err(err) = joined {
            warn!(error = %err, "action task ended abnormally");
        }
    }

    let view = controller.view().await;
    drop(controller);
    drain(printer).await;
    print_view(&view);
    Ok(())
}

/// Forwards session events to `sink` until every sender is gone.
fn spawn_printer(
    events: broadcast::Receiver<SessionEvent>,
    mut sink: impl FnMut(&SessionEvent) + Send + 'static,
) -> JoinHandle<()> {
    let mut events = BroadcastStream::new(events);
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => sink(&event),
                Err(err) => warn!(error = %err, "event stream lagged"),
            }
        }
    })
}

/// Waits for the printer to flush what is still queued. The controller must have
/// been dropped first or the stream never ends.
async fn drain(printer: JoinHandle<()>) {
    if tokio::time::timeout(EVENT_DRAIN_TIMEOUT, printer)
        .await
        .is_err()
    {
        warn!("event printer did not finish in time");
    }
}

async fn read_upload(path: &PathBuf) -> Result<MenuUpload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("menu.jpg")
        .to_string();
    let mime_type = mime_guess::from_path(path).first_raw().map(str::to_string);
    Ok(MenuUpload {
        filename,
        mime_type,
        bytes,
    })
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::ExtractionStarted => println!("Reading menu..."),
        SessionEvent::ExtractionFinished { count, .. } => println!("Found {count} item(s)."),
        SessionEvent::ExtractionFailed { message } => println!("Extraction failed: {message}"),
        SessionEvent::ActionUpdated {
            index, kind, state, ..
        } => println!("[{index}] {kind}: {}", describe(state)),
        SessionEvent::StaleResponseDropped { index, kind } => {
            println!("[{index}] {kind}: discarded an outdated response")
        }
    }
}

fn print_view(view: &MenuView) {
    for item in &view.items {
        println!("[{}] {}", item.index, item.item.title);
        for kind in ActionKind::ALL {
            let state = item.state(kind);
            if *state != ActionState::Idle {
                println!("    {kind}: {}", describe(state));
            }
        }
    }
}

fn describe(state: &ActionState) -> String {
    match state {
        ActionState::Idle => "idle".to_string(),
        ActionState::Pending => "pending".to_string(),
        ActionState::Resolved { url } => url.clone(),
        ActionState::Failed { message } => format!("error: {message}"),
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
