use std::sync::Arc;

use shared::domain::{ActionKind, MenuItem};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    error::{ExtractionError, ServiceError},
    remote::{MenuBackend, MenuUpload},
    session::{
        ActionState, ActionTicket, Completion, ExtractionStatus, Generation, MenuSession,
        MenuView,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ExtractionStarted,
    ExtractionFinished {
        generation: Generation,
        count: usize,
    },
    ExtractionFailed {
        message: String,
    },
    ActionUpdated {
        generation: Generation,
        index: usize,
        kind: ActionKind,
        state: ActionState,
    },
    StaleResponseDropped {
        index: usize,
        kind: ActionKind,
    },
}

/// Owns a [`MenuSession`] and runs its remote calls. The session lock is only held
/// for the synchronous bookkeeping on either side of a call, never across one.
/// Events are sent under the lock, so their order matches the order of the state
/// changes they describe.
pub struct MenuController {
    backend: Arc<dyn MenuBackend>,
    session: Mutex<MenuSession>,
    events: broadcast::Sender<SessionEvent>,
}

impl MenuController {
    pub fn new(backend: Arc<dyn MenuBackend>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            backend,
            session: Mutex::new(MenuSession::new()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Replaces the menu with the items read from `file`.
    ///
    /// Without a file nothing is sent and the current state is kept. Otherwise the
    /// item list and all action slots are cleared before the upload starts. Starting
    /// a new extraction supersedes one still running, including one whose caller
    /// went away; the older call then returns [`ExtractionError::Superseded`].
    pub async fn extract(
        &self,
        file: Option<MenuUpload>,
    ) -> Result<Vec<MenuItem>, ExtractionError> {
        let upload = file.ok_or(ExtractionError::MissingFile)?;

        let ticket = {
            let mut session = self.session.lock().await;
            if *session.extraction() == ExtractionStatus::InProgress {
                debug!("superseding running extraction");
            }
            let ticket = session.begin_extraction();
            self.emit(SessionEvent::ExtractionStarted);
            ticket
        };
        info!(filename = %upload.filename, bytes = upload.bytes.len(), "extracting menu");

        let result = self.backend.extract_menu(&upload).await;

        let mut session = self.session.lock().await;
        if session.finish_extraction(ticket, result.clone()) == Completion::Stale {
            debug!("dropping superseded extraction result");
            return Err(ExtractionError::Superseded);
        }

        match result {
            Ok(items) => {
                if items.is_empty() {
                    info!("no menu items found in image");
                } else {
                    info!(count = items.len(), "menu extracted");
                }
                self.emit(SessionEvent::ExtractionFinished {
                    generation: session.generation(),
                    count: items.len(),
                });
                Ok(items)
            }
            Err(err) => {
                warn!(error = %err, "menu extraction failed");
                self.emit(SessionEvent::ExtractionFailed {
                    message: err.message(),
                });
                Err(err.into())
            }
        }
    }

    /// Starts a search or generation for the item at `index` and returns at once.
    ///
    /// Returns `None` without doing anything when `generation` no longer matches the
    /// session or `index` is out of range. The handle resolves after the result has
    /// been applied or dropped; callers may ignore it.
    pub async fn trigger(
        self: &Arc<Self>,
        generation: Generation,
        index: usize,
        kind: ActionKind,
    ) -> Option<JoinHandle<()>> {
        let mut session = self.session.lock().await;
        let Some((ticket, item)) = session.begin_action(generation, index, kind) else {
            debug!(generation, index, %kind, "ignoring trigger for superseded item");
            return None;
        };
        self.emit(SessionEvent::ActionUpdated {
            generation,
            index,
            kind,
            state: ActionState::Pending,
        });
        drop(session);

        let controller = Arc::clone(self);
        Some(tokio::spawn(async move {
            let result = controller.run_action(kind, &item).await;
            controller.complete(ticket, result).await;
        }))
    }

    async fn run_action(&self, kind: ActionKind, item: &MenuItem) -> Result<String, ServiceError> {
        match kind {
            ActionKind::Search => self.backend.search_image(&item.search_query()).await,
            ActionKind::Generate => {
                self.backend
                    .generate_image(&item.generation_prompt())
                    .await
            }
        }
    }

    async fn complete(&self, ticket: ActionTicket, result: Result<String, ServiceError>) {
        let mut session = self.session.lock().await;
        match session.complete_action(ticket, result) {
            Completion::Applied => {
                let state = session.get(ticket.index, ticket.kind);
                if let Some(message) = state.error() {
                    warn!(index = ticket.index, kind = %ticket.kind, %message, "action failed");
                }
                self.emit(SessionEvent::ActionUpdated {
                    generation: ticket.generation,
                    index: ticket.index,
                    kind: ticket.kind,
                    state,
                });
            }
            Completion::Stale => {
                debug!(index = ticket.index, kind = %ticket.kind, "dropping stale response");
                self.emit(SessionEvent::StaleResponseDropped {
                    index: ticket.index,
                    kind: ticket.kind,
                });
            }
        }
    }

    pub async fn get(&self, index: usize, kind: ActionKind) -> ActionState {
        self.session.lock().await.get(index, kind)
    }

    /// Clears every action slot; responses still in flight will be dropped.
    pub async fn reset(&self) {
        self.session.lock().await.reset();
    }

    pub async fn generation(&self) -> Generation {
        self.session.lock().await.generation()
    }

    pub async fn view(&self) -> MenuView {
        self.session.lock().await.view()
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
