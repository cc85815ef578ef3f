use super::*;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{mpsc, oneshot};

/// A backend call parked until the test answers it.
struct PendingCall {
    kind: ActionKind,
    prompt: String,
    reply: oneshot::Sender<Result<String, ServiceError>>,
}

struct PendingExtraction {
    reply: oneshot::Sender<Result<Vec<MenuItem>, ServiceError>>,
}

struct ScriptedBackend {
    extract_calls: AtomicUsize,
    extractions: mpsc::UnboundedSender<PendingExtraction>,
    calls: mpsc::UnboundedSender<PendingCall>,
}

#[async_trait]
impl MenuBackend for ScriptedBackend {
    async fn extract_menu(&self, _upload: &MenuUpload) -> Result<Vec<MenuItem>, ServiceError> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        let (reply, rx) = oneshot::channel();
        self.extractions
            .send(PendingExtraction { reply })
            .map_err(|_| ServiceError::Transport("test harness gone".into()))?;
        rx.await
            .unwrap_or_else(|_| Err(ServiceError::Transport("reply dropped".into())))
    }

    async fn search_image(&self, query: &str) -> Result<String, ServiceError> {
        self.park(ActionKind::Search, query).await
    }

    async fn generate_image(&self, prompt: &str) -> Result<String, ServiceError> {
        self.park(ActionKind::Generate, prompt).await
    }
}

impl ScriptedBackend {
    async fn park(&self, kind: ActionKind, prompt: &str) -> Result<String, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.calls
            .send(PendingCall {
                kind,
                prompt: prompt.to_string(),
                reply,
            })
            .map_err(|_| ServiceError::Transport("test harness gone".into()))?;
        rx.await
            .unwrap_or_else(|_| Err(ServiceError::Transport("reply dropped".into())))
    }
}

struct Harness {
    backend: Arc<ScriptedBackend>,
    controller: Arc<MenuController>,
    extractions: mpsc::UnboundedReceiver<PendingExtraction>,
    calls: mpsc::UnboundedReceiver<PendingCall>,
}

fn harness() -> Harness {
    let (extract_tx, extractions) = mpsc::unbounded_channel();
    let (calls_tx, calls) = mpsc::unbounded_channel();
    let backend = Arc::new(ScriptedBackend {
        extract_calls: AtomicUsize::new(0),
        extractions: extract_tx,
        calls: calls_tx,
    });
    let controller = MenuController::new(backend.clone());
    Harness {
        backend,
        controller,
        extractions,
        calls,
    }
}

fn upload() -> Option<MenuUpload> {
    Some(MenuUpload {
        filename: "menu.jpg".into(),
        mime_type: Some("image/jpeg".into()),
        bytes: vec![0xff, 0xd8],
    })
}

fn salad() -> MenuItem {
    MenuItem::new("Caesar Salad", "romaine, croutons")
}

impl Harness {
    async fn load(
        &mut self,
        result: Result<Vec<MenuItem>, ServiceError>,
    ) -> Result<Vec<MenuItem>, ExtractionError> {
        let controller = self.controller.clone();
        let extraction = tokio::spawn(async move { controller.extract(upload()).await });
        let pending = self.extractions.recv().await.expect("extraction call");
        let _ = pending.reply.send(result);
        extraction.await.expect("join")
    }

    async fn next_call(&mut self) -> PendingCall {
        self.calls.recv().await.expect("backend call")
    }
}

#[tokio::test]
async fn extraction_populates_items_with_idle_slots() {
    let mut h = harness();
    let items = h.load(Ok(vec![salad()])).await.expect("items");

    assert_eq!(items, vec![salad()]);
    let view = h.controller.view().await;
    assert_eq!(view.extraction, ExtractionStatus::Ready { count: 1 });
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].item, salad());
    assert_eq!(view.items[0].search, ActionState::Idle);
    assert_eq!(view.items[0].generate, ActionState::Idle);
}

#[tokio::test]
async fn extraction_without_file_never_calls_backend() {
    let h = harness();
    let err = h.controller.extract(None).await.expect_err("must fail");

    assert_eq!(err, ExtractionError::MissingFile);
    assert_eq!(h.backend.extract_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.controller.view().await.extraction, ExtractionStatus::Idle);
}

#[tokio::test]
async fn extraction_failure_is_reported_and_list_stays_empty() {
    let mut h = harness();
    let mut events = h.controller.subscribe_events();
    let err = h
        .load(Err(ServiceError::Remote {
            status: 500,
            message: "AI returned empty content.".into(),
        }))
        .await
        .expect_err("must fail");

    assert_eq!(err.to_string(), "AI returned empty content.");
    let view = h.controller.view().await;
    assert!(view.items.is_empty());
    assert_eq!(
        view.extraction,
        ExtractionStatus::Failed {
            message: "AI returned empty content.".into()
        }
    );
    assert_eq!(events.recv().await.expect("event"), SessionEvent::ExtractionStarted);
    assert_eq!(
        events.recv().await.expect("event"),
        SessionEvent::ExtractionFailed {
            message: "AI returned empty content.".into()
        }
    );
}

#[tokio::test]
async fn newer_extraction_supersedes_running_one() {
    let mut h = harness();
    let controller = h.controller.clone();
    let first = tokio::spawn(async move { controller.extract(upload()).await });
    let first_call = h.extractions.recv().await.expect("first extraction call");

    let controller = h.controller.clone();
    let second = tokio::spawn(async move { controller.extract(upload()).await });
    let second_call = h.extractions.recv().await.expect("second extraction call");

    let _ = second_call.reply.send(Ok(vec![salad()]));
    assert_eq!(second.await.expect("join").expect("items"), vec![salad()]);

    let _ = first_call
        .reply
        .send(Ok(vec![MenuItem::new("Tiramisu", "")]));
    assert_eq!(
        first.await.expect("join").expect_err("superseded"),
        ExtractionError::Superseded
    );

    let view = h.controller.view().await;
    assert_eq!(view.extraction, ExtractionStatus::Ready { count: 1 });
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].item, salad());
    assert_eq!(h.backend.extract_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn aborted_extraction_does_not_block_the_next_upload() {
    let mut h = harness();
    let controller = h.controller.clone();
    let first = tokio::spawn(async move { controller.extract(upload()).await });
    let _abandoned = h.extractions.recv().await.expect("extraction call");

    first.abort();
    assert!(first.await.expect_err("aborted").is_cancelled());
    assert_eq!(
        h.controller.view().await.extraction,
        ExtractionStatus::InProgress
    );

    let items = h.load(Ok(vec![salad()])).await.expect("items");
    assert_eq!(items, vec![salad()]);
    assert_eq!(
        h.controller.view().await.extraction,
        ExtractionStatus::Ready { count: 1 }
    );
}

#[tokio::test]
async fn search_moves_through_pending_to_resolved() {
    let mut h = harness();
    h.load(Ok(vec![salad()])).await.expect("items");
    let generation = h.controller.generation().await;

    let handle = h
        .controller
        .trigger(generation, 0, ActionKind::Search)
        .await
        .expect("started");
    assert_eq!(h.controller.get(0, ActionKind::Search).await, ActionState::Pending);
    assert_eq!(h.controller.get(0, ActionKind::Generate).await, ActionState::Idle);

    let call = h.next_call().await;
    assert_eq!(call.kind, ActionKind::Search);
    assert_eq!(call.prompt, "Caesar Salad");
    let _ = call.reply.send(Ok("http://x/y.jpg".into()));
    handle.await.expect("join");

    assert_eq!(
        h.controller.get(0, ActionKind::Search).await,
        ActionState::Resolved {
            url: "http://x/y.jpg".into()
        }
    );
    assert_eq!(h.controller.get(0, ActionKind::Generate).await, ActionState::Idle);
}

#[tokio::test]
async fn generate_failure_is_captured_in_slot() {
    let mut h = harness();
    h.load(Ok(vec![salad()])).await.expect("items");
    let generation = h.controller.generation().await;

    let handle = h
        .controller
        .trigger(generation, 0, ActionKind::Generate)
        .await
        .expect("started");
    let call = h.next_call().await;
    assert_eq!(call.prompt, "Caesar Salad, romaine, croutons");
    let _ = call.reply.send(Err(ServiceError::Remote {
        status: 500,
        message: "rate limited".into(),
    }));
    handle.await.expect("join");

    assert_eq!(
        h.controller.get(0, ActionKind::Generate).await,
        ActionState::Failed {
            message: "rate limited".into()
        }
    );
    assert_eq!(h.controller.get(0, ActionKind::Search).await, ActionState::Idle);
}

#[tokio::test]
async fn reset_while_pending_drops_the_late_response() {
    let mut h = harness();
    h.load(Ok(vec![salad()])).await.expect("items");
    let mut events = h.controller.subscribe_events();
    let generation = h.controller.generation().await;

    let handle = h
        .controller
        .trigger(generation, 0, ActionKind::Search)
        .await
        .expect("started");
    let call = h.next_call().await;

    h.controller.reset().await;
    let _ = call.reply.send(Ok("http://stale/y.jpg".into()));
    handle.await.expect("join");

    assert_eq!(h.controller.get(0, ActionKind::Search).await, ActionState::Idle);
    assert!(h
        .controller
        .trigger(generation, 0, ActionKind::Search)
        .await
        .is_none());

    let mut saw_drop = false;
    while let Ok(event) = events.try_recv() {
        if event
            == (SessionEvent::StaleResponseDropped {
                index: 0,
                kind: ActionKind::Search,
            })
        {
            saw_drop = true;
        }
    }
    assert!(saw_drop);
}

#[tokio::test]
async fn reupload_discards_results_from_previous_menu() {
    let mut h = harness();
    h.load(Ok(vec![salad(), MenuItem::new("Tiramisu", "")]))
        .await
        .expect("items");
    let generation = h.controller.generation().await;
    let handle = h
        .controller
        .trigger(generation, 1, ActionKind::Generate)
        .await
        .expect("started");
    let call = h.next_call().await;

    let new_items = vec![MenuItem::new("Pho", "beef broth"), salad()];
    h.load(Ok(new_items.clone())).await.expect("items");
    let _ = call.reply.send(Ok("http://old/tiramisu.png".into()));
    handle.await.expect("join");

    let view = h.controller.view().await;
    assert_ne!(view.generation, generation);
    assert_eq!(
        view.items.iter().map(|v| v.item.clone()).collect::<Vec<_>>(),
        new_items
    );
    assert!(view
        .items
        .iter()
        .all(|v| v.search == ActionState::Idle && v.generate == ActionState::Idle));
}

#[tokio::test]
async fn double_trigger_keeps_the_later_request() {
    let mut h = harness();
    h.load(Ok(vec![salad()])).await.expect("items");
    let generation = h.controller.generation().await;

    let first = h
        .controller
        .trigger(generation, 0, ActionKind::Search)
        .await
        .expect("first");
    let first_call = h.next_call().await;
    let second = h
        .controller
        .trigger(generation, 0, ActionKind::Search)
        .await
        .expect("second");
    let second_call = h.next_call().await;

    let _ = second_call.reply.send(Ok("http://second.jpg".into()));
    second.await.expect("join");
    let _ = first_call.reply.send(Ok("http://first.jpg".into()));
    first.await.expect("join");

    assert_eq!(
        h.controller.get(0, ActionKind::Search).await.url(),
        Some("http://second.jpg")
    );
}

#[tokio::test]
async fn failures_do_not_touch_other_items() {
    let mut h = harness();
    h.load(Ok(vec![salad(), MenuItem::new("Tiramisu", "")]))
        .await
        .expect("items");
    let generation = h.controller.generation().await;

    let ok = h
        .controller
        .trigger(generation, 1, ActionKind::Generate)
        .await
        .expect("started");
    let ok_call = h.next_call().await;
    let _ = ok_call.reply.send(Ok("http://gen/tiramisu.png".into()));
    ok.await.expect("join");

    let bad = h
        .controller
        .trigger(generation, 0, ActionKind::Search)
        .await
        .expect("started");
    let bad_call = h.next_call().await;
    let _ = bad_call.reply.send(Err(ServiceError::Remote {
        status: 404,
        message: "No image found for this item.".into(),
    }));
    bad.await.expect("join");

    let view = h.controller.view().await;
    assert_eq!(
        view.items[0].search.error(),
        Some("No image found for this item.")
    );
    assert_eq!(view.items[0].generate, ActionState::Idle);
    assert_eq!(view.items[1].search, ActionState::Idle);
    assert_eq!(view.items[1].generate.url(), Some("http://gen/tiramisu.png"));
}

#[tokio::test]
async fn out_of_range_trigger_is_ignored() {
    let mut h = harness();
    h.load(Ok(vec![salad()])).await.expect("items");
    let generation = h.controller.generation().await;

    assert!(h
        .controller
        .trigger(generation, 3, ActionKind::Search)
        .await
        .is_none());
    assert!(h.calls.try_recv().is_err());
}

#[tokio::test]
async fn events_follow_the_order_of_state_changes() {
    let mut h = harness();
    let mut events = h.controller.subscribe_events();
    h.load(Ok(vec![salad()])).await.expect("items");
    let generation = h.controller.generation().await;

    let handle = h
        .controller
        .trigger(generation, 0, ActionKind::Search)
        .await
        .expect("started");
    let call = h.next_call().await;
    let _ = call.reply.send(Ok("http://x/y.jpg".into()));
    handle.await.expect("join");

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert_eq!(
        received,
        vec![
            SessionEvent::ExtractionStarted,
            SessionEvent::ExtractionFinished {
                generation,
                count: 1
            },
            SessionEvent::ActionUpdated {
                generation,
                index: 0,
                kind: ActionKind::Search,
                state: ActionState::Pending,
            },
            SessionEvent::ActionUpdated {
                generation,
                index: 0,
                kind: ActionKind::Search,
                state: ActionState::Resolved {
                    url: "http://x/y.jpg".into()
                },
            },
        ]
    );
}
