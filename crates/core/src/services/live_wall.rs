//! Live wall session driver.
//!
//! One [`LiveWallSession`] task runs per connected display. It owns the
//! [`SlideshowState`] exclusively; timers and change notifications are
//! turned into reducer commands inside the task, and every resulting frame
//! is published through a `watch` channel. Dropping the [`LiveWallHandle`]
//! aborts the task, which cancels all timers and the feed subscription.
//!
//! Displays do not coordinate: two walls of the same event may be at
//! different positions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use photowall_common::config::LiveWallConfig;
use photowall_common::{AppError, AppResult, IdGenerator};
use photowall_db::entities::event::OrderingMode;
use photowall_db::repositories::{EventRepository, UploadRepository};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use super::change_feed::{ChangeEvent, ChangeFeedService};
use super::event::{ensure_owner, normalize_code};
use super::slideshow::{Effect, Slide, SlideshowCommand, SlideshowFrame, SlideshowState};

/// Loads the approved uploads of an event, newest first.
#[async_trait]
pub trait SlideSource: Send + Sync {
    async fn approved_slides(&self, event_id: &str) -> AppResult<Vec<Slide>>;
}

#[async_trait]
impl SlideSource for UploadRepository {
    async fn approved_slides(&self, event_id: &str) -> AppResult<Vec<Slide>> {
        Ok(self
            .find_approved_by_event(event_id)
            .await?
            .iter()
            .map(Slide::from)
            .collect())
    }
}

/// Timer settings shared by all sessions.
#[derive(Debug, Clone, Copy)]
pub struct LiveWallTiming {
    /// Quiet period before a burst of changes triggers one refetch.
    pub debounce: Duration,
    /// Pause between completing a newest-first round and re-sorting.
    pub reorder_delay: Duration,
}

impl Default for LiveWallTiming {
    fn default() -> Self {
        Self::from(&LiveWallConfig::default())
    }
}

impl From<&LiveWallConfig> for LiveWallTiming {
    fn from(config: &LiveWallConfig) -> Self {
        Self {
            debounce: Duration::from_millis(config.debounce_ms),
            reorder_delay: Duration::from_millis(config.reorder_delay_ms),
        }
    }
}

/// Per-event settings a session starts with.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub event_id: String,
    pub ordering_mode: OrderingMode,
    pub image_display_duration: i32,
}

/// Organizer message flying across the wall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WallMessage {
    pub id: String,
    pub message: String,
}

/// Something for the display to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WallUpdate {
    Frame(SlideshowFrame),
    Message(WallMessage),
}

/// Handle to a running session. Dropping it stops the session.
pub struct LiveWallHandle {
    frames: watch::Receiver<SlideshowFrame>,
    messages: mpsc::Receiver<WallMessage>,
    task: JoinHandle<()>,
    loaded: bool,
}

impl LiveWallHandle {
    /// The latest frame.
    #[must_use]
    pub fn frame(&self) -> SlideshowFrame {
        self.frames.borrow().clone()
    }

    /// Wait for the next frame or message.
    ///
    /// The first call waits for the frame of the initial load. Returns `None`
    /// once the session has ended.
    pub async fn next_update(&mut self) -> Option<WallUpdate> {
        if !self.loaded {
            self.loaded = true;
            // The channel seed is an empty state from before the load
            return match self.frames.changed().await {
                Ok(()) => Some(WallUpdate::Frame(self.frames.borrow_and_update().clone())),
                Err(_) => None,
            };
        }

        tokio::select! {
            changed = self.frames.changed() => match changed {
                Ok(()) => Some(WallUpdate::Frame(self.frames.borrow_and_update().clone())),
                Err(_) => None,
            },
            message = self.messages.recv() => message.map(WallUpdate::Message),
        }
    }
}

impl Drop for LiveWallHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Live wall session task.
pub struct LiveWallSession {
    settings: SessionSettings,
    source: Arc<dyn SlideSource>,
    changes: broadcast::Receiver<ChangeEvent>,
    frames: watch::Sender<SlideshowFrame>,
    messages: mpsc::Sender<WallMessage>,
    state: SlideshowState,
    timing: LiveWallTiming,
    debounce_at: Option<Instant>,
    tick_at: Option<Instant>,
    reorder_at: Option<Instant>,
}

impl LiveWallSession {
    /// Start a session. `changes` must be subscribed to the session's event
    /// before the call so nothing published during the first load is lost.
    pub fn spawn(
        settings: SessionSettings,
        source: Arc<dyn SlideSource>,
        changes: broadcast::Receiver<ChangeEvent>,
        timing: LiveWallTiming,
    ) -> LiveWallHandle {
        let state = SlideshowState::new(settings.ordering_mode);
        let (frames_tx, frames_rx) = watch::channel(state.frame());
        let (messages_tx, messages_rx) = mpsc::channel(32);

        let session = Self {
            settings,
            source,
            changes,
            frames: frames_tx,
            messages: messages_tx,
            state,
            timing,
            debounce_at: None,
            tick_at: None,
            reorder_at: None,
        };

        LiveWallHandle {
            frames: frames_rx,
            messages: messages_rx,
            task: tokio::spawn(session.run()),
            loaded: false,
        }
    }

    async fn run(mut self) {
        let event_id = self.settings.event_id.clone();
        debug!(event_id = %event_id, "Live wall session started");

        let slides = self.fetch().await.unwrap_or_default();
        self.state.apply(SlideshowCommand::Load(slides));
        self.reschedule_tick();
        // Always notify, an empty load still ends the wait for the first frame
        self.frames.send_replace(self.state.frame());

        loop {
            tokio::select! {
                change = self.changes.recv() => {
                    if !self.on_change(change) {
                        break;
                    }
                }
                () = sleep_until_opt(self.debounce_at) => {
                    self.debounce_at = None;
                    if let Some(slides) = self.fetch().await {
                        self.state.apply(SlideshowCommand::Refresh(slides));
                        self.reschedule_tick();
                        self.publish_frame();
                    }
                }
                () = sleep_until_opt(self.tick_at) => {
                    self.tick_at = None;
                    let effect = self.state.apply(SlideshowCommand::Advance);
                    self.publish_frame();
                    if effect == Effect::ScheduleReorder {
                        // Timer stays stopped until the reorder has run
                        self.reorder_at = Some(Instant::now() + self.timing.reorder_delay);
                    } else {
                        self.reschedule_tick();
                    }
                }
                () = sleep_until_opt(self.reorder_at) => {
                    self.reorder_at = None;
                    self.state.apply(SlideshowCommand::ReorderRound);
                    self.publish_frame();
                    self.reschedule_tick();
                }
            }
        }

        debug!(event_id = %event_id, "Live wall session ended");
    }

    /// Returns `false` when the session should end.
    fn on_change(&mut self, change: Result<ChangeEvent, broadcast::error::RecvError>) -> bool {
        match change {
            Ok(change) if change.touches_uploads() => {
                self.debounce_at = Some(Instant::now() + self.timing.debounce);
            }
            Ok(ChangeEvent::EventUpdated {
                ordering_mode,
                image_display_duration,
                ..
            }) => {
                if ordering_mode != self.state.ordering_mode() {
                    self.state
                        .apply(SlideshowCommand::SetOrderingMode(ordering_mode));
                    self.publish_frame();
                }
                if image_display_duration != self.settings.image_display_duration {
                    self.settings.image_display_duration = image_display_duration;
                    self.tick_at = None;
                    self.reschedule_tick();
                }
            }
            Ok(ChangeEvent::Broadcast { id, message, .. }) => {
                if self.messages.try_send(WallMessage { id, message }).is_err() {
                    debug!(event_id = %self.settings.event_id, "Dropped wall message");
                }
            }
            Ok(ChangeEvent::EventDeleted { .. }) | Err(broadcast::error::RecvError::Closed) => {
                return false;
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(event_id = %self.settings.event_id, missed, "Live wall lagged behind change feed");
                self.debounce_at = Some(Instant::now() + self.timing.debounce);
            }
        }
        true
    }

    async fn fetch(&self) -> Option<Vec<Slide>> {
        match self.source.approved_slides(&self.settings.event_id).await {
            Ok(slides) => Some(slides),
            Err(e) => {
                warn!(event_id = %self.settings.event_id, error = %e, "Failed to load slides");
                None
            }
        }
    }

    fn display_duration(&self) -> Duration {
        Duration::from_secs(u64::try_from(self.settings.image_display_duration.max(1)).unwrap_or(1))
    }

    /// Run the advance timer only with two or more items and never during a
    /// pending reorder. A running timer keeps its phase.
    fn reschedule_tick(&mut self) {
        if !self.state.should_advance() {
            self.tick_at = None;
        } else if self.tick_at.is_none() && self.reorder_at.is_none() {
            self.tick_at = Some(Instant::now() + self.display_duration());
        }
    }

    fn publish_frame(&self) {
        let frame = self.state.frame();
        self.frames.send_if_modified(|current| {
            if *current == frame {
                false
            } else {
                *current = frame;
                true
            }
        });
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Longest organizer broadcast message, in characters.
pub const MAX_BROADCAST_CHARS: usize = 140;

/// Opens live wall sessions by join code.
#[derive(Clone)]
pub struct LiveWallService {
    event_repo: EventRepository,
    source: Arc<dyn SlideSource>,
    feed: ChangeFeedService,
    timing: LiveWallTiming,
    id_gen: IdGenerator,
}

impl LiveWallService {
    #[must_use]
    pub fn new(
        event_repo: EventRepository,
        source: Arc<dyn SlideSource>,
        feed: ChangeFeedService,
        timing: LiveWallTiming,
    ) -> Self {
        Self {
            event_repo,
            source,
            feed,
            timing,
            id_gen: IdGenerator::new(),
        }
    }

    /// Send a message to every open wall of an owned event.
    pub async fn broadcast(
        &self,
        owner_id: &str,
        event_id: &str,
        message: &str,
    ) -> AppResult<WallMessage> {
        let message = message.trim();
        let length = message.chars().count();
        if length == 0 || length > MAX_BROADCAST_CHARS {
            return Err(AppError::Validation(format!(
                "Messages must be 1-{MAX_BROADCAST_CHARS} characters"
            )));
        }

        let event = self.event_repo.get_by_id(event_id).await?;
        ensure_owner(&event, owner_id)?;

        let wall_message = WallMessage {
            id: self.id_gen.generate(),
            message: message.to_string(),
        };
        self.feed
            .publish(ChangeEvent::Broadcast {
                event_id: event.id,
                id: wall_message.id.clone(),
                message: wall_message.message.clone(),
            })
            .await?;
        Ok(wall_message)
    }

    /// Start a session for the event with the given join code.
    pub async fn open(&self, code: &str) -> AppResult<LiveWallHandle> {
        let code = normalize_code(code);
        let event = self
            .event_repo
            .find_by_code(&code)
            .await?
            .ok_or_else(|| AppError::NotFound("Event nicht gefunden.".to_string()))?;

        let changes = self.feed.subscribe(&event.id);
        info!(event_id = %event.id, "Opening live wall");

        Ok(LiveWallSession::spawn(
            SessionSettings {
                event_id: event.id,
                ordering_mode: event.ordering_mode,
                image_display_duration: event.image_display_duration,
            },
            self.source.clone(),
            changes,
            self.timing,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::slideshow::SlotId;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSource {
        slides: Mutex<Vec<Slide>>,
        fetches: AtomicUsize,
    }

    impl FakeSource {
        fn new(slides: Vec<Slide>) -> Arc<Self> {
            Arc::new(Self {
                slides: Mutex::new(slides),
                fetches: AtomicUsize::new(0),
            })
        }

        fn set(&self, slides: Vec<Slide>) {
            if let Ok(mut current) = self.slides.lock() {
                *current = slides;
            }
        }
    }

    #[async_trait]
    impl SlideSource for FakeSource {
        async fn approved_slides(&self, _event_id: &str) -> AppResult<Vec<Slide>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.slides.lock().map(|s| s.clone()).unwrap_or_default())
        }
    }

    fn slide(id: &str, minute: u32) -> Slide {
        Slide {
            id: id.to_string(),
            url: format!("https://wall.example.com/files/EV/{id}.jpg"),
            mime_type: "image/jpeg".to_string(),
            uploader_name: None,
            caption: None,
            created_at: Utc
                .with_ymd_and_hms(2025, 6, 1, 18, minute, 0)
                .single()
                .unwrap_or_default(),
        }
    }

    fn settings(mode: OrderingMode) -> SessionSettings {
        SessionSettings {
            event_id: "ev1".to_string(),
            ordering_mode: mode,
            image_display_duration: 5,
        }
    }

    fn inserted(id: &str) -> ChangeEvent {
        ChangeEvent::UploadInserted {
            event_id: "ev1".to_string(),
            upload_id: id.to_string(),
            approved: true,
        }
    }

    async fn next_frame(handle: &mut LiveWallHandle) -> SlideshowFrame {
        loop {
            match handle.next_update().await {
                Some(WallUpdate::Frame(frame)) => return frame,
                Some(WallUpdate::Message(_)) => {}
                None => panic!("session ended"),
            }
        }
    }

    fn visible_id(frame: &SlideshowFrame) -> Option<String> {
        let slot = match frame.visible_slot {
            SlotId::A => &frame.slot_a,
            SlotId::B => &frame.slot_b,
        };
        slot.as_ref().map(|s| s.id.clone())
    }

    fn updated(mode: OrderingMode, image_display_duration: i32) -> ChangeEvent {
        ChangeEvent::EventUpdated {
            event_id: "ev1".to_string(),
            ordering_mode: mode,
            image_display_duration,
            password_changed: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_frame_shows_loaded_uploads() {
        let source = FakeSource::new(vec![slide("b", 2), slide("a", 1)]);
        let (_tx, rx) = broadcast::channel(16);
        let mut handle =
            LiveWallSession::spawn(settings(OrderingMode::Insertion), source, rx, LiveWallTiming::default());

        let frame = next_frame(&mut handle).await;
        assert!(!frame.idle);
        assert_eq!(frame.queue_length, 2);
        assert_eq!(visible_id(&frame), Some("b".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_advances_every_display_duration() {
        let source = FakeSource::new(vec![slide("c", 3), slide("b", 2), slide("a", 1)]);
        let (_tx, rx) = broadcast::channel(16);
        let mut handle =
            LiveWallSession::spawn(settings(OrderingMode::Insertion), source, rx, LiveWallTiming::default());

        let first = next_frame(&mut handle).await;
        assert_eq!(first.queue_length, 3);
        assert_eq!(first.current_index, 0);
        let start = Instant::now();

        let frame = next_frame(&mut handle).await;
        assert_eq!(frame.current_index, 1);
        assert_eq!(Instant::now() - start, Duration::from_secs(5));

        let frame = next_frame(&mut handle).await;
        assert_eq!(frame.current_index, 2);
        assert_eq!(Instant::now() - start, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_item_is_static() {
        let source = FakeSource::new(vec![slide("a", 1)]);
        let (_tx, rx) = broadcast::channel(16);
        let mut handle =
            LiveWallSession::spawn(settings(OrderingMode::Insertion), source, rx, LiveWallTiming::default());

        let frame = next_frame(&mut handle).await;
        assert_eq!(visible_id(&frame), Some("a".to_string()));

        let next = tokio::time::timeout(Duration::from_secs(60), handle.next_update()).await;
        assert!(next.is_err(), "no frame expected without new uploads");
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_bursts_are_debounced() {
        let source = FakeSource::new(vec![slide("b", 2), slide("a", 1)]);
        let (tx, rx) = broadcast::channel(16);
        let mut handle = LiveWallSession::spawn(
            settings(OrderingMode::Insertion),
            source.clone(),
            rx,
            LiveWallTiming::default(),
        );
        next_frame(&mut handle).await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        source.set(vec![slide("c", 3), slide("b", 2), slide("a", 1)]);
        let start = Instant::now();
        for _ in 0..5 {
            let _ = tx.send(inserted("c"));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let frame = next_frame(&mut handle).await;
        assert_eq!(frame.queue_length, 3);
        assert_eq!(frame.current_index, 0);
        // Last notification at 400 ms plus the 300 ms quiet period
        assert_eq!(Instant::now() - start, Duration::from_millis(700));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_newest_first_reorders_after_delay() {
        let source = FakeSource::new(vec![slide("b", 2), slide("a", 1)]);
        let (tx, rx) = broadcast::channel(16);
        let mut handle = LiveWallSession::spawn(
            settings(OrderingMode::NewestFirst),
            source.clone(),
            rx,
            LiveWallTiming::default(),
        );
        next_frame(&mut handle).await;
        let start = Instant::now();

        source.set(vec![slide("c", 3), slide("b", 2), slide("a", 1)]);
        let _ = tx.send(inserted("c"));

        // Refresh splices "c" after the current item: b, c, a
        let frame = next_frame(&mut handle).await;
        assert_eq!(frame.queue_length, 3);
        assert_eq!(visible_id(&frame), Some("b".to_string()));

        let frame = next_frame(&mut handle).await;
        assert_eq!(visible_id(&frame), Some("c".to_string()));
        let frame = next_frame(&mut handle).await;
        assert_eq!(visible_id(&frame), Some("a".to_string()));

        // Wrap completes the round
        let frame = next_frame(&mut handle).await;
        assert_eq!(frame.current_index, 0);
        assert_eq!(visible_id(&frame), Some("b".to_string()));
        assert_eq!(Instant::now() - start, Duration::from_secs(15));

        // Re-sorted newest first after the reorder delay
        let frame = next_frame(&mut handle).await;
        assert_eq!(frame.current_index, 0);
        assert_eq!(visible_id(&frame), Some("c".to_string()));
        assert_eq!(Instant::now() - start, Duration::from_millis(15_500));

        // Timer restarts after the reorder
        let frame = next_frame(&mut handle).await;
        assert_eq!(frame.current_index, 1);
        assert_eq!(Instant::now() - start, Duration::from_millis(20_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_change_restarts_timer() {
        let source = FakeSource::new(vec![slide("c", 3), slide("b", 2), slide("a", 1)]);
        let (tx, rx) = broadcast::channel(16);
        let mut handle =
            LiveWallSession::spawn(settings(OrderingMode::Insertion), source, rx, LiveWallTiming::default());
        next_frame(&mut handle).await;
        let start = Instant::now();

        tokio::time::sleep(Duration::from_secs(1)).await;
        let _ = tx.send(updated(OrderingMode::Insertion, 2));

        let frame = next_frame(&mut handle).await;
        assert_eq!(frame.current_index, 1);
        assert_eq!(Instant::now() - start, Duration::from_secs(3));

        let frame = next_frame(&mut handle).await;
        assert_eq!(frame.current_index, 2);
        assert_eq!(Instant::now() - start, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_to_newest_first_reorders_next_round() {
        let source = FakeSource::new(vec![slide("b", 2), slide("a", 1)]);
        let (tx, rx) = broadcast::channel(16);
        let mut handle = LiveWallSession::spawn(
            settings(OrderingMode::Insertion),
            source.clone(),
            rx,
            LiveWallTiming::default(),
        );
        next_frame(&mut handle).await;
        let start = Instant::now();

        let _ = tx.send(updated(OrderingMode::NewestFirst, 5));
        let frame = next_frame(&mut handle).await;
        assert_eq!(frame.ordering_mode, OrderingMode::NewestFirst);
        assert_eq!(Instant::now() - start, Duration::ZERO);

        // "c" is spliced after the current item: b, c, a
        source.set(vec![slide("c", 3), slide("b", 2), slide("a", 1)]);
        let _ = tx.send(inserted("c"));
        let frame = next_frame(&mut handle).await;
        assert_eq!(frame.queue_length, 3);

        next_frame(&mut handle).await;
        next_frame(&mut handle).await;
        let frame = next_frame(&mut handle).await;
        assert_eq!(frame.current_index, 0);
        assert_eq!(visible_id(&frame), Some("b".to_string()));
        assert_eq!(Instant::now() - start, Duration::from_secs(15));

        // Wrap schedules the reorder, newest first
        let frame = next_frame(&mut handle).await;
        assert_eq!(frame.current_index, 0);
        assert_eq!(visible_id(&frame), Some("c".to_string()));
        assert_eq!(Instant::now() - start, Duration::from_millis(15_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_broadcast_messages_are_forwarded() {
        let source = FakeSource::new(vec![]);
        let (tx, rx) = broadcast::channel(16);
        let mut handle =
            LiveWallSession::spawn(settings(OrderingMode::Insertion), source, rx, LiveWallTiming::default());
        let idle = next_frame(&mut handle).await;
        assert!(idle.idle);

        let _ = tx.send(ChangeEvent::Broadcast {
            event_id: "ev1".to_string(),
            id: "m1".to_string(),
            message: "Auf das Brautpaar!".to_string(),
        });

        let update = handle.next_update().await;
        assert_eq!(
            update,
            Some(WallUpdate::Message(WallMessage {
                id: "m1".to_string(),
                message: "Auf das Brautpaar!".to_string(),
            }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_deletion_ends_session() {
        let source = FakeSource::new(vec![slide("a", 1)]);
        let (tx, rx) = broadcast::channel(16);
        let mut handle =
            LiveWallSession::spawn(settings(OrderingMode::Insertion), source, rx, LiveWallTiming::default());
        next_frame(&mut handle).await;

        let _ = tx.send(ChangeEvent::EventDeleted {
            event_id: "ev1".to_string(),
        });

        assert_eq!(handle.next_update().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_unsubscribes() {
        let source = FakeSource::new(vec![slide("b", 2), slide("a", 1)]);
        let (tx, rx) = broadcast::channel(16);
        let mut handle =
            LiveWallSession::spawn(settings(OrderingMode::Insertion), source, rx, LiveWallTiming::default());
        next_frame(&mut handle).await;
        assert_eq!(tx.receiver_count(), 1);

        drop(handle);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(tx.receiver_count(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_validates_and_publishes() {
        use crate::services::change_feed::testing::RecordingFeed;
        use crate::services::event::tests::create_test_event;
        use sea_orm::{DatabaseBackend, MockDatabase};

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_event("ev1", "org1", "PARTY1")]])
                .into_connection(),
        );
        let feed = RecordingFeed::new();
        let service = LiveWallService::new(
            EventRepository::new(db.clone()),
            Arc::new(UploadRepository::new(db)),
            feed.clone(),
            LiveWallTiming::default(),
        );

        let too_long = "x".repeat(MAX_BROADCAST_CHARS + 1);
        assert!(matches!(
            service.broadcast("org1", "ev1", &too_long).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.broadcast("org1", "ev1", "   ").await,
            Err(AppError::Validation(_))
        ));

        let sent = service
            .broadcast("org1", "ev1", " Anstoßen um 22 Uhr! ")
            .await
            .map_err(|e| e.to_string());
        let sent = match sent {
            Ok(sent) => sent,
            Err(e) => panic!("broadcast failed: {e}"),
        };
        assert_eq!(sent.message, "Anstoßen um 22 Uhr!");
        assert_eq!(
            feed.published(),
            vec![ChangeEvent::Broadcast {
                event_id: "ev1".to_string(),
                id: sent.id,
                message: "Anstoßen um 22 Uhr!".to_string(),
            }]
        );
    }
}
