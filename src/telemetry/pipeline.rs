//! The telemetry pipeline: sampling, enrichment, batching and flushing.
//!
//! A [`Telemetry`] handle is cheap to clone and shares one queue and session.
//! Nothing here blocks on the network: sends run on spawned tasks and a failed
//! batch goes back to the front of the queue for the next trigger.

use crate::telemetry::clock::{Clock, RandomSource, SystemClock, ThreadRandom};
use crate::telemetry::config::{clamp_sample_rate, TelemetryConfig};
use crate::telemetry::context;
use crate::telemetry::environment::{Environment, StaticEnvironment};
use crate::telemetry::event::{Category, Event, Properties, SessionInfo, TrackOptions};
use crate::telemetry::instrumentation::{BrowserEvent, HostCapabilities, Instrumentation};
use crate::telemetry::queue::{Batch, EventQueue};
use crate::telemetry::session::Session;
use crate::telemetry::storage::{
    read_string_list, ClientStorage, MemoryStorage, USER_ID_KEY, USER_SEGMENTS_KEY,
    USER_TRAITS_KEY,
};
use crate::telemetry::transport::{HttpTransport, Transport, TransportError};
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Initialized,
    Destroyed,
}

/// What happened to a `track` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// Queued, waiting for the next flush
    Recorded,
    /// Queued and an eager flush was started
    FlushTriggered,
    /// Dropped by sampling
    SampledOut,
    /// Dropped because the pipeline is destroyed
    Rejected,
}

impl TrackOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, TrackOutcome::Recorded | TrackOutcome::FlushTriggered)
    }
}

struct State {
    lifecycle: Lifecycle,
    session: Session,
    queue: EventQueue,
    instrumentation: Option<Instrumentation>,
    timer: Option<JoinHandle<()>>,
}

struct Inner {
    config: TelemetryConfig,
    transport: Arc<dyn Transport>,
    storage: Arc<dyn ClientStorage>,
    clock: Arc<dyn Clock>,
    random: Arc<dyn RandomSource>,
    environment: Arc<dyn Environment>,
    state: Mutex<State>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_batch(&self) -> Batch {
        self.state().queue.take_all()
    }

    /// Send one batch, merging it back into the queue on failure.
    ///
    /// Several sends may be in flight at once. Whatever order they fail in,
    /// re-queued events end up in the order they were first tracked.
    async fn send_batch(&self, batch: Batch) -> Result<usize, TransportError> {
        let count = batch.len();
        match self.transport.send_events(batch.events()).await {
            Ok(()) => {
                debug!("Flushed {} events", count);
                Ok(count)
            }
            Err(e) => {
                warn!("Failed to flush {} events, re-queueing: {}", count, e);
                self.requeue(batch);
                Err(e)
            }
        }
    }

    fn requeue(&self, batch: Batch) {
        let dropped = self.state().queue.requeue(batch);
        if dropped > 0 {
            warn!(
                "Event buffer over {} events, dropped {} oldest",
                self.config.max_buffered_events, dropped
            );
        }
    }

    fn track_in_flight(&self, task: JoinHandle<()>) {
        let mut tasks = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    fn write_segments(&self, segments: &[String]) {
        let result = serde_json::to_string(segments)
            .map_err(|e| e.to_string())
            .and_then(|json| {
                self.storage
                    .set(USER_SEGMENTS_KEY, &json)
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = result {
            warn!("Could not persist user segments: {}", e);
        }
    }
}

/// Handle to a telemetry pipeline.
#[derive(Clone)]
pub struct Telemetry {
    inner: Arc<Inner>,
}

/// Collects the capabilities a pipeline runs against.
///
/// Anything not provided falls back to the real implementation: HTTP
/// transport from the config, in-memory storage, the system clock, thread
/// RNG and an empty static environment.
pub struct TelemetryBuilder {
    config: TelemetryConfig,
    transport: Option<Arc<dyn Transport>>,
    storage: Option<Arc<dyn ClientStorage>>,
    clock: Option<Arc<dyn Clock>>,
    random: Option<Arc<dyn RandomSource>>,
    environment: Option<Arc<dyn Environment>>,
}

impl TelemetryBuilder {
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn ClientStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = Some(random);
        self
    }

    pub fn environment(mut self, environment: Arc<dyn Environment>) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Start the session and return the handle. No instrumentation or timer
    /// runs until [`Telemetry::init`].
    pub fn build(self) -> Telemetry {
        let mut config = self.config;
        config.sample_rate = clamp_sample_rate(config.sample_rate);

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::from_config(&config)) as Arc<dyn Transport>);
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()) as Arc<dyn ClientStorage>);
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let random = self
            .random
            .unwrap_or_else(|| Arc::new(ThreadRandom) as Arc<dyn RandomSource>);
        let environment = self
            .environment
            .unwrap_or_else(|| Arc::new(StaticEnvironment::default()) as Arc<dyn Environment>);

        let session = Session::start(storage.as_ref(), clock.now_millis());
        let queue = EventQueue::new(config.max_buffered_events);

        Telemetry {
            inner: Arc::new(Inner {
                config,
                transport,
                storage,
                clock,
                random,
                environment,
                state: Mutex::new(State {
                    lifecycle: Lifecycle::Uninitialized,
                    session,
                    queue,
                    instrumentation: None,
                    timer: None,
                }),
                in_flight: Mutex::new(Vec::new()),
            }),
        }
    }
}

impl Telemetry {
    pub fn builder(config: TelemetryConfig) -> TelemetryBuilder {
        TelemetryBuilder {
            config,
            transport: None,
            storage: None,
            clock: None,
            random: None,
            environment: None,
        }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.inner.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.state().lifecycle
    }

    /// Install instrumentation and start the flush timer.
    ///
    /// Calling it again is a no-op, and a destroyed pipeline stays destroyed.
    pub fn init(&self, capabilities: HostCapabilities) {
        let mut state = self.inner.state();
        match state.lifecycle {
            Lifecycle::Initialized => {
                debug!("Telemetry already initialized");
                return;
            }
            Lifecycle::Destroyed => {
                warn!("Telemetry was destroyed and cannot be initialized again");
                return;
            }
            Lifecycle::Uninitialized => {}
        }

        let (instrumentation, unsupported) =
            Instrumentation::install(&self.inner.config, capabilities);
        for error in &unsupported {
            warn!("{}, signal will not be collected", error);
        }

        state.instrumentation = Some(instrumentation);
        state.timer = self.start_timer();
        state.lifecycle = Lifecycle::Initialized;

        info!(
            "✓ Telemetry initialized (session {}, sample rate {})",
            state.session.id(),
            self.inner.config.sample_rate
        );
    }

    fn start_timer(&self) -> Option<JoinHandle<()>> {
        let period = self.inner.config.flush_interval;
        if period.is_zero() {
            warn!("Flush interval is zero, periodic flushing disabled");
            return None;
        }
        let Ok(handle) = Handle::try_current() else {
            warn!("No async runtime available, periodic flushing disabled");
            return None;
        };

        let weak = Arc::downgrade(&self.inner);
        Some(handle.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let batch = inner.take_batch();
                if !batch.is_empty() {
                    let _ = inner.send_batch(batch).await;
                }
            }
        }))
    }

    fn sampled_in(&self) -> bool {
        self.inner.random.next_f64() < self.inner.config.sample_rate
    }

    /// Record an event.
    ///
    /// Error and conversion events, and any event that fills the queue,
    /// start a flush before returning. Never fails; delivery problems are
    /// logged and retried on a later flush.
    pub fn track(&self, name: &str, properties: Properties, options: TrackOptions) -> TrackOutcome {
        let inner = &self.inner;
        let now = inner.clock.now_millis();
        let mut state = inner.state();

        if state.lifecycle == Lifecycle::Destroyed {
            debug!("Dropping '{}': telemetry destroyed", name);
            return TrackOutcome::Rejected;
        }
        if !self.sampled_in() {
            debug!("Sampled out '{}'", name);
            return TrackOutcome::SampledOut;
        }

        let category = options.category.unwrap_or_default();
        let context = context::capture(
            inner.environment.as_ref(),
            inner.storage.as_ref(),
            state.session.snapshot(now),
        );
        let event = Event {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            category,
            timestamp: now,
            session_id: state.session.id().to_string(),
            user_id: options.user_id,
            properties,
            context,
            value: options.value,
        };

        let queued = state.queue.push(event);
        state.session.record_event();
        debug!("Tracked '{}' ({}), {} queued", name, category, queued);

        if category.is_critical() || queued >= inner.config.max_queue_size {
            let batch = state.queue.take_all();
            drop(state);
            self.dispatch(batch);
            return TrackOutcome::FlushTriggered;
        }

        TrackOutcome::Recorded
    }

    /// Count a page view and record it with the time spent on the previous
    /// page.
    pub fn track_page_view(&self, properties: Properties) -> TrackOutcome {
        let now = self.inner.clock.now_millis();
        let (page_views, time_on_previous_page) = {
            let mut state = self.inner.state();
            if state.lifecycle == Lifecycle::Destroyed {
                debug!("Dropping page view: telemetry destroyed");
                return TrackOutcome::Rejected;
            }
            let elapsed = state.session.record_page_view(now);
            if let Some(instrumentation) = state.instrumentation.as_mut() {
                instrumentation.reset_page();
            }
            (state.session.page_views(), elapsed)
        };

        let mut props = Properties::new();
        props.insert("pageViews".to_string(), json!(page_views));
        props.insert(
            "timeOnPreviousPage".to_string(),
            json!(time_on_previous_page),
        );
        props.extend(properties);

        self.track(
            "page_view",
            props,
            TrackOptions::category(Category::PageView),
        )
    }

    pub fn track_conversion(&self, name: &str, value: f64, properties: Properties) -> TrackOutcome {
        let mut props = properties;
        props.insert("value".to_string(), json!(value));
        self.track(
            name,
            props,
            TrackOptions::category(Category::Conversion).with_value(value),
        )
    }

    pub fn track_user_action(&self, action: &str, properties: Properties) -> TrackOutcome {
        self.track(
            action,
            properties,
            TrackOptions::category(Category::UserInteraction),
        )
    }

    pub fn track_business_event(&self, name: &str, properties: Properties) -> TrackOutcome {
        self.track(name, properties, TrackOptions::category(Category::Business))
    }

    /// Remember the user across sessions and record the identification.
    ///
    /// The user id is stored before the event is built, so the event itself
    /// already reports the user as authenticated.
    pub fn identify(&self, user_id: &str, traits: Properties) -> TrackOutcome {
        if self.lifecycle() == Lifecycle::Destroyed {
            debug!("Ignoring identify: telemetry destroyed");
            return TrackOutcome::Rejected;
        }

        let storage = &self.inner.storage;
        if let Err(e) = storage.set(USER_ID_KEY, user_id) {
            warn!("Could not persist user id: {}", e);
        }
        match serde_json::to_string(&traits) {
            Ok(json) => {
                if let Err(e) = storage.set(USER_TRAITS_KEY, &json) {
                    warn!("Could not persist user traits: {}", e);
                }
            }
            Err(e) => warn!("Could not serialize user traits: {}", e),
        }

        let mut props = Properties::new();
        props.insert("userId".to_string(), json!(user_id));
        props.insert("traits".to_string(), serde_json::Value::Object(traits));

        self.track(
            "user_identified",
            props,
            TrackOptions::category(Category::UserInteraction).with_user_id(user_id),
        )
    }

    /// Add a segment label. Returns false if it was already present.
    pub fn set_user_segment(&self, segment: &str) -> bool {
        let mut segments = read_string_list(self.inner.storage.as_ref(), USER_SEGMENTS_KEY);
        if segments.iter().any(|s| s == segment) {
            return false;
        }
        segments.push(segment.to_string());
        self.inner.write_segments(&segments);
        true
    }

    /// Remove a segment label. Returns false if it was not present.
    pub fn remove_user_segment(&self, segment: &str) -> bool {
        let mut segments = read_string_list(self.inner.storage.as_ref(), USER_SEGMENTS_KEY);
        let before = segments.len();
        segments.retain(|s| s != segment);
        if segments.len() == before {
            return false;
        }
        self.inner.write_segments(&segments);
        true
    }

    pub fn user_segments(&self) -> Vec<String> {
        read_string_list(self.inner.storage.as_ref(), USER_SEGMENTS_KEY)
    }

    /// Feed a host observation through the installed instrumentation.
    ///
    /// Ignored until `init` has run.
    pub fn handle_browser_event(&self, event: BrowserEvent) -> Vec<TrackOutcome> {
        let now = self.inner.clock.now_millis();
        let requests = {
            let mut state = self.inner.state();
            let Some(instrumentation) = state.instrumentation.as_mut() else {
                debug!("Browser event ignored: instrumentation not installed");
                return Vec::new();
            };
            let page = self.inner.environment.page();
            let device = self.inner.environment.device();
            instrumentation.handle(event, now, &page, &device)
        };

        requests
            .into_iter()
            .map(|request| {
                self.track(
                    &request.name,
                    request.properties,
                    TrackOptions::category(request.category),
                )
            })
            .collect()
    }

    /// Start sending everything queued without waiting for the result.
    pub fn flush(&self) {
        let batch = self.inner.take_batch();
        self.dispatch(batch);
    }

    /// Send everything queued and wait for the outcome.
    ///
    /// Returns the number of events delivered. On failure the batch is
    /// already back in the queue.
    pub async fn flush_now(&self) -> Result<usize, TransportError> {
        let batch = self.inner.take_batch();
        if batch.is_empty() {
            return Ok(0);
        }
        self.inner.send_batch(batch).await
    }

    /// Wait for every background flush started so far.
    pub async fn wait_for_in_flight(&self) {
        loop {
            let tasks = std::mem::take(
                &mut *self
                    .inner
                    .in_flight
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            );
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                if let Err(e) = task.await {
                    warn!("Flush task failed: {}", e);
                }
            }
        }
    }

    /// Stop the timer and instrumentation and attempt one final flush.
    ///
    /// Safe in any state. The final flush is not awaited; use
    /// [`Telemetry::wait_for_in_flight`] to wait for it.
    pub fn destroy(&self) {
        let batch = {
            let mut state = self.inner.state();
            if state.lifecycle == Lifecycle::Destroyed {
                debug!("Telemetry already destroyed");
                return;
            }
            state.lifecycle = Lifecycle::Destroyed;
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            state.instrumentation = None;
            state.queue.take_all()
        };

        info!("Telemetry destroyed, final flush of {} events", batch.len());
        self.dispatch(batch);
    }

    pub fn queue_len(&self) -> usize {
        self.inner.state().queue.len()
    }

    /// Copies of the events waiting to be sent, oldest first.
    pub fn queued_events(&self) -> Vec<Event> {
        self.inner.state().queue.iter().cloned().collect()
    }

    pub fn session_snapshot(&self) -> SessionInfo {
        let now = self.inner.clock.now_millis();
        self.inner.state().session.snapshot(now)
    }

    /// Send a batch on a background task, or keep it queued when there is no
    /// runtime to run one.
    fn dispatch(&self, batch: Batch) {
        if batch.is_empty() {
            return;
        }

        match Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                let task = handle.spawn(async move {
                    let _ = inner.send_batch(batch).await;
                });
                self.inner.track_in_flight(task);
            }
            Err(_) => {
                warn!(
                    "No async runtime available, keeping {} events queued",
                    batch.len()
                );
                self.inner.requeue(batch);
            }
        }
    }
}
