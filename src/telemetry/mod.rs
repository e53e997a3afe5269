//! Client event telemetry.
//!
//! Events are sampled, enriched with a fresh context snapshot (page, user,
//! session, device, campaign) and queued. The queue is flushed to the
//! ingestion endpoint on a timer, immediately for error and conversion
//! events, and whenever it reaches `max_queue_size`. A batch that fails to
//! send is put back in front of newer events and retried on the next flush.
//!
//! Everything the pipeline touches outside itself is injected:
//!
//! - [`Transport`]: where batches go ([`HttpTransport`] in production)
//! - [`ClientStorage`]: durable per-shopper values ([`MemoryStorage`], [`FileStorage`])
//! - [`Clock`] and [`RandomSource`]: time and sampling
//! - [`Environment`]: the current page and device
//!
//! ```no_run
//! use storefront_core::telemetry::{HostCapabilities, Properties, Telemetry, TelemetryConfig};
//!
//! # async fn run() {
//! let telemetry = Telemetry::builder(TelemetryConfig::default()).build();
//! telemetry.init(HostCapabilities::all());
//!
//! telemetry.track_page_view(Properties::new());
//! telemetry.track_conversion("purchase", 129.0, Properties::new());
//!
//! telemetry.destroy();
//! telemetry.wait_for_in_flight().await;
//! # }
//! ```

mod clock;
mod config;
mod context;
mod environment;
mod event;
mod instrumentation;
mod pipeline;
mod queue;
mod session;
mod storage;
mod transport;

pub use clock::{Clock, FixedRandom, ManualClock, RandomSource, SystemClock, ThreadRandom};
pub use config::{
    clamp_sample_rate, Endpoints, TelemetryConfig, DEFAULT_FLUSH_INTERVAL,
    DEFAULT_MAX_BUFFERED_EVENTS, DEFAULT_MAX_QUEUE_SIZE, DEFAULT_SCROLL_THROTTLE,
};
pub use environment::{DeviceSnapshot, Environment, PageSnapshot, StaticEnvironment};
pub use event::{
    CampaignInfo, Category, DeviceInfo, DeviceType, Event, EventContext, PageInfo, Properties,
    SessionInfo, TrackOptions, UserInfo,
};
pub use instrumentation::{
    BrowserEvent, ClickTarget, FormInfo, HostCapabilities, Instrumentation,
    InstrumentationError, LayoutShiftEntry, LongTaskEntry, Observer, ResourceTiming,
    ScriptError, ScrollPosition, ScrollTracker, TrackRequest, Visibility,
    LONG_TASK_THRESHOLD_MS, SCROLL_THRESHOLDS, SLOW_RESOURCE_THRESHOLD_MS,
};
pub use pipeline::{Lifecycle, Telemetry, TelemetryBuilder, TrackOutcome};
pub use queue::{Batch, EventQueue};
pub use session::Session;
pub use storage::{
    ClientStorage, FileStorage, MemoryStorage, StorageError, SESSION_EXISTS_KEY,
    USER_COHORT_KEY, USER_ID_KEY, USER_SEGMENTS_KEY, USER_TRAITS_KEY,
};
pub use transport::{
    HttpTransport, MetricPayload, Transport, TransportError, INGEST_TOKEN_HEADER,
};
