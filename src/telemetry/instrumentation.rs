//! Automatic instrumentation.
//!
//! The host (a browser bridge, a test harness) delivers raw observations as
//! [`BrowserEvent`] values. [`Instrumentation`] turns them into tracking
//! requests according to which blocks are enabled and which observers the
//! host supports. It holds the per-page state: scroll high-water marks,
//! accumulated layout shift and whether first input was already reported.

use crate::telemetry::config::TelemetryConfig;
use crate::telemetry::environment::{DeviceSnapshot, PageSnapshot};
use crate::telemetry::event::{Category, Properties};
use reqwest::Url;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

/// Scroll depth percentages that each fire once per page.
pub const SCROLL_THRESHOLDS: [u8; 5] = [25, 50, 75, 90, 100];

/// Long tasks are by definition over 50ms.
pub const LONG_TASK_THRESHOLD_MS: f64 = 50.0;

/// Resources slower than this are reported.
pub const SLOW_RESOURCE_THRESHOLD_MS: f64 = 1_000.0;

const MAX_CLICK_TEXT_CHARS: usize = 100;

/// Performance observers a host may or may not provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Observer {
    LongTask,
    ResourceTiming,
    LayoutShift,
    LargestContentfulPaint,
    FirstInput,
}

impl Observer {
    pub const ALL: [Observer; 5] = [
        Observer::LongTask,
        Observer::ResourceTiming,
        Observer::LayoutShift,
        Observer::LargestContentfulPaint,
        Observer::FirstInput,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Observer::LongTask => "longtask",
            Observer::ResourceTiming => "resource",
            Observer::LayoutShift => "layout-shift",
            Observer::LargestContentfulPaint => "largest-contentful-paint",
            Observer::FirstInput => "first-input",
        }
    }
}

impl std::fmt::Display for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstrumentationError {
    #[error("{0} observer is not supported by this host")]
    Unsupported(Observer),
}

/// Which observers the host can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCapabilities {
    pub long_tasks: bool,
    pub resource_timing: bool,
    pub layout_shift: bool,
    pub largest_contentful_paint: bool,
    pub first_input: bool,
}

impl HostCapabilities {
    pub fn all() -> Self {
        Self {
            long_tasks: true,
            resource_timing: true,
            layout_shift: true,
            largest_contentful_paint: true,
            first_input: true,
        }
    }

    pub fn none() -> Self {
        Self {
            long_tasks: false,
            resource_timing: false,
            layout_shift: false,
            largest_contentful_paint: false,
            first_input: false,
        }
    }

    pub fn supports(&self, observer: Observer) -> bool {
        match observer {
            Observer::LongTask => self.long_tasks,
            Observer::ResourceTiming => self.resource_timing,
            Observer::LayoutShift => self.layout_shift,
            Observer::LargestContentfulPaint => self.largest_contentful_paint,
            Observer::FirstInput => self.first_input,
        }
    }
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self::all()
    }
}

/// The element a click landed on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClickTarget {
    /// Lowercase tag name (`button`, `a`, `div`, ...)
    pub tag_name: String,
    pub role: Option<String>,
    pub text: String,
    pub id: Option<String>,
    pub class_name: Option<String>,
    pub href: Option<String>,
    /// Product identifier carried by the element or one of its ancestors
    pub product_id: Option<String>,
    /// Viewport coordinates of the pointer
    pub x: f64,
    pub y: f64,
}

impl ClickTarget {
    fn is_button(&self) -> bool {
        self.tag_name.eq_ignore_ascii_case("button") || self.role.as_deref() == Some("button")
    }

    fn is_link(&self) -> bool {
        self.tag_name.eq_ignore_ascii_case("a")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollPosition {
    pub scroll_top: f64,
    pub document_height: f64,
    pub viewport_height: f64,
}

impl ScrollPosition {
    /// Percentage of the scrollable height reached, rounded, in `0..=100`.
    ///
    /// A page that does not scroll counts as fully read.
    pub fn depth_percent(&self) -> u8 {
        let scrollable = self.document_height - self.viewport_height;
        if scrollable <= 0.0 {
            return 100;
        }
        let percent = (self.scroll_top / scrollable * 100.0).round();
        percent.clamp(0.0, 100.0) as u8
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormInfo {
    pub id: Option<String>,
    pub name: Option<String>,
    pub action: Option<String>,
    pub method: Option<String>,
    pub field_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Visible => "visible",
            Visibility::Hidden => "hidden",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LongTaskEntry {
    pub duration: f64,
    pub start_time: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceTiming {
    pub name: String,
    pub initiator_type: String,
    pub duration: f64,
    pub transfer_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutShiftEntry {
    pub value: f64,
    pub had_recent_input: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptError {
    pub message: String,
    pub filename: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub stack: Option<String>,
}

/// Raw observations delivered by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserEvent {
    Click(ClickTarget),
    Scroll(ScrollPosition),
    FormSubmit(FormInfo),
    VisibilityChange(Visibility),
    LongTasks(Vec<LongTaskEntry>),
    /// Resource timings collected after the page finished loading
    ResourcesLoaded(Vec<ResourceTiming>),
    LayoutShifts(Vec<LayoutShiftEntry>),
    /// Start times of the observed LCP candidates, in order
    LargestContentfulPaint(Vec<f64>),
    FirstInput { start_time: f64, processing_start: f64 },
    Error(ScriptError),
    UnhandledRejection { reason: String },
}

/// An event the pipeline should track on behalf of instrumentation.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRequest {
    pub name: String,
    pub category: Category,
    pub properties: Properties,
}

impl TrackRequest {
    fn new(name: &str, category: Category, properties: serde_json::Value) -> Self {
        let properties = match properties {
            serde_json::Value::Object(map) => map,
            _ => Properties::new(),
        };
        Self {
            name: name.to_string(),
            category,
            properties,
        }
    }
}

/// Throttled scroll-depth tracker with a per-page high-water mark.
#[derive(Debug, Clone)]
pub struct ScrollTracker {
    throttle_ms: i64,
    last_handled: Option<i64>,
    fired: [bool; SCROLL_THRESHOLDS.len()],
}

impl ScrollTracker {
    pub fn new(throttle_ms: i64) -> Self {
        Self {
            throttle_ms: throttle_ms.max(0),
            last_handled: None,
            fired: [false; SCROLL_THRESHOLDS.len()],
        }
    }

    /// Thresholds crossed for the first time by this observation.
    ///
    /// Observations arriving within the throttle window of the last handled
    /// one are ignored.
    pub fn observe(&mut self, now: i64, position: &ScrollPosition) -> Vec<u8> {
        if let Some(last) = self.last_handled {
            if now - last < self.throttle_ms {
                return Vec::new();
            }
        }
        self.last_handled = Some(now);

        let depth = position.depth_percent();
        let mut crossed = Vec::new();
        for (threshold, fired) in SCROLL_THRESHOLDS.iter().zip(self.fired.iter_mut()) {
            if depth >= *threshold && !*fired {
                *fired = true;
                crossed.push(*threshold);
            }
        }
        crossed
    }

    /// Start over for a new page.
    pub fn reset_page(&mut self) {
        self.last_handled = None;
        self.fired = [false; SCROLL_THRESHOLDS.len()];
    }
}

/// Installed instrumentation blocks and their state.
#[derive(Debug, Clone)]
pub struct Instrumentation {
    auto_tracking: bool,
    performance: bool,
    errors: bool,
    heatmaps: bool,
    capabilities: HostCapabilities,
    scroll: ScrollTracker,
    cumulative_layout_shift: f64,
    first_input_reported: bool,
}

impl Instrumentation {
    /// Install the blocks enabled in `config`.
    ///
    /// Returns the observers that were wanted but are missing from the host;
    /// those signals are simply never collected.
    pub fn install(
        config: &TelemetryConfig,
        capabilities: HostCapabilities,
    ) -> (Self, Vec<InstrumentationError>) {
        let unsupported = if config.enable_performance_tracking {
            Observer::ALL
                .into_iter()
                .filter(|observer| !capabilities.supports(*observer))
                .map(InstrumentationError::Unsupported)
                .collect()
        } else {
            Vec::new()
        };

        let instrumentation = Self {
            auto_tracking: config.enable_auto_tracking,
            performance: config.enable_performance_tracking,
            errors: config.enable_error_tracking,
            heatmaps: config.enable_heatmaps,
            capabilities,
            scroll: ScrollTracker::new(config.scroll_throttle.as_millis() as i64),
            cumulative_layout_shift: 0.0,
            first_input_reported: false,
        };

        (instrumentation, unsupported)
    }

    pub fn reset_page(&mut self) {
        self.scroll.reset_page();
    }

    pub fn cumulative_layout_shift(&self) -> f64 {
        self.cumulative_layout_shift
    }

    fn observes(&self, observer: Observer) -> bool {
        self.performance && self.capabilities.supports(observer)
    }

    /// Turn one host observation into zero or more tracking requests.
    pub fn handle(
        &mut self,
        event: BrowserEvent,
        now: i64,
        page: &PageSnapshot,
        device: &DeviceSnapshot,
    ) -> Vec<TrackRequest> {
        match event {
            BrowserEvent::Click(target) => self.on_click(&target, page, device),
            BrowserEvent::Scroll(position) if self.auto_tracking => self
                .scroll
                .observe(now, &position)
                .into_iter()
                .map(|threshold| {
                    TrackRequest::new(
                        "scroll_depth",
                        Category::UserInteraction,
                        json!({
                            "depth": threshold,
                            "maxDepth": position.depth_percent(),
                        }),
                    )
                })
                .collect(),
            BrowserEvent::FormSubmit(form) if self.auto_tracking => vec![TrackRequest::new(
                "form_submit",
                Category::UserInteraction,
                json!({
                    "formId": form.id,
                    "formName": form.name,
                    "action": form.action,
                    "method": form.method,
                    "fieldCount": form.field_count,
                }),
            )],
            BrowserEvent::VisibilityChange(visibility) if self.auto_tracking => {
                vec![TrackRequest::new(
                    "visibility_change",
                    Category::UserInteraction,
                    json!({ "state": visibility.as_str() }),
                )]
            }
            BrowserEvent::LongTasks(entries) if self.observes(Observer::LongTask) => entries
                .into_iter()
                .filter(|entry| entry.duration > LONG_TASK_THRESHOLD_MS)
                .map(|entry| {
                    TrackRequest::new(
                        "long_task",
                        Category::Performance,
                        json!({ "duration": entry.duration, "startTime": entry.start_time }),
                    )
                })
                .collect(),
            BrowserEvent::ResourcesLoaded(resources) if self.observes(Observer::ResourceTiming) => {
                resources
                    .into_iter()
                    .filter(|resource| resource.duration > SLOW_RESOURCE_THRESHOLD_MS)
                    .map(|resource| {
                        TrackRequest::new(
                            "slow_resource",
                            Category::Performance,
                            json!({
                                "name": resource.name,
                                "type": resource.initiator_type,
                                "duration": resource.duration,
                                "size": resource.transfer_size,
                            }),
                        )
                    })
                    .collect()
            }
            BrowserEvent::LayoutShifts(entries) if self.observes(Observer::LayoutShift) => {
                let counted: Vec<_> = entries.iter().filter(|e| !e.had_recent_input).collect();
                if counted.is_empty() {
                    return Vec::new();
                }
                self.cumulative_layout_shift += counted.iter().map(|e| e.value).sum::<f64>();
                vec![web_vital("CLS", self.cumulative_layout_shift)]
            }
            BrowserEvent::LargestContentfulPaint(start_times)
                if self.observes(Observer::LargestContentfulPaint) =>
            {
                start_times
                    .last()
                    .map(|start| vec![web_vital("LCP", *start)])
                    .unwrap_or_default()
            }
            BrowserEvent::FirstInput {
                start_time,
                processing_start,
            } if self.observes(Observer::FirstInput) && !self.first_input_reported => {
                self.first_input_reported = true;
                vec![web_vital("FID", processing_start - start_time)]
            }
            BrowserEvent::Error(error) if self.errors => vec![TrackRequest::new(
                "javascript_error",
                Category::Error,
                json!({
                    "message": error.message,
                    "filename": error.filename,
                    "line": error.line,
                    "column": error.column,
                    "stack": error.stack,
                }),
            )],
            BrowserEvent::UnhandledRejection { reason } if self.errors => {
                vec![TrackRequest::new(
                    "unhandled_rejection",
                    Category::Error,
                    json!({ "reason": reason }),
                )]
            }
            other => {
                debug!("Ignoring browser event with no active listener: {:?}", other);
                Vec::new()
            }
        }
    }

    fn on_click(
        &self,
        target: &ClickTarget,
        page: &PageSnapshot,
        device: &DeviceSnapshot,
    ) -> Vec<TrackRequest> {
        let mut requests = Vec::new();

        if self.auto_tracking {
            let text = truncate_text(&target.text);

            if target.is_button() {
                requests.push(TrackRequest::new(
                    "button_click",
                    Category::UserInteraction,
                    json!({
                        "text": text,
                        "id": target.id,
                        "className": target.class_name,
                    }),
                ));
            } else if target.is_link() {
                let href = target.href.clone().unwrap_or_default();
                requests.push(TrackRequest::new(
                    "link_click",
                    Category::UserInteraction,
                    json!({
                        "text": text,
                        "href": href,
                        "isExternal": is_external_link(&page.url, &href),
                    }),
                ));
            }

            if let Some(product_id) = &target.product_id {
                requests.push(TrackRequest::new(
                    "product_interaction",
                    Category::UserInteraction,
                    json!({
                        "productId": product_id,
                        "action": "click",
                        "element": target.tag_name,
                    }),
                ));
            }
        }

        if self.heatmaps {
            let relative = |coordinate: f64, extent: u32| {
                if extent == 0 {
                    0.0
                } else {
                    coordinate / f64::from(extent)
                }
            };
            requests.push(TrackRequest::new(
                "heatmap_click",
                Category::UserInteraction,
                json!({
                    "x": target.x,
                    "y": target.y,
                    "relativeX": relative(target.x, device.viewport_width),
                    "relativeY": relative(target.y, device.viewport_height),
                    "viewport": format!("{}x{}", device.viewport_width, device.viewport_height),
                    "element": target.tag_name,
                }),
            ));
        }

        requests
    }
}

fn web_vital(metric: &str, value: f64) -> TrackRequest {
    TrackRequest::new(
        "web_vital",
        Category::Performance,
        json!({ "metric": metric, "value": value }),
    )
}

fn truncate_text(text: &str) -> String {
    text.trim().chars().take(MAX_CLICK_TEXT_CHARS).collect()
}

/// Whether `href` (resolved against the page URL) leaves the page's host.
pub(crate) fn is_external_link(page_url: &str, href: &str) -> bool {
    let Ok(base) = Url::parse(page_url) else {
        // Without a base only absolute URLs can be judged
        return Url::parse(href).map(|u| u.host().is_some()).unwrap_or(false);
    };
    match base.join(href) {
        Ok(target) => target.host_str().is_some() && target.host_str() != base.host_str(),
        Err(_) => false,
    }
}
