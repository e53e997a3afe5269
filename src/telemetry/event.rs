//! Telemetry event and context types.
//!
//! Field names serialize in camelCase to match what the ingestion endpoint
//! expects from the browser.

use serde::{Deserialize, Serialize};

/// Free-form event properties.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Closed set of event categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    PageView,
    #[default]
    UserInteraction,
    Business,
    Performance,
    Error,
    Conversion,
}

impl Category {
    /// Categories that are flushed as soon as they are queued.
    pub fn is_critical(&self) -> bool {
        matches!(self, Category::Error | Category::Conversion)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::PageView => "page_view",
            Category::UserInteraction => "user_interaction",
            Category::Business => "business",
            Category::Performance => "performance",
            Category::Error => "error",
            Category::Conversion => "conversion",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional overrides for a `track` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackOptions {
    pub category: Option<Category>,
    pub user_id: Option<String>,
    pub value: Option<f64>,
}

impl TrackOptions {
    pub fn category(category: Category) -> Self {
        Self {
            category: Some(category),
            ..Self::default()
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }
}

/// A single tracked event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub name: String,
    pub category: Category,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub properties: Properties,
    pub context: EventContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

/// Snapshot of everything known about the shopper when the event was built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventContext {
    pub page: PageInfo,
    pub user: UserInfo,
    pub session: SessionInfo,
    pub device: DeviceInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign: Option<CampaignInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub url: String,
    pub title: String,
    pub path: String,
    pub referrer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub is_authenticated: bool,
    #[serde(default)]
    pub segments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cohort: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub is_first_session: bool,
    /// Milliseconds since the session started
    pub duration: i64,
    pub page_views: u32,
    pub event_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Mobile,
    Tablet,
    #[default]
    Desktop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub os: String,
    pub browser: String,
    pub screen_resolution: String,
    pub viewport: String,
}

/// UTM attribution parsed from the landing URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CampaignInfo {
    pub source: Option<String>,
    pub medium: Option<String>,
    pub campaign: Option<String>,
    pub term: Option<String>,
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> Event {
        Event {
            id: "evt-1".to_string(),
            name: "add_to_cart".to_string(),
            category: Category::Business,
            timestamp: 1_700_000_000_000,
            session_id: "session-1".to_string(),
            user_id: None,
            properties: Properties::new(),
            context: EventContext {
                page: PageInfo::default(),
                user: UserInfo::default(),
                session: SessionInfo::default(),
                device: DeviceInfo::default(),
                campaign: None,
            },
            value: None,
        }
    }

    #[test]
    fn test_category_serializes_snake_case() {
        let json = serde_json::to_string(&Category::PageView).expect("Should serialize");
        assert_eq!(json, "\"page_view\"");
        assert_eq!(Category::UserInteraction.to_string(), "user_interaction");
    }

    #[test]
    fn test_default_category_is_user_interaction() {
        assert_eq!(Category::default(), Category::UserInteraction);
    }

    #[test]
    fn test_critical_categories() {
        assert!(Category::Error.is_critical());
        assert!(Category::Conversion.is_critical());
        assert!(!Category::PageView.is_critical());
        assert!(!Category::Business.is_critical());
    }

    #[test]
    fn test_event_uses_camel_case_and_skips_empty_options() {
        let json = serde_json::to_value(sample_event()).expect("Should serialize");

        assert_eq!(json["sessionId"], "session-1");
        assert!(json.get("userId").is_none());
        assert!(json.get("value").is_none());
        assert_eq!(json["context"]["device"]["type"], "desktop");
        assert_eq!(json["context"]["user"]["isAuthenticated"], false);
    }

    #[test]
    fn test_track_options_builder() {
        let options = TrackOptions::category(Category::Conversion)
            .with_user_id("user-42")
            .with_value(129.0);

        assert_eq!(options.category, Some(Category::Conversion));
        assert_eq!(options.user_id.as_deref(), Some("user-42"));
        assert_eq!(options.value, Some(129.0));
    }
}
