//! Context capture: turns the environment, durable storage and session into
//! the snapshot attached to each event.

use crate::telemetry::environment::{DeviceSnapshot, Environment, PageSnapshot};
use crate::telemetry::event::{
    CampaignInfo, DeviceInfo, DeviceType, EventContext, PageInfo, SessionInfo, UserInfo,
};
use crate::telemetry::storage::{
    read_string_list, ClientStorage, USER_COHORT_KEY, USER_ID_KEY, USER_SEGMENTS_KEY,
};
use reqwest::Url;

/// Build a fresh context snapshot.
pub(crate) fn capture(
    environment: &dyn Environment,
    storage: &dyn ClientStorage,
    session: SessionInfo,
) -> EventContext {
    let page = environment.page();
    let device = environment.device();

    EventContext {
        campaign: campaign_from_url(&page.url),
        page: page_info(page),
        user: user_info(storage),
        session,
        device: device_info(&device),
    }
}

fn page_info(page: PageSnapshot) -> PageInfo {
    let path = Url::parse(&page.url)
        .map(|url| url.path().to_string())
        .unwrap_or_default();

    PageInfo {
        url: page.url,
        title: page.title,
        path,
        referrer: page.referrer,
    }
}

fn user_info(storage: &dyn ClientStorage) -> UserInfo {
    let id = storage.get(USER_ID_KEY);
    UserInfo {
        is_authenticated: id.is_some(),
        id,
        segments: read_string_list(storage, USER_SEGMENTS_KEY),
        cohort: storage.get(USER_COHORT_KEY),
    }
}

fn device_info(device: &DeviceSnapshot) -> DeviceInfo {
    DeviceInfo {
        device_type: device_type(device.viewport_width),
        os: detect_os(&device.user_agent).to_string(),
        browser: detect_browser(&device.user_agent).to_string(),
        screen_resolution: format!("{}x{}", device.screen_width, device.screen_height),
        viewport: format!("{}x{}", device.viewport_width, device.viewport_height),
    }
}

/// Classify by viewport width.
pub(crate) fn device_type(viewport_width: u32) -> DeviceType {
    match viewport_width {
        0..=767 => DeviceType::Mobile,
        768..=1023 => DeviceType::Tablet,
        _ => DeviceType::Desktop,
    }
}

pub(crate) fn detect_os(user_agent: &str) -> &'static str {
    // iOS user agents also mention "Mac OS X", so check them first
    if user_agent.contains("iPhone") || user_agent.contains("iPad") {
        "iOS"
    } else if user_agent.contains("Android") {
        "Android"
    } else if user_agent.contains("Windows") {
        "Windows"
    } else if user_agent.contains("Mac OS X") || user_agent.contains("Macintosh") {
        "macOS"
    } else if user_agent.contains("Linux") {
        "Linux"
    } else {
        "Unknown"
    }
}

pub(crate) fn detect_browser(user_agent: &str) -> &'static str {
    // Order matters: Edge and Chrome both claim Safari, Edge claims Chrome
    if user_agent.contains("Edg/") {
        "Edge"
    } else if user_agent.contains("Firefox/") {
        "Firefox"
    } else if user_agent.contains("Chrome/") {
        "Chrome"
    } else if user_agent.contains("Safari/") {
        "Safari"
    } else {
        "Unknown"
    }
}

/// UTM parameters from the page URL, if any are present.
pub(crate) fn campaign_from_url(url: &str) -> Option<CampaignInfo> {
    let url = Url::parse(url).ok()?;
    let mut campaign = CampaignInfo::default();

    for (key, value) in url.query_pairs() {
        let slot = match key.as_ref() {
            "utm_source" => &mut campaign.source,
            "utm_medium" => &mut campaign.medium,
            "utm_campaign" => &mut campaign.campaign,
            "utm_term" => &mut campaign.term,
            "utm_content" => &mut campaign.content,
            _ => continue,
        };
        *slot = Some(value.into_owned());
    }

    (campaign != CampaignInfo::default()).then_some(campaign)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::environment::StaticEnvironment;
    use crate::telemetry::storage::MemoryStorage;

    const IPHONE_SAFARI: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const WINDOWS_EDGE: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0";
    const MAC_CHROME: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const LINUX_FIREFOX: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";

    #[test]
    fn test_device_type_breakpoints() {
        assert_eq!(device_type(375), DeviceType::Mobile);
        assert_eq!(device_type(767), DeviceType::Mobile);
        assert_eq!(device_type(768), DeviceType::Tablet);
        assert_eq!(device_type(1023), DeviceType::Tablet);
        assert_eq!(device_type(1024), DeviceType::Desktop);
    }

    #[test]
    fn test_detect_os_and_browser() {
        assert_eq!(detect_os(IPHONE_SAFARI), "iOS");
        assert_eq!(detect_browser(IPHONE_SAFARI), "Safari");
        assert_eq!(detect_os(WINDOWS_EDGE), "Windows");
        assert_eq!(detect_browser(WINDOWS_EDGE), "Edge");
        assert_eq!(detect_os(MAC_CHROME), "macOS");
        assert_eq!(detect_browser(MAC_CHROME), "Chrome");
        assert_eq!(detect_os(LINUX_FIREFOX), "Linux");
        assert_eq!(detect_browser(LINUX_FIREFOX), "Firefox");
        assert_eq!(detect_os(""), "Unknown");
        assert_eq!(detect_browser(""), "Unknown");
    }

    #[test]
    fn test_campaign_from_url() {
        let campaign = campaign_from_url(
            "https://shop.example/collections?utm_source=instagram&utm_medium=social&utm_campaign=fw24",
        )
        .expect("Should find campaign");

        assert_eq!(campaign.source.as_deref(), Some("instagram"));
        assert_eq!(campaign.medium.as_deref(), Some("social"));
        assert_eq!(campaign.campaign.as_deref(), Some("fw24"));
        assert_eq!(campaign.term, None);
    }

    #[test]
    fn test_campaign_absent_without_utm() {
        assert_eq!(campaign_from_url("https://shop.example/?page=2"), None);
        assert_eq!(campaign_from_url("not a url"), None);
    }

    #[test]
    fn test_capture_reads_storage_and_environment() {
        let env = StaticEnvironment::new(
            PageSnapshot {
                url: "https://shop.example/products/trench?utm_source=newsletter".into(),
                title: "Trench".into(),
                referrer: "https://shop.example/".into(),
            },
            DeviceSnapshot {
                user_agent: MAC_CHROME.into(),
                viewport_width: 800,
                ..DeviceSnapshot::default()
            },
        );
        let storage = MemoryStorage::new();
        storage.set(USER_ID_KEY, "user-7").unwrap();
        storage.set(USER_SEGMENTS_KEY, r#"["vip","newsletter"]"#).unwrap();
        storage.set(USER_COHORT_KEY, "2024-03").unwrap();

        let context = capture(&env, &storage, SessionInfo::default());

        assert_eq!(context.page.path, "/products/trench");
        assert_eq!(context.page.referrer, "https://shop.example/");
        assert!(context.user.is_authenticated);
        assert_eq!(context.user.id.as_deref(), Some("user-7"));
        assert_eq!(context.user.segments, vec!["vip", "newsletter"]);
        assert_eq!(context.user.cohort.as_deref(), Some("2024-03"));
        assert_eq!(context.device.device_type, DeviceType::Tablet);
        assert_eq!(context.device.screen_resolution, "1920x1080");
        assert_eq!(context.device.viewport, "800x900");
        assert_eq!(
            context.campaign.and_then(|c| c.source),
            Some("newsletter".to_string())
        );
    }

    #[test]
    fn test_capture_anonymous_user() {
        let context = capture(
            &StaticEnvironment::default(),
            &MemoryStorage::new(),
            SessionInfo::default(),
        );
        assert!(!context.user.is_authenticated);
        assert!(context.user.segments.is_empty());
        assert_eq!(context.page.path, "");
    }
}
