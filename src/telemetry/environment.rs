//! The host page and device, as seen by the pipeline.

use std::sync::{PoisonError, RwLock};

/// Where the shopper currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    pub referrer: String,
}

/// What the shopper is browsing with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub user_agent: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for DeviceSnapshot {
    fn default() -> Self {
        Self {
            user_agent: String::new(),
            screen_width: 1920,
            screen_height: 1080,
            viewport_width: 1440,
            viewport_height: 900,
        }
    }
}

/// Read access to the current page and device.
pub trait Environment: Send + Sync {
    fn page(&self) -> PageSnapshot;
    fn device(&self) -> DeviceSnapshot;
}

/// Environment whose state is pushed in by the host.
#[derive(Debug, Default)]
pub struct StaticEnvironment {
    page: RwLock<PageSnapshot>,
    device: RwLock<DeviceSnapshot>,
}

impl StaticEnvironment {
    pub fn new(page: PageSnapshot, device: DeviceSnapshot) -> Self {
        Self {
            page: RwLock::new(page),
            device: RwLock::new(device),
        }
    }

    /// Move to a new page; the previous URL becomes the referrer.
    pub fn navigate(&self, url: impl Into<String>, title: impl Into<String>) {
        let mut page = self.page.write().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::take(&mut page.url);
        page.url = url.into();
        page.title = title.into();
        page.referrer = previous;
    }

    pub fn resize_viewport(&self, width: u32, height: u32) {
        let mut device = self.device.write().unwrap_or_else(PoisonError::into_inner);
        device.viewport_width = width;
        device.viewport_height = height;
    }
}

impl Environment for StaticEnvironment {
    fn page(&self) -> PageSnapshot {
        self.page
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn device(&self) -> DeviceSnapshot {
        self.device
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigate_moves_url_to_referrer() {
        let env = StaticEnvironment::new(
            PageSnapshot {
                url: "https://shop.example/".into(),
                title: "Accueil".into(),
                referrer: String::new(),
            },
            DeviceSnapshot::default(),
        );

        env.navigate("https://shop.example/cart", "Panier");

        let page = env.page();
        assert_eq!(page.url, "https://shop.example/cart");
        assert_eq!(page.title, "Panier");
        assert_eq!(page.referrer, "https://shop.example/");
    }

    #[test]
    fn test_resize_viewport() {
        let env = StaticEnvironment::default();
        env.resize_viewport(375, 812);

        let device = env.device();
        assert_eq!((device.viewport_width, device.viewport_height), (375, 812));
    }
}
