//! Datastore records and feed items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A registered user, as read from the datastore at run start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Identity of the user.
    pub email: String,
    /// Publish time of the newest article already delivered.
    ///
    /// `None` means the user has never been synchronized.
    pub last_sync_date: Option<DateTime<Utc>>,
    /// Feeds the user subscribes to.
    pub feeds: Vec<Feed>,
    /// Linked remote device, if any.
    pub device: Option<Device>,
}

impl User {
    /// Create a user with no feeds, no device and no watermark.
    pub fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
            last_sync_date: None,
            feeds: Vec::new(),
            device: None,
        }
    }

    /// Add a feed subscription.
    pub fn with_feed(mut self, url: &str) -> Self {
        self.feeds.push(Feed::new(url));
        self
    }

    /// Link a device credential.
    pub fn with_device(mut self, token: &str) -> Self {
        self.device = Some(Device::new(token));
        self
    }

    /// Set the watermark.
    pub fn with_last_sync_date(mut self, date: DateTime<Utc>) -> Self {
        self.last_sync_date = Some(date);
        self
    }
}

/// A feed subscription owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    /// Location of the feed document.
    pub url: String,
}

impl Feed {
    /// Create a feed from its URL.
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }
}

/// Authorization credential for a user's remote document store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device token exchanged for a session.
    pub token: String,
}

impl Device {
    /// Create a device from its token.
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// One item of a parsed feed.
///
/// Only items with both a link and a publish time are ever produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    /// Article URL.
    pub link: String,
    /// Publish time.
    pub pub_date: DateTime<Utc>,
    /// Article title, used as the document name when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl FeedItem {
    /// Create an untitled item.
    pub fn new(link: &str, pub_date: DateTime<Utc>) -> Self {
        Self {
            link: link.to_string(),
            pub_date,
            title: None,
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    /// Name shown for this item's document in the remote tree.
    pub fn document_name(&self) -> &str {
        match self.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title,
            _ => &self.link,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn user_builder() {
        let user = User::new("a@example.com")
            .with_feed("https://example.com/feed.xml")
            .with_device("token");

        assert_eq!(user.feeds.len(), 1);
        assert!(user.device.is_some());
        assert!(user.last_sync_date.is_none());
    }

    #[test]
    fn device_debug_redacts_token() {
        let device = Device::new("super-secret");
        let debug = format!("{:?}", device);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn document_name_falls_back_to_link() {
        let date = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let item = FeedItem::new("https://example.com/a", date);
        assert_eq!(item.document_name(), "https://example.com/a");

        let blank = item.clone().with_title("   ");
        assert_eq!(blank.document_name(), "https://example.com/a");

        let titled = item.with_title("Hello");
        assert_eq!(titled.document_name(), "Hello");
    }

    #[test]
    fn user_serializes_camel_case() {
        let user = User::new("a@example.com");
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("\"lastSyncDate\":null"));
    }
}
