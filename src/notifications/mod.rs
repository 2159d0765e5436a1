//! Notification records and the feed they come from.

mod paginator;
mod parse;

pub use paginator::{fetch_page, notifications, FailurePolicy, PageOptions};
pub use parse::parse_page;

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Mention,
    Reply,
    Thank,
    Favorite,
    Other,
}

impl NotificationKind {
    /// Classifies a notification from the text around its thread link.
    ///
    /// Mention and reply need both phrases to match exactly; thank and
    /// favorite only look at the leading text. The order matters because the
    /// site's phrasing overlaps.
    pub fn classify(before: &str, after: &str) -> Self {
        match (before, after) {
            ("在回复", "时提到了你") => Self::Mention,
            ("在", "里回复了你") => Self::Reply,
            _ if before.contains("感谢了你在主题") => Self::Thank,
            _ if before.contains("收藏了你发布的主题") => Self::Favorite,
            _ => Self::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mention => "mention",
            Self::Reply => "reply",
            Self::Thank => "thank",
            Self::Favorite => "favorite",
            Self::Other => "other",
        }
    }

    /// Phrases placed before and after the thread title when rendering.
    fn phrases(self) -> (&'static str, &'static str) {
        match self {
            Self::Mention => ("在回复", "时提到了你"),
            Self::Reply => ("在", "里回复了你"),
            Self::Favorite => ("收藏了你发布的主题", ""),
            Self::Thank => ("感谢了你在主题", "里的回复"),
            Self::Other => ("", ""),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the member's notification feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Strictly increasing per member.
    pub id: u64,
    /// Relative time as displayed by the site, e.g. `3 小时前`.
    pub time: String,
    pub thread: String,
    /// Reply text; empty for kinds without a payload.
    pub content: String,
    pub author: String,
    pub kind: NotificationKind,
    pub link: String,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (left, right) = self.kind.phrases();
        write!(
            f,
            "{} [{}] {} \"{}\" {} ({})",
            self.id, self.author, left, self.thread, right, self.time
        )?;
        if !right.is_empty() {
            write!(f, ": {}", self.content)?;
        }
        Ok(())
    }
}
