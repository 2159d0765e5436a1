//! Page-by-page producer of notifications.

use std::collections::VecDeque;

use futures::stream::{self, Stream};

use super::parse::{parse_listing, Listing};
use super::Notification;
use crate::error::{Error, Result};
use crate::session::{classify, Session};

const NOTIFICATIONS_PATH: &str = "/notifications";

/// What the paginator does when a page cannot be fetched or read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the failure and end the stream as if the feed were exhausted.
    ///
    /// Keeps long-running pollers alive across transient site problems.
    #[default]
    FailOpen,
    /// Yield the error as the final stream item.
    FailClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOptions {
    /// First page to fetch (1-based).
    pub start_page: u32,
    /// Stop after this many notifications.
    pub limit: Option<usize>,
    pub policy: FailurePolicy,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            start_page: 1,
            limit: None,
            policy: FailurePolicy::FailOpen,
        }
    }
}

impl PageOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn starting_at(mut self, page: u32) -> Self {
        self.start_page = page;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Fetches and parses one listing page.
pub async fn fetch_page(session: &Session, page: u32) -> Result<Vec<Notification>> {
    fetch_listing(session, page)
        .await
        .map(|listing| listing.notifications)
}

async fn fetch_listing(session: &Session, page: u32) -> Result<Listing> {
    tracing::info!(page, "Fetching notifications page");
    let page_number = page.to_string();
    let response = session
        .get(NOTIFICATIONS_PATH, &[("p", page_number.as_str())])
        .await?;
    classify(&response)?;
    parse_listing(&response.body)
}

struct Cursor<'a> {
    session: &'a Session,
    options: PageOptions,
    /// `None` once the page counter can't advance.
    next_page: Option<u32>,
    buffered: VecDeque<Notification>,
    yielded: usize,
    finished: bool,
}

impl Cursor<'_> {
    fn exhausted(&self) -> bool {
        self.finished || self.options.limit.is_some_and(|limit| self.yielded >= limit)
    }

    fn fail(mut self, page: u32, err: Error) -> Option<(Result<Notification>, Self)> {
        match self.options.policy {
            FailurePolicy::FailOpen => {
                tracing::warn!(page, error = %err, "Notifications request failed");
                None
            }
            FailurePolicy::FailClosed => {
                self.finished = true;
                Some((Err(err), self))
            }
        }
    }
}

/// Lazy stream of notifications, newest first.
///
/// Pages are fetched on demand starting at `options.start_page`. The stream
/// ends when the limit is reached, a page comes back empty, the last
/// representable page has been read, or a page fails under
/// [`FailurePolicy::FailOpen`]. A page whose entries all fail to parse counts
/// as a failure. Dropping the stream at any point is safe.
pub fn notifications(
    session: &Session,
    options: PageOptions,
) -> impl Stream<Item = Result<Notification>> + '_ {
    let cursor = Cursor {
        session,
        options,
        next_page: Some(options.start_page),
        buffered: VecDeque::new(),
        yielded: 0,
        finished: false,
    };

    stream::unfold(cursor, |mut cursor| async move {
        loop {
            if cursor.exhausted() {
                return None;
            }

            if let Some(notification) = cursor.buffered.pop_front() {
                cursor.yielded += 1;
                return Some((Ok(notification), cursor));
            }

            let Some(page) = cursor.next_page else {
                tracing::debug!("No page number left to fetch");
                return None;
            };

            match fetch_listing(cursor.session, page).await {
                Ok(listing) if listing.notifications.is_empty() && listing.skipped > 0 => {
                    let err = Error::markup(format!(
                        "none of the {} entries on page {page} could be parsed",
                        listing.skipped
                    ));
                    return cursor.fail(page, err);
                }
                Ok(listing) if listing.notifications.is_empty() => {
                    tracing::debug!(page, "Reached an empty notifications page");
                    return None;
                }
                Ok(listing) => {
                    cursor.buffered.extend(listing.notifications);
                    cursor.next_page = page.checked_add(1);
                }
                Err(err) => return cursor.fail(page, err),
            }
        }
    })
}
