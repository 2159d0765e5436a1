//! Parser for the `/notifications` listing.
//!
//! Each entry looks like:
//!
//! ```html
//! <div class="cell" id="n_1234">...<td valign="middle">
//!   <span class="fade"><a href="/member/bob"><strong>bob</strong></a> 在
//!     <a href="/t/1#reply2">Title</a> 里回复了你</span>
//!   <span class="snow">3 小时前</span>
//!   <div class="payload">text <a href="/member/alice">@alice</a></div>
//! </td>...</div>
//! ```

use crate::error::{Error, Result};
use crate::markup::{self, Element, Node};

use super::{Notification, NotificationKind};

const CONTAINER_ID: &str = "notifications";
const ENTRY_ID_PREFIX: &str = "n_";

/// Entries read from one listing page.
#[derive(Debug, Default)]
pub(crate) struct Listing {
    pub notifications: Vec<Notification>,
    /// Entries that looked like notifications but could not be read.
    pub skipped: usize,
}

/// Parses every entry on a listing page, newest first.
///
/// Entries are parsed independently; a malformed one is logged and skipped.
/// A page without the listing container is an error.
pub fn parse_page(html: &str) -> Result<Vec<Notification>> {
    parse_listing(html).map(|listing| listing.notifications)
}

pub(crate) fn parse_listing(html: &str) -> Result<Listing> {
    let container = markup::find_by_id(html, CONTAINER_ID)
        .ok_or_else(|| Error::markup("page has no notifications container"))?;

    let mut listing = Listing::default();
    let entries = markup::children(container.inner)
        .into_iter()
        .filter_map(|node| match node {
            Node::Element(el) if el.name == "div" => Some(el),
            _ => None,
        });

    for entry in entries {
        // Divs without an id are separators, not entries.
        let Some(raw_id) = entry.attr("id") else { continue };
        let id = raw_id
            .strip_prefix(ENTRY_ID_PREFIX)
            .and_then(|id| id.parse::<u64>().ok());
        let Some(id) = id else {
            tracing::warn!(id = raw_id, "Skipping entry with malformed id");
            listing.skipped += 1;
            continue;
        };
        match parse_entry(id, &entry) {
            Ok(notification) => listing.notifications.push(notification),
            Err(err) => {
                tracing::warn!(id, error = %err, "Skipping unparseable notification");
                listing.skipped += 1;
            }
        }
    }

    if listing.notifications.is_empty() && listing.skipped > 0 {
        tracing::warn!(
            skipped = listing.skipped,
            "No notification on the page could be parsed"
        );
    }

    Ok(listing)
}

fn parse_entry(id: u64, entry: &Element<'_>) -> Result<Notification> {
    let body = markup::elements(entry.inner, "td")
        .into_iter()
        .find(|td| td.attr("valign") == Some("middle"))
        .ok_or_else(|| Error::markup(format!("notification {id} has no body cell")))?;

    let spans = markup::elements(body.inner, "span");
    let (Some(summary), Some(time)) = (spans.first(), spans.get(1)) else {
        return Err(Error::markup(format!("notification {id} is missing summary or time")));
    };

    let summary = Summary::parse(summary.inner)
        .ok_or_else(|| Error::markup(format!("notification {id} has an unexpected summary")))?;

    let content = markup::elements(body.inner, "div")
        .into_iter()
        .find(|div| div.has_class("payload"))
        .map(|payload| payload_text(payload.inner))
        .unwrap_or_default();

    Ok(Notification {
        id,
        time: time.stripped_text(),
        kind: NotificationKind::classify(&summary.before, &summary.after),
        thread: summary.thread,
        content,
        author: summary.author,
        link: summary.link,
    })
}

/// The `author <phrase> thread <phrase>` line of an entry.
struct Summary {
    author: String,
    before: String,
    thread: String,
    link: String,
    after: String,
}

impl Summary {
    fn parse(fragment: &str) -> Option<Self> {
        let nodes = markup::children(fragment);
        let mut links = nodes.iter().enumerate().filter_map(|(i, node)| match node {
            Node::Element(el) if el.name == "a" => Some((i, el)),
            _ => None,
        });

        let (author_at, author) = links.next()?;
        let (thread_at, thread) = links.next()?;

        let text_between = |range: std::ops::Range<usize>| -> String {
            nodes[range]
                .iter()
                .filter_map(|node| match node {
                    Node::Text(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect::<String>()
                .trim()
                .to_string()
        };

        Some(Self {
            author: author.stripped_text(),
            before: text_between(author_at + 1..thread_at),
            thread: thread.stripped_text(),
            link: thread.attr("href").unwrap_or_default().to_string(),
            after: text_between(thread_at + 1..nodes.len()),
        })
    }
}

/// Reply text: trimmed text runs plus the visible text of links, in order.
///
/// The payload mixes free text with `@mention` and URL anchors, so no single
/// node carries the whole message.
fn payload_text(fragment: &str) -> String {
    let mut content = String::new();
    for node in markup::children(fragment) {
        match node {
            Node::Text(text) => content.push_str(text.trim()),
            Node::Element(el) if el.name == "a" => {
                content.push_str(&el.stripped_text());
                content.push(' ');
            }
            Node::Element(_) => {}
        }
    }
    content
}
