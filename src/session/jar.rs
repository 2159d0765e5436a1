//! Cookie jar scoped to a single site.
//!
//! Values are stored exactly as received so an imported cookie string can be
//! exported again byte for byte. Domain and path attributes are ignored since
//! the jar only ever talks to one site. Expiry is only honoured when a
//! response deletes a cookie (`Max-Age=0` or an `Expires` date in the past);
//! otherwise it is discovered when the site starts rejecting the session.

use std::sync::Mutex;

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::header::HeaderValue;
use reqwest::Url;

use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: Mutex<Vec<(String, String)>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cookies(cookies: impl IntoIterator<Item = (String, String)>) -> Self {
        let jar = Self::new();
        for (name, value) in cookies {
            jar.insert(name, value);
        }
        jar
    }

    /// Inserts or replaces a cookie, keeping the original position on replace.
    pub fn insert(&self, name: impl Into<String>, value: impl Into<String>) {
        let (name, value) = (name.into(), value.into());
        let mut cookies = self.cookies.lock().expect("cookie jar lock poisoned");
        match cookies.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => cookies.push((name, value)),
        }
    }

    /// Removes a cookie; returns whether it was present.
    pub fn remove(&self, name: &str) -> bool {
        let mut cookies = self.cookies.lock().expect("cookie jar lock poisoned");
        let before = cookies.len();
        cookies.retain(|(n, _)| n != name);
        cookies.len() != before
    }

    pub fn get(&self, name: &str) -> Option<String> {
        let cookies = self.cookies.lock().expect("cookie jar lock poisoned");
        cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Snapshot of all cookies in insertion order.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.cookies
            .lock()
            .expect("cookie jar lock poisoned")
            .clone()
    }

    /// Cookies formatted as a `Cookie` request header value.
    pub fn header(&self) -> String {
        let cookies = self.cookies.lock().expect("cookie jar lock poisoned");
        cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl reqwest::cookie::CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, _url: &Url) {
        for header in cookie_headers {
            let Ok(raw) = header.to_str() else { continue };
            match parse_set_cookie(raw) {
                Some(SetCookie::Store(name, value)) => {
                    tracing::debug!(cookie = %name, "Cookie updated by response");
                    self.insert(name, value);
                }
                Some(SetCookie::Remove(name)) => {
                    if self.remove(&name) {
                        tracing::debug!(cookie = %name, "Cookie deleted by response");
                    }
                }
                None => {}
            }
        }
    }

    fn cookies(&self, _url: &Url) -> Option<HeaderValue> {
        let header = self.header();
        if header.is_empty() {
            return None;
        }
        HeaderValue::from_str(&header).ok()
    }
}

/// Parses a `name=value; name=value` string as sent in a `Cookie` header.
pub fn parse_cookie_header(header: &str) -> Result<Vec<(String, String)>> {
    header
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::InvalidCookies(format!("expected name=value, got {pair:?}")))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::InvalidCookies(format!("empty cookie name in {pair:?}")));
            }
            Ok((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

#[derive(Debug, PartialEq, Eq)]
enum SetCookie {
    Store(String, String),
    Remove(String),
}

/// Reads a `Set-Cookie` header. Attributes other than expiry are dropped.
fn parse_set_cookie(raw: &str) -> Option<SetCookie> {
    let mut parts = raw.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut max_age = None;
    let mut expires = None;
    for attr in parts {
        let (key, val) = attr.split_once('=').unwrap_or((attr, ""));
        let key = key.trim();
        if key.eq_ignore_ascii_case("max-age") {
            max_age = val.trim().parse::<i64>().ok();
        } else if key.eq_ignore_ascii_case("expires") {
            expires = parse_cookie_date(val.trim());
        }
    }

    // Max-Age wins over Expires when both are present.
    let expired = match max_age {
        Some(seconds) => seconds <= 0,
        None => expires.is_some_and(|at| at <= Utc::now()),
    };
    if expired {
        return Some(SetCookie::Remove(name.to_string()));
    }
    Some(SetCookie::Store(name.to_string(), value.trim().to_string()))
}

/// `Thu, 01 Jan 1970 00:00:00 GMT`, or the older dashed form.
fn parse_cookie_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc2822(value) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%a, %d-%b-%Y %H:%M:%S GMT")
        .ok()
        .map(|at| at.and_utc())
}
