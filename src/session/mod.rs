//! HTTP session against the forum.
//!
//! A [`Session`] owns the cookie jar, default headers and base address. It
//! returns raw pages and leaves interpretation to the callers, which use
//! [`classify`] after every fetch whose meaning depends on being signed in.

mod cache;
mod jar;

pub use cache::{SessionCache, SessionData, StoredCookie};
pub use jar::{parse_cookie_header, CookieJar};

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Url};

use crate::error::{Error, Result};
use crate::extract::{NEEDS_2FA_MARKER, NEEDS_LOGIN_MARKER};

pub const DEFAULT_BASE_URL: &str = "https://www.v2ex.com";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/84.0.4147.89 Safari/537.36";

/// Cookie that carries the member's credentials.
pub const CREDENTIAL_COOKIE: &str = "A2";
/// Cookie the site expects once two-factor authentication is enabled.
pub const SECOND_FACTOR_COOKIE: &str = "A2O";

/// Cookies seeded into every session unless the caller supplies them.
const DEFAULT_COOKIES: &[(&str, &str)] = &[("V2EX_LANG", "zhcn")];

/// Connection settings for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub base_url: String,
    pub user_agent: String,
    /// Transport timeout; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: None,
        }
    }
}

impl SessionOptions {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// A fetched page after redirects.
#[derive(Debug, Clone)]
pub struct Page {
    /// Path of the final URL.
    pub path: String,
    pub body: String,
}

impl Page {
    pub fn contains(&self, marker: &str) -> bool {
        self.body.contains(marker)
    }
}

pub struct Session {
    client: Client,
    base: Url,
    headers: HeaderMap,
    jar: Arc<CookieJar>,
}

impl Session {
    /// A session with only the default cookies, ready for signing in.
    pub fn anonymous(options: &SessionOptions) -> Result<Self> {
        Self::with_cookies(options, Vec::new())
    }

    /// A session replaying a `name=value; name=value` cookie string.
    ///
    /// The credential cookie is mandatory; default cookies are added when
    /// missing.
    pub fn from_cookie_header(options: &SessionOptions, cookies: &str) -> Result<Self> {
        let cookies = parse_cookie_header(cookies)?;
        if !cookies.iter().any(|(name, _)| name == CREDENTIAL_COOKIE) {
            return Err(Error::InvalidCookies(format!(
                "the {CREDENTIAL_COOKIE} cookie is required"
            )));
        }
        Self::with_cookies(options, cookies)
    }

    /// A session restored from cached session data.
    pub fn from_session_data(options: &SessionOptions, data: &SessionData) -> Result<Self> {
        Self::from_cookie_header(options, &data.cookie_header())
    }

    fn with_cookies(options: &SessionOptions, cookies: Vec<(String, String)>) -> Result<Self> {
        let base = Url::parse(&options.base_url)
            .map_err(|e| Error::InvalidRequest(format!("base URL {:?}: {e}", options.base_url)))?;

        let jar = CookieJar::with_cookies(cookies);
        for (name, value) in DEFAULT_COOKIES {
            if !jar.contains(name) {
                jar.insert(*name, *value);
            }
        }
        let jar = Arc::new(jar);

        let mut builder = Client::builder()
            .user_agent(options.user_agent.clone())
            .cookie_provider(Arc::clone(&jar));
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        let mut headers = HeaderMap::new();
        headers.insert(header::REFERER, header_value(base.as_str())?);
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en,zh;q=0.9"),
        );

        Ok(Self {
            client,
            base,
            headers,
            jar,
        })
    }

    /// Absolute URL for a site path such as `/signin`.
    pub fn url_for(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| Error::InvalidRequest(format!("path {path:?}: {e}")))
    }

    /// Replaces a default header sent with every request.
    pub fn set_header(&mut self, name: HeaderName, value: &str) -> Result<()> {
        self.headers.insert(name, header_value(value)?);
        Ok(())
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.jar.get(name)
    }

    /// Current cookies as a `Cookie` header string, suitable for re-import.
    pub fn cookie_header(&self) -> String {
        self.jar.header()
    }

    pub fn to_session_data(&self, member: Option<&str>) -> SessionData {
        let data = self
            .jar
            .entries()
            .into_iter()
            .fold(SessionData::new(), |data, (name, value)| {
                data.with_cookie(name, value)
            });
        SessionData {
            member: member.map(str::to_string),
            captured_at: Some(chrono::Utc::now().timestamp()),
            ..data
        }
    }

    pub async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Page> {
        let url = self.url_for(path)?;
        self.send(self.client.get(url).query(params)).await
    }

    pub async fn post(&self, path: &str, form: &[(&str, &str)]) -> Result<Page> {
        let url = self.url_for(path)?;
        self.send(self.client.post(url).form(form)).await
    }

    /// Raw bytes of a resource, e.g. a CAPTCHA image.
    pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.url_for(path)?;
        let response = self
            .client
            .get(url)
            .headers(self.headers.clone())
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Page> {
        let response = request
            .headers(self.headers.clone())
            .send()
            .await?
            .error_for_status()?;

        let status = response.status();
        let path = response.url().path().to_string();
        let body = response.text().await?;
        tracing::debug!(%status, path = %path, bytes = body.len(), "Fetched page");

        Ok(Page { path, body })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

/// Maps the site's "please sign in" pages to classified errors.
pub fn classify(page: &Page) -> Result<()> {
    if page.contains(NEEDS_LOGIN_MARKER) {
        return Err(Error::NeedsAuthentication);
    }
    if page.contains(NEEDS_2FA_MARKER) {
        return Err(Error::NeedsSecondFactor);
    }
    Ok(())
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::InvalidRequest(format!("header value {value:?}: {e}")))
}
