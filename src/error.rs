//! Error taxonomy for site operations.
//!
//! Transport problems are kept apart from the site-level classifications so
//! callers can decide whether to re-authenticate, ask for a second factor, or
//! simply try again later.

/// Why a sign-in attempt was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignInFailure {
    /// The site throttled sign-in attempts from this address.
    #[error("too many sign-in attempts from this address, try again later")]
    TooManyAttempts,
    /// Credentials or CAPTCHA were rejected; carries the site's message.
    #[error("{0}")]
    Rejected(String),
    /// The account has two-factor authentication but no OTP source was given.
    #[error("two-factor authentication is enabled but no OTP source was supplied")]
    SecondFactorMandatory,
    /// The one-time code was rejected; carries the site's message.
    #[error("two-factor code rejected: {0}")]
    SecondFactorRejected(String),
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Network failure, timeout or a non-2xx status.
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The site no longer accepts the session cookies.
    #[error("session is not signed in")]
    NeedsAuthentication,
    /// The site wants the two-factor step before serving this page.
    #[error("session requires two-factor authentication")]
    NeedsSecondFactor,
    #[error("sign in failed: {0}")]
    SignInFailed(SignInFailure),
    /// A page did not contain an element the protocol depends on.
    #[error("unexpected page markup: {0}")]
    Markup(String),
    #[error("invalid cookie string: {0}")]
    InvalidCookies(String),
    /// Failure reported by a pluggable collaborator (solver, store, notifier).
    #[error(transparent)]
    External(#[from] anyhow::Error),
}

impl Error {
    pub(crate) fn markup(what: impl Into<String>) -> Self {
        Self::Markup(what.into())
    }

    /// True for errors raised below the site protocol (network, HTTP status).
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// True when the session has to be re-established before retrying.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::NeedsAuthentication | Self::NeedsSecondFactor)
    }
}

impl From<SignInFailure> for Error {
    fn from(failure: SignInFailure) -> Self {
        Self::SignInFailed(failure)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
