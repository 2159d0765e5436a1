//! Sign-in state machine.
//!
//! ```text
//! Start -> FormLoaded -> CredentialsSubmitted -> Authenticated
//!                                      \-> SecondFactorRequired -> Authenticated
//! ```
//!
//! Every step works from the page returned by the previous one: the `once`
//! token and the form field names change on each render. A failing step ends
//! the attempt; nothing is retried here.

use async_trait::async_trait;
use reqwest::header;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{Error, Result, SignInFailure};
use crate::extract::{self, SignInForm, LOGGED_IN_MARKER, TOO_MANY_ATTEMPTS_MARKER};
use crate::session::{Page, Session, SessionOptions};

const SIGNIN_PATH: &str = "/signin";
const SECOND_FACTOR_PATH: &str = "/2fa";
/// Where the site sends us after a successful sign-in.
const POST_SIGNIN_TARGET: &str = "/";

/// Turns a CAPTCHA image into text.
///
/// The solver may fetch the image through the session it is given. Whatever
/// it returns is submitted unchanged.
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    async fn solve(&self, session: &Session, image_path: &str) -> anyhow::Result<String>;
}

/// Source of one-time codes for two-factor authentication.
pub trait OtpSource: Send + Sync {
    fn current_code(&self) -> String;
}

impl<F> OtpSource for F
where
    F: Fn() -> String + Send + Sync,
{
    fn current_code(&self) -> String {
        self()
    }
}

pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInState {
    Start,
    FormLoaded,
    CredentialsSubmitted,
    SecondFactorRequired,
    Authenticated,
}

enum Step {
    Start,
    FormLoaded(SignInForm),
    CredentialsSubmitted(Page),
    SecondFactorRequired(Page),
    Authenticated(Page),
}

impl Step {
    fn state(&self) -> SignInState {
        match self {
            Step::Start => SignInState::Start,
            Step::FormLoaded(_) => SignInState::FormLoaded,
            Step::CredentialsSubmitted(_) => SignInState::CredentialsSubmitted,
            Step::SecondFactorRequired(_) => SignInState::SecondFactorRequired,
            Step::Authenticated(_) => SignInState::Authenticated,
        }
    }
}

/// Signs `session` in and returns the member handle.
///
/// The session is borrowed exclusively because each request depends on the
/// token scraped from the response before it.
pub async fn sign_in(
    session: &mut Session,
    credentials: &Credentials,
    captcha: &dyn CaptchaSolver,
    otp: Option<&dyn OtpSource>,
) -> Result<String> {
    let referer = session.url_for(SIGNIN_PATH)?;
    session.set_header(header::REFERER, referer.as_str())?;

    let mut step = Step::Start;
    loop {
        tracing::debug!(state = ?step.state(), "Sign-in step");
        step = match step {
            Step::Start => Step::FormLoaded(load_form(session).await?),
            Step::FormLoaded(form) => {
                let page = submit_credentials(session, credentials, captcha, form).await?;
                Step::CredentialsSubmitted(page)
            }
            Step::CredentialsSubmitted(page) => {
                if page.path == SECOND_FACTOR_PATH {
                    Step::SecondFactorRequired(page)
                } else if is_logged_in(&page) {
                    Step::Authenticated(page)
                } else {
                    let message = extract::problem_message(&page.body)
                        .unwrap_or_else(|| "credentials were not accepted".to_string());
                    return Err(SignInFailure::Rejected(message).into());
                }
            }
            Step::SecondFactorRequired(page) => {
                let otp = otp.ok_or(SignInFailure::SecondFactorMandatory)?;
                Step::Authenticated(submit_second_factor(session, otp, &page).await?)
            }
            Step::Authenticated(page) => {
                let member = extract::member_handle(&page.body)
                    .ok_or_else(|| Error::markup("signed-in page has no member link"))?;
                tracing::info!(member = %member, "Signed in");
                return Ok(member);
            }
        };
    }
}

/// Creates a fresh session and signs it in.
pub async fn open_session(
    options: &SessionOptions,
    credentials: &Credentials,
    captcha: &dyn CaptchaSolver,
    otp: Option<&dyn OtpSource>,
) -> Result<(Session, String)> {
    let mut session = Session::anonymous(options)?;
    let member = sign_in(&mut session, credentials, captcha, otp).await?;
    Ok((session, member))
}

async fn load_form(session: &Session) -> Result<SignInForm> {
    let page = session.get(SIGNIN_PATH, &[]).await?;
    if page.contains(TOO_MANY_ATTEMPTS_MARKER) {
        tracing::warn!("Sign-in is rate limited for this address");
        return Err(SignInFailure::TooManyAttempts.into());
    }
    extract::sign_in_form(&page.body)
}

async fn submit_credentials(
    session: &Session,
    credentials: &Credentials,
    captcha: &dyn CaptchaSolver,
    form: SignInForm,
) -> Result<Page> {
    let captcha_text = captcha.solve(session, &form.captcha_path()).await?;
    tracing::info!(captcha = %captcha_text, "Recognized captcha");

    let fields = [
        ("next", POST_SIGNIN_TARGET),
        ("once", form.once.as_str()),
        (form.username_field.as_str(), credentials.username.as_str()),
        (form.password_field.as_str(), credentials.password.expose_secret()),
        (form.captcha_field.as_str(), captcha_text.as_str()),
    ];
    session.post(SIGNIN_PATH, &fields).await
}

async fn submit_second_factor(
    session: &Session,
    otp: &dyn OtpSource,
    page: &Page,
) -> Result<Page> {
    let once = extract::once_token(&page.body)
        .ok_or_else(|| Error::markup("two-factor page has no once token"))?;
    let code = otp.current_code();

    let page = session
        .post(SECOND_FACTOR_PATH, &[("code", code.as_str()), ("once", once.as_str())])
        .await?;
    if !is_logged_in(&page) {
        let message = extract::two_factor_message(&page.body)
            .unwrap_or_else(|| "code was not accepted".to_string());
        return Err(SignInFailure::SecondFactorRejected(message).into());
    }
    Ok(page)
}

fn is_logged_in(page: &Page) -> bool {
    page.path != SECOND_FACTOR_PATH && page.contains(LOGGED_IN_MARKER)
}
