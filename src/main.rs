use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use dialoguer::console::Term;
use dialoguer::{theme::ColorfulTheme, Input, Password};
use futures::{pin_mut, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use v2ex_client::config::{default_config_path, ResolvedConfig};
use v2ex_client::delta::{self, LogNotifier, Notifier, WebhookNotifier};
use v2ex_client::mission;
use v2ex_client::notifications::{self, FailurePolicy, PageOptions};
use v2ex_client::signin::{self, CaptchaSolver, Credentials, OtpSource};
use v2ex_client::Session;

const COOKIES_ENV: &str = "V2EX_COOKIES";
const USERNAME_ENV: &str = "V2EX_USERNAME";
const PASSWORD_ENV: &str = "V2EX_PASSWORD";

#[derive(Parser)]
#[command(name = "v2ex")]
#[command(about = "V2EX sign-in, daily mission and notifications")]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with username, password and CAPTCHA, then cache the session
    Signin {
        /// Account name or email (defaults to $V2EX_USERNAME, then a prompt)
        #[arg(short, long)]
        username: Option<String>,

        /// Prompt for a two-factor code if the account asks for one
        #[arg(long)]
        two_factor: bool,
    },
    /// Cache a session from a browser cookie string (or $V2EX_COOKIES)
    ImportCookies {
        cookies: Option<String>,
    },
    /// Forget the cached session
    Signout,
    /// Redeem the daily login reward
    Redeem,
    /// List notifications, newest first
    Notifications {
        /// First page to fetch
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Maximum number of notifications
        #[arg(long)]
        limit: Option<usize>,

        /// Fail instead of stopping quietly when a page can't be read
        #[arg(long)]
        fail_closed: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Deliver notifications newer than the stored checkpoint
    Check {
        /// Deliver what could be read when a page fails, instead of aborting.
        /// Notifications on unread pages are then skipped for good.
        #[arg(long)]
        fail_open: bool,
    },
    /// Show current configuration
    Config,
}

/// Saves the CAPTCHA to a temporary file and asks for its text.
struct TerminalCaptchaSolver;

#[async_trait]
impl CaptchaSolver for TerminalCaptchaSolver {
    async fn solve(&self, session: &Session, image_path: &str) -> Result<String> {
        let image = session
            .get_bytes(image_path)
            .await
            .context("Failed to download CAPTCHA")?;

        let mut file = tempfile::Builder::new()
            .prefix("v2ex-captcha-")
            .suffix(".png")
            .tempfile()
            .context("Failed to create CAPTCHA file")?;
        file.write_all(&image)
            .context("Failed to write CAPTCHA file")?;
        eprintln!("CAPTCHA saved to {}", file.path().display());

        let text: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("CAPTCHA text")
            .interact_text_on(&Term::stderr())
            .context("Failed to read CAPTCHA text")?;
        Ok(text.trim().to_string())
    }
}

/// Asks for the current two-factor code on the terminal.
struct PromptOtp;

impl OtpSource for PromptOtp {
    fn current_code(&self) -> String {
        let code = Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt("Two-factor code")
            .interact_text_on(&Term::stderr());
        match code {
            Ok(code) => code.trim().to_string(),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to read two-factor code");
                String::new()
            }
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("v2ex_client=info,v2ex=info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Restores the cached session, falling back to cookies in the environment.
fn load_session(config: &ResolvedConfig) -> Result<Session> {
    let options = config.session_options();
    if let Some(data) = config.session_cache()?.get()? {
        tracing::debug!(member = ?data.member, "Using cached session");
        return Ok(Session::from_session_data(&options, &data)?);
    }
    match std::env::var(COOKIES_ENV) {
        Ok(cookies) => {
            let cookies = SecretString::from(cookies);
            Ok(Session::from_cookie_header(&options, cookies.expose_secret())?)
        }
        Err(_) => anyhow::bail!(
            "No cached session. Run `v2ex signin`, `v2ex import-cookies`, or set {COOKIES_ENV}."
        ),
    }
}

/// Writes the session's current cookies back to the cache.
fn save_session(config: &ResolvedConfig, session: &Session, member: Option<&str>) -> Result<()> {
    let cache = config.session_cache()?;
    let member = match member {
        Some(member) => Some(member.to_string()),
        None => cache.get()?.and_then(|data| data.member),
    };
    cache.set(&session.to_session_data(member.as_deref()))
}

fn read_credentials(username: Option<String>) -> Result<Credentials> {
    let username = match username.or_else(|| std::env::var(USERNAME_ENV).ok()) {
        Some(username) => username,
        None => Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Username")
            .interact_text_on(&Term::stderr())
            .context("Failed to read username")?,
    };
    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) => password,
        Err(_) => Password::with_theme(&ColorfulTheme::default())
            .with_prompt("Password")
            .interact_on(&Term::stderr())
            .context("Failed to read password")?,
    };
    Ok(Credentials::new(username, password))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = ResolvedConfig::load_or_default(&config_path)?;

    match cli.command {
        Command::Signin {
            username,
            two_factor,
        } => {
            let credentials = read_credentials(username)?;
            let otp = two_factor.then_some(&PromptOtp as &dyn OtpSource);
            let (session, member) = signin::open_session(
                &config.session_options(),
                &credentials,
                &TerminalCaptchaSolver,
                otp,
            )
            .await?;
            save_session(&config, &session, Some(&member))?;
            println!("Signed in as {member}");
        }
        Command::ImportCookies { cookies } => {
            let cookies = match cookies {
                Some(cookies) => cookies,
                None => std::env::var(COOKIES_ENV)
                    .with_context(|| format!("Pass a cookie string or set {COOKIES_ENV}"))?,
            };
            let cookies = SecretString::from(cookies);
            let session =
                Session::from_cookie_header(&config.session_options(), cookies.expose_secret())?;
            save_session(&config, &session, None)?;
            println!("Session saved to {}", config.session_cache()?.path().display());
        }
        Command::Signout => {
            config.session_cache()?.delete()?;
            println!("Session removed");
        }
        Command::Redeem => {
            let mut session = load_session(&config)?;
            let result = mission::redeem_daily_mission(&mut session).await?;
            save_session(&config, &session, None)?;
            match result {
                Some(result) => println!(
                    "Logged in {} days in a row, balance {}",
                    result.consecutive_days, result.balance
                ),
                None => anyhow::bail!("The site did not confirm the daily reward"),
            }
        }
        Command::Notifications {
            page,
            limit,
            fail_closed,
            json,
        } => {
            let session = load_session(&config)?;
            let mut options = PageOptions::default().starting_at(page);
            if let Some(limit) = limit {
                options = options.with_limit(limit);
            }
            if fail_closed {
                options = options.with_policy(FailurePolicy::FailClosed);
            }

            let feed = notifications::notifications(&session, options);
            pin_mut!(feed);
            while let Some(notification) = feed.next().await {
                let notification = notification?;
                if json {
                    println!("{}", serde_json::to_string(&notification)?);
                } else {
                    println!("{notification}");
                }
            }
            save_session(&config, &session, None)?;
        }
        Command::Check { fail_open } => {
            let session = load_session(&config)?;
            let policy = if fail_open {
                FailurePolicy::FailOpen
            } else {
                FailurePolicy::FailClosed
            };
            let store = config.checkpoint_store();
            let notifier: Box<dyn Notifier> = match &config.notify.webhook_url {
                Some(url) => Box::new(WebhookNotifier::new(url.clone())),
                None => Box::new(LogNotifier),
            };
            let report =
                delta::deliver_new_notifications(&session, &store, notifier.as_ref(), policy)
                    .await?;
            save_session(&config, &session, None)?;
            if report.bootstrapped {
                println!(
                    "No checkpoint yet; recorded {}",
                    report
                        .checkpoint
                        .map_or_else(|| "nothing".to_string(), |id| id.to_string())
                );
            } else {
                println!("Delivered {} notification(s)", report.delivered);
            }
        }
        Command::Config => {
            println!("Config file: {}", config_path.display());
            println!("Data directory: {}", config.data_dir.display());
            println!("Base URL: {}", config.site.base_url);
            println!("Checkpoint: {}", config.checkpoint_path().display());
            println!(
                "Webhook: {}",
                config.notify.webhook_url.as_deref().unwrap_or("(log only)")
            );
        }
    }

    Ok(())
}
