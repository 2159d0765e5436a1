//! Field extraction from V2EX pages.
//!
//! Every function here is stateless and works on the body of the page most
//! recently fetched. Tokens and form field names rotate per render, so callers
//! extract them again from each new page instead of holding on to them.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::markup;

/// Present on every page rendered for a signed-in member.
pub(crate) const LOGGED_IN_MARKER: &str = "确定要从 V2EX 登出？";
pub(crate) const NEEDS_LOGIN_MARKER: &str = "你要查看的页面需要先登录";
pub(crate) const NEEDS_2FA_MARKER: &str = "两步验证登录";
pub(crate) const TOO_MANY_ATTEMPTS_MARKER: &str =
    "由于当前 IP 在短时间内的登录尝试次数太多，目前暂时不能继续尝试";
pub(crate) const MISSION_REDEEMED_MARKER: &str = "每日登录奖励已领取";
pub(crate) const MISSION_SUCCESS_MARKER: &str = "已成功领取每日登录奖励";

const USERNAME_PLACEHOLDER: &str = "用户名或电子邮箱地址";
const CAPTCHA_PLACEHOLDER: &str = "请输入上图中的验证码";

static ONCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)/(?:_captcha|signout)\?once=(\d+)").expect("once pattern is valid")
});

static MEMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)href="/member/([^"]+)""#).expect("member pattern is valid")
});

static DAYS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"已连续登录 (\d+) 天").expect("days pattern is valid"));

/// Field names of the sign-in form for one page render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInForm {
    pub once: String,
    pub username_field: String,
    pub password_field: String,
    pub captcha_field: String,
}

impl SignInForm {
    /// Path of the CAPTCHA image bound to this form's token.
    pub fn captcha_path(&self) -> String {
        format!("/_captcha?once={}", self.once)
    }
}

/// Account balance in the site's three coin tiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Balance {
    pub gold: u64,
    pub silver: u64,
    pub bronze: u64,
}

impl Balance {
    /// Builds a balance from the figures shown on the page.
    ///
    /// The site leaves out leading tiers that are zero, so missing figures are
    /// padded on the left. Extra leading figures are ignored.
    pub fn from_figures(figures: &[u64]) -> Self {
        let mut tiers = [0u64; 3];
        let take = figures.len().min(3);
        tiers[3 - take..].copy_from_slice(&figures[figures.len() - take..]);
        let [gold, silver, bronze] = tiers;
        Self {
            gold,
            silver,
            bronze,
        }
    }

    pub fn to_array(self) -> [u64; 3] {
        [self.gold, self.silver, self.bronze]
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.gold, self.silver, self.bronze)
    }
}

/// The single-use `once` token embedded in the page.
pub fn once_token(html: &str) -> Option<String> {
    if let Some(caps) = ONCE_RE.captures(html) {
        return Some(caps[1].to_string());
    }

    markup::elements(html, "input")
        .into_iter()
        .find(|input| input.attr("name") == Some("once"))
        .and_then(|input| input.attr("value").map(str::to_string))
        .filter(|value| !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()))
}

pub fn sign_in_form(html: &str) -> Result<SignInForm> {
    let once = once_token(html).ok_or_else(|| Error::markup("sign-in page has no once token"))?;
    let inputs = markup::elements(html, "input");

    Ok(SignInForm {
        username_field: input_name(&inputs, "username", |i| {
            i.attr("placeholder") == Some(USERNAME_PLACEHOLDER)
        })?,
        password_field: input_name(&inputs, "password", |i| {
            i.attr("type").is_some_and(|t| t.eq_ignore_ascii_case("password"))
        })?,
        captcha_field: input_name(&inputs, "captcha", |i| {
            i.attr("placeholder") == Some(CAPTCHA_PLACEHOLDER)
        })?,
        once,
    })
}

fn input_name(
    inputs: &[markup::Element<'_>],
    what: &str,
    matches: impl Fn(&markup::Element<'_>) -> bool,
) -> Result<String> {
    inputs
        .iter()
        .find(|input| matches(input))
        .and_then(|input| input.attr("name"))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::markup(format!("sign-in form has no {what} field")))
}

/// Text of the `div.problem` box shown above a rejected form.
pub fn problem_message(html: &str) -> Option<String> {
    markup::elements(html, "div")
        .into_iter()
        .find(|div| div.has_class("problem"))
        .map(|div| div.stripped_text())
        .filter(|text| !text.is_empty())
}

/// Text of the clickable message box shown after a rejected one-time code.
pub fn two_factor_message(html: &str) -> Option<String> {
    markup::elements(html, "div")
        .into_iter()
        .find(|div| div.has_class("message") && div.has_attr("onclick"))
        .map(|div| div.stripped_text())
        .filter(|text| !text.is_empty())
}

/// Handle from the first `/member/<name>` link on the page.
pub fn member_handle(html: &str) -> Option<String> {
    MEMBER_RE.captures(html).map(|caps| caps[1].to_string())
}

pub fn consecutive_days(html: &str) -> Option<u32> {
    DAYS_RE
        .captures(html)
        .and_then(|caps| caps[1].parse().ok())
}

/// Balance shown in the link inside the `#money` box.
pub fn balance(html: &str) -> Option<Balance> {
    let money = markup::find_by_id(html, "money")?;
    let link = markup::elements(money.inner, "a").into_iter().next()?;
    Some(parse_balance(&markup::spaced_text(link.inner)))
}

/// Parses whitespace-separated coin figures, ignoring anything non-numeric.
pub fn parse_balance(text: &str) -> Balance {
    let figures: Vec<u64> = text
        .split_whitespace()
        .filter_map(|figure| figure.parse().ok())
        .collect();
    Balance::from_figures(&figures)
}
