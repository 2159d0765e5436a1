#![allow(dead_code)]

use v2ex_client::{Session, SessionOptions};
use wiremock::MockServer;

pub const TEST_COOKIES: &str = r#"A2="2|1:0|10:1600000000|2:A2|48:dGVzdA==|abc"; A2O=second"#;

pub fn options(server: &MockServer) -> SessionOptions {
    SessionOptions::default().with_base_url(server.uri())
}

/// A session carrying credential cookies, pointed at the mock server.
pub fn signed_in_session(server: &MockServer) -> Session {
    Session::from_cookie_header(&options(server), TEST_COOKIES).expect("test cookies are valid")
}

/// Top bar shown to a signed-in member.
pub fn top_bar(member: &str, once: u32) -> String {
    format!(
        r##"<div id="Top"><div class="content"><a href="/" name="top">V2EX</a>
<a href="/member/{member}" class="top">{member}</a>&nbsp;&nbsp;&nbsp;<a href="/notes" class="top">记事本</a>
<a href="#;" onclick="if (confirm('确定要从 V2EX 登出？')) {{ location.href= '/signout?once={once}'; }}" class="top">登出</a></div></div>"##
    )
}

pub fn home_page(member: &str) -> String {
    format!(
        r#"<html><head><title>V2EX</title></head><body>{}<div id="Main">ok</div></body></html>"#,
        top_bar(member, 55501)
    )
}

pub fn signin_page(once: u32) -> String {
    format!(
        r#"<html><body><div id="Main"><div class="box"><div class="cell"><form method="post" action="/signin">
<table cellpadding="5" cellspacing="0" border="0" width="100%">
<tr><td width="120" align="right">用户名</td><td align="left"><input type="text" class="sl" name="7f3a9c" value="" autofocus="autofocus" autocorrect="off" spellcheck="false" autocapitalize="off" placeholder="用户名或电子邮箱地址" /></td></tr>
<tr><td width="120" align="right">密码</td><td align="left"><input type="password" class="sl" name="e41b0d" value="" autocorrect="off" spellcheck="false" autocapitalize="off" /></td></tr>
<tr><td width="120" align="right">你是机器人么？</td><td align="left"><div style="background-image: url('/_captcha?once={once}'); background-size: 320px 80px; width: 320px; height: 80px;"></div>
<input type="text" class="sl" name="c09d52" value="" autocorrect="off" spellcheck="false" autocapitalize="off" placeholder="请输入上图中的验证码" /></td></tr>
<tr><td width="120" align="right"></td><td align="left"><input type="hidden" value="{once}" name="once" /><input type="submit" class="super normal button" value="登录" /></td></tr>
</table><input type="hidden" value="/" name="next" /></form></div></div></div></body></html>"#
    )
}

pub fn signin_problem_page(once: u32, problem: &str) -> String {
    signin_page(once).replace(
        r#"<div class="box">"#,
        &format!(r#"<div class="problem">请解决以下问题然后再提交：<ul><li>{problem}</li></ul></div><div class="box">"#),
    )
}

pub fn too_many_attempts_page() -> String {
    r#"<html><body><div class="box"><div class="cell">登录受限</div><div class="inner">由于当前 IP 在短时间内的登录尝试次数太多，目前暂时不能继续尝试。</div></div></body></html>"#
        .to_string()
}

pub fn two_factor_page(once: u32) -> String {
    format!(
        r#"<html><body><div class="box"><div class="header">两步验证登录</div><div class="cell"><form method="post" action="/2fa">
<input type="number" class="sl" name="code" value="" autocomplete="off" />
<input type="hidden" name="once" value="{once}" /><input type="submit" class="super normal button" value="登录" /></form></div></div></body></html>"#
    )
}

pub fn two_factor_rejected_page(once: u32) -> String {
    two_factor_page(once).replace(
        r#"<div class="box">"#,
        r#"<div class="message" onclick="$(this).slideUp('fast');">两步验证码错误，请重新输入</div><div class="box">"#,
    )
}

pub fn needs_login_page() -> String {
    r#"<html><body><div class="box"><div class="message">你要查看的页面需要先登录</div></div></body></html>"#
        .to_string()
}

fn money_box(gold: u64, silver: u64, bronze: u64) -> String {
    let mut figures = String::new();
    if gold > 0 {
        figures.push_str(&format!(r#"{gold} <img src="/static/img/gold@2x.png" height="16" alt="G" border="0" /> "#));
    }
    if gold > 0 || silver > 0 {
        figures.push_str(&format!(r#"{silver} <img src="/static/img/silver@2x.png" height="16" alt="S" border="0" /> "#));
    }
    figures.push_str(&format!(r#"{bronze} <img src="/static/img/bronze@2x.png" height="16" alt="B" border="0" />"#));
    format!(r#"<div id="money"><a href="/balance" class="balance_area bigger">{figures}</a></div>"#)
}

/// Daily mission page before the reward has been taken.
pub fn mission_pending_page(once: u32) -> String {
    format!(
        r#"<html><body>{}<div class="box"><div class="cell"><h1>日常任务</h1></div>
<div class="cell"><input type="button" class="super normal button" value="领取 X 铜币" onclick="location.href = '/mission/daily/redeem?once={once}';" /></div>
<div class="cell">已连续登录 11 天</div></div><div class="box">{}</div></body></html>"#,
        top_bar("alice", once),
        money_box(0, 45, 60),
    )
}

pub fn mission_done_page(days: u32, gold: u64, silver: u64, bronze: u64, just_redeemed: bool) -> String {
    let notice = if just_redeemed {
        r#"<div class="message" onclick="$(this).slideUp('fast');">已成功领取每日登录奖励</div>"#
    } else {
        ""
    };
    format!(
        r#"<html><body>{}{notice}<div class="box"><div class="cell"><h1>日常任务</h1></div>
<div class="cell"><span class="gray"><li class="fa fa-ok-sign"></li> &nbsp;每日登录奖励已领取</span></div>
<div class="cell">已连续登录 {days} 天</div></div><div class="box">{}</div></body></html>"#,
        top_bar("alice", 31337),
        money_box(gold, silver, bronze),
    )
}

/// A mission page the site served without confirming the redemption.
pub fn mission_unconfirmed_page() -> String {
    format!(
        r#"<html><body>{}<div class="box"><div class="cell">日常任务</div></div></body></html>"#,
        top_bar("alice", 31337)
    )
}

pub fn notification_entry(id: u64, author: &str, summary_tail: &str, payload: Option<&str>) -> String {
    let payload = payload
        .map(|p| format!(r#"<div class="sep5"></div><div class="payload">{p}</div>"#))
        .unwrap_or_default();
    format!(
        r#"<div class="cell" id="n_{id}"><table cellpadding="0" cellspacing="0" border="0" width="100%"><tr><td width="32" align="left" valign="top"><a href="/member/{author}"><img src="/avatar/{author}.png" class="avatar" border="0" align="default" /></a></td><td valign="middle"><span class="fade"><a href="/member/{author}"><strong>{author}</strong></a> {summary_tail}</span> &nbsp;<span class="snow">{id} 分钟前</span> <a href="[remove]" onclick="deleteNotification({id}, 9876)" class="node">删除</a>{payload}</td></tr></table></div>"#
    )
}

/// A reply notification in thread `/t/<id>`.
pub fn reply(id: u64) -> String {
    notification_entry(
        id,
        "bob",
        &format!(r#"在 <a href="/t/{id}#reply1">Thread {id}</a> 里回复了你"#),
        Some(&format!("reply number {id}")),
    )
}

pub fn notifications_page(entries: &[String]) -> String {
    format!(
        r#"<html><body>{}<div class="box"><div class="cell">提醒系统</div><div id="notifications">{}</div></div></body></html>"#,
        top_bar("alice", 1),
        entries.concat()
    )
}

pub fn replies_page(ids: &[u64]) -> String {
    notifications_page(&ids.iter().map(|id| reply(*id)).collect::<Vec<_>>())
}
