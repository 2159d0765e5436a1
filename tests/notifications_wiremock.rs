mod support;

use anyhow::Result;
use futures::{StreamExt, TryStreamExt};
use v2ex_client::notifications::{
    fetch_page, notifications, FailurePolicy, NotificationKind, PageOptions,
};
use v2ex_client::Error;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::*;

async fn mount_page(server: &MockServer, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path("/notifications"))
        .and(query_param("p", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(server)
        .await;
}

async fn requested_pages(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/notifications")
        .filter_map(|r| {
            r.url
                .query_pairs()
                .find(|(k, _)| k == "p")
                .map(|(_, v)| v.into_owned())
        })
        .collect()
}

#[tokio::test]
async fn fetch_page_parses_entries() -> Result<()> {
    let server = MockServer::start().await;
    mount_page(
        &server,
        1,
        notifications_page(&[
            notification_entry(
                9001,
                "carol",
                r#"在回复 <a href="/t/77#reply3">Tokio 调度</a> 时提到了你"#,
                Some(r#"<a href="/member/alice">@alice</a> 你看这个"#),
            ),
            notification_entry(
                9000,
                "dave",
                r#"感谢了你在主题 › <a href="/t/76#reply9">Rust 入门</a> 里的回复"#,
                None,
            ),
        ]),
    )
    .await;

    let session = signed_in_session(&server);
    let listing = fetch_page(&session, 1).await?;

    assert_eq!(listing.len(), 2);
    assert_eq!(listing[0].id, 9001);
    assert_eq!(listing[0].author, "carol");
    assert_eq!(listing[0].kind, NotificationKind::Mention);
    assert_eq!(listing[0].thread, "Tokio 调度");
    assert_eq!(listing[0].link, "/t/77#reply3");
    assert_eq!(listing[0].content, "@alice 你看这个");
    assert_eq!(listing[1].kind, NotificationKind::Thank);
    assert_eq!(listing[1].time, "9000 分钟前");

    Ok(())
}

#[tokio::test]
async fn stream_walks_pages_until_empty_page() -> Result<()> {
    let server = MockServer::start().await;
    mount_page(&server, 1, replies_page(&[30, 29, 28])).await;
    mount_page(&server, 2, replies_page(&[27, 26])).await;
    mount_page(&server, 3, replies_page(&[])).await;

    let session = signed_in_session(&server);
    let ids: Vec<u64> = notifications(&session, PageOptions::default())
        .map_ok(|n| n.id)
        .try_collect()
        .await?;

    assert_eq!(ids, vec![30, 29, 28, 27, 26]);
    assert_eq!(requested_pages(&server).await, vec!["1", "2", "3"]);

    Ok(())
}

#[tokio::test]
async fn limit_stops_fetching_further_pages() -> Result<()> {
    let server = MockServer::start().await;
    mount_page(&server, 1, replies_page(&[30, 29, 28])).await;
    mount_page(&server, 2, replies_page(&[27, 26])).await;

    let session = signed_in_session(&server);
    let ids: Vec<u64> = notifications(&session, PageOptions::default().with_limit(2))
        .map_ok(|n| n.id)
        .try_collect()
        .await?;

    assert_eq!(ids, vec![30, 29]);
    assert_eq!(requested_pages(&server).await, vec!["1"]);

    Ok(())
}

#[tokio::test]
async fn start_page_skips_earlier_pages() -> Result<()> {
    let server = MockServer::start().await;
    mount_page(&server, 2, replies_page(&[27, 26])).await;
    mount_page(&server, 3, replies_page(&[])).await;

    let session = signed_in_session(&server);
    let ids: Vec<u64> = notifications(&session, PageOptions::default().starting_at(2))
        .map_ok(|n| n.id)
        .try_collect()
        .await?;

    assert_eq!(ids, vec![27, 26]);
    assert_eq!(requested_pages(&server).await, vec!["2", "3"]);

    Ok(())
}

#[tokio::test]
async fn fail_open_ends_stream_after_failed_page() -> Result<()> {
    let server = MockServer::start().await;
    mount_page(&server, 1, replies_page(&[30, 29])).await;
    Mock::given(method("GET"))
        .and(path("/notifications"))
        .and(query_param("p", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let session = signed_in_session(&server);
    let items: Vec<_> = notifications(&session, PageOptions::default())
        .collect()
        .await;

    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|item| item.is_ok()));
    assert_eq!(requested_pages(&server).await, vec!["1", "2"]);

    Ok(())
}

#[tokio::test]
async fn fail_closed_yields_error_then_ends() -> Result<()> {
    let server = MockServer::start().await;
    mount_page(&server, 1, replies_page(&[30])).await;
    Mock::given(method("GET"))
        .and(path("/notifications"))
        .and(query_param("p", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let session = signed_in_session(&server);
    let options = PageOptions::default().with_policy(FailurePolicy::FailClosed);
    let items: Vec<_> = notifications(&session, options).collect().await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().map(|n| n.id).ok(), Some(30));
    assert!(items[1].as_ref().is_err_and(|err| err.is_transport()));

    Ok(())
}

#[tokio::test]
async fn login_wall_is_reported_when_failing_closed() -> Result<()> {
    let server = MockServer::start().await;
    mount_page(&server, 1, needs_login_page()).await;

    let session = signed_in_session(&server);
    let options = PageOptions::default().with_policy(FailurePolicy::FailClosed);
    let items: Vec<_> = notifications(&session, options).collect().await;

    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Err(Error::NeedsAuthentication)));

    Ok(())
}

#[tokio::test]
async fn dropping_the_stream_early_is_harmless() -> Result<()> {
    let server = MockServer::start().await;
    mount_page(&server, 1, replies_page(&[30, 29, 28])).await;

    let session = signed_in_session(&server);
    {
        let stream = notifications(&session, PageOptions::default());
        futures::pin_mut!(stream);
        let first = stream.next().await.expect("one item")?;
        assert_eq!(first.id, 30);
    }

    assert_eq!(requested_pages(&server).await, vec!["1"]);

    Ok(())
}

#[tokio::test]
async fn page_of_unreadable_entries_is_not_treated_as_the_end() -> Result<()> {
    let server = MockServer::start().await;
    mount_page(&server, 1, replies_page(&[30])).await;
    mount_page(
        &server,
        2,
        notifications_page(&[
            r#"<div class="cell" id="n_29">layout changed</div>"#.to_string(),
            r#"<div class="cell" id="n_28">layout changed</div>"#.to_string(),
        ]),
    )
    .await;

    let session = signed_in_session(&server);
    let options = PageOptions::default().with_policy(FailurePolicy::FailClosed);
    let items: Vec<_> = notifications(&session, options).collect().await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().map(|n| n.id).ok(), Some(30));
    assert!(matches!(&items[1], Err(Error::Markup(msg)) if msg.contains("page 2")));

    let open: Vec<u64> = notifications(&session, PageOptions::default())
        .map_ok(|n| n.id)
        .try_collect()
        .await?;
    assert_eq!(open, vec![30]);

    Ok(())
}

#[tokio::test]
async fn last_page_number_ends_the_stream() -> Result<()> {
    let server = MockServer::start().await;
    mount_page(&server, u32::MAX, replies_page(&[2, 1])).await;

    let session = signed_in_session(&server);
    let ids: Vec<u64> = notifications(&session, PageOptions::default().starting_at(u32::MAX))
        .map_ok(|n| n.id)
        .try_collect()
        .await?;

    assert_eq!(ids, vec![2, 1]);
    assert_eq!(requested_pages(&server).await, vec![u32::MAX.to_string()]);

    Ok(())
}
