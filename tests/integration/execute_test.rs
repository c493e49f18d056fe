// tests/integration/execute_test.rs

//! Integration tests for command execution and reply correlation
//! Tests: rows and done attributes, tag allocation, interleaving, traps, raw send

use super::test_helpers::*;
use rosapi::ApiError;
use std::sync::Arc;
use std::time::Duration;

// ===== Basic Execute Tests =====

#[tokio::test]
async fn test_execute_returns_rows_in_order() {
    let router = MockRouter::spawn(|mut conn| async move {
        conn.accept_login().await;
        let cmd = conn.read_command().await.expect("command");
        assert_eq!(cmd.command, "/interface/print");
        conn.reply_re(cmd.tag(), &[(".id", "*1"), ("name", "ether1")]).await;
        conn.reply_re(cmd.tag(), &[(".id", "*2"), ("name", "ether2")]).await;
        conn.reply_done(cmd.tag(), &[]).await;
        conn.drain().await;
    })
    .await;

    let client = test_client();
    connect(&client, &router).await;

    let rows = client.execute("/interface/print", &[]).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get(".id"), Some("*1"));
    assert_eq!(rows[0].get("name"), Some("ether1"));
    assert_eq!(rows[1].get("name"), Some("ether2"));
    assert_eq!(client.pending_commands(), 0);

    client.close();
    router.finish().await;
}

#[tokio::test]
async fn test_execute_ex_returns_done_attributes() {
    let router = MockRouter::spawn(|mut conn| async move {
        conn.accept_login().await;
        let cmd = conn.read_command().await.expect("command");
        assert_eq!(cmd.command, "/ip/address/add");
        assert_eq!(cmd.attribute("address"), Some("10.0.0.1/24"));
        assert_eq!(cmd.attribute("interface"), Some("ether1"));
        conn.reply_done(cmd.tag(), &[("ret", "*A")]).await;
        conn.drain().await;
    })
    .await;

    let client = test_client();
    connect(&client, &router).await;

    let response = client
        .execute_ex(
            "/ip/address/add",
            &[("address", "10.0.0.1/24"), ("interface", "ether1")],
        )
        .await
        .unwrap();
    assert!(response.rows.is_empty());
    assert_eq!(response.attributes.get("ret").map(String::as_str), Some("*A"));

    client.close();
    router.finish().await;
}

#[tokio::test]
async fn test_query_words_are_sent_verbatim() {
    let router = MockRouter::spawn(|mut conn| async move {
        conn.accept_login().await;
        let cmd = conn.read_command().await.expect("command");
        assert!(cmd.words.iter().any(|w| w == "?type=ether"));
        assert!(cmd.words.iter().any(|w| w == "=.proplist=name"));
        conn.reply_done(cmd.tag(), &[]).await;
        conn.drain().await;
    })
    .await;

    let client = test_client();
    connect(&client, &router).await;
    client
        .execute("/interface/print", &[("?type", "ether"), (".proplist", "name")])
        .await
        .unwrap();

    client.close();
    router.finish().await;
}

// ===== Tag Allocation Tests =====

#[tokio::test]
async fn test_tags_increase_per_command() {
    let router = MockRouter::spawn(|mut conn| async move {
        conn.accept_login().await;
        for expected in ["1", "2", "3"] {
            let cmd = conn.read_command().await.expect("command");
            assert_eq!(cmd.tag(), expected);
            conn.reply_done(cmd.tag(), &[]).await;
        }
        conn.drain().await;
    })
    .await;

    let client = test_client();
    connect(&client, &router).await;
    for _ in 0..3 {
        client.execute("/system/identity/print", &[]).await.unwrap();
    }

    client.close();
    router.finish().await;
}

// ===== Correlation Tests =====

#[tokio::test]
async fn test_concurrent_commands_are_demultiplexed() {
    let router = MockRouter::spawn(|mut conn| async move {
        conn.accept_login().await;
        let first = conn.read_command().await.expect("first command");
        let second = conn.read_command().await.expect("second command");
        let (a, b) = if first.command == "/a/print" {
            (first, second)
        } else {
            (second, first)
        };

        // Replies for both tags arrive interleaved, `b` finishing first.
        conn.reply_re(b.tag(), &[("n", "b1")]).await;
        conn.reply_re(a.tag(), &[("n", "a1")]).await;
        conn.reply_re(b.tag(), &[("n", "b2")]).await;
        conn.reply_done(b.tag(), &[]).await;
        conn.reply_re(a.tag(), &[("n", "a2")]).await;
        conn.reply_re(a.tag(), &[("n", "a3")]).await;
        conn.reply_done(a.tag(), &[]).await;
        conn.drain().await;
    })
    .await;

    let client = Arc::new(test_client());
    connect(&client, &router).await;

    let task_a = tokio::spawn({
        let client = client.clone();
        async move { client.execute("/a/print", &[]).await }
    });
    let task_b = tokio::spawn({
        let client = client.clone();
        async move { client.execute("/b/print", &[]).await }
    });

    let names = |rows: Vec<rosapi::Row>| -> Vec<String> {
        rows.iter().map(|r| r.get("n").unwrap().to_string()).collect()
    };
    assert_eq!(names(task_a.await.unwrap().unwrap()), vec!["a1", "a2", "a3"]);
    assert_eq!(names(task_b.await.unwrap().unwrap()), vec!["b1", "b2"]);
    assert_eq!(client.pending_commands(), 0);

    client.close();
    router.finish().await;
}

#[tokio::test]
async fn test_replies_for_unknown_tags_are_ignored() {
    let router = MockRouter::spawn(|mut conn| async move {
        conn.accept_login().await;
        let cmd = conn.read_command().await.expect("command");
        conn.reply_re("999", &[("stray", "yes")]).await;
        conn.reply_done("999", &[]).await;
        conn.write_sentence(&["!done"]).await;
        conn.reply_re(cmd.tag(), &[("name", "ether1")]).await;
        conn.reply_done(cmd.tag(), &[]).await;
        conn.drain().await;
    })
    .await;

    let client = test_client();
    connect(&client, &router).await;
    let rows = client.execute("/interface/print", &[]).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("stray"), None);
    assert!(client.is_connected());

    client.close();
    router.finish().await;
}

// ===== Trap Tests =====

#[tokio::test]
async fn test_trap_fails_only_that_command() {
    let router = MockRouter::spawn(|mut conn| async move {
        conn.accept_login().await;
        let cmd = conn.read_command().await.expect("command");
        conn.reply_trap(cmd.tag(), &[("message", "failed")]).await;

        let cmd = conn.read_command().await.expect("follow-up command");
        conn.reply_done(cmd.tag(), &[("ret", "ok")]).await;
        conn.drain().await;
    })
    .await;

    let client = test_client();
    connect(&client, &router).await;

    let err = client.execute("/bad/command", &[]).await.unwrap_err();
    match &err {
        ApiError::Trap {
            message,
            attributes,
        } => {
            assert_eq!(message, "message=failed");
            assert_eq!(attributes.get("message").map(String::as_str), Some("failed"));
        }
        other => panic!("expected trap, got {other:?}"),
    }
    assert!(client.is_connected());
    assert_eq!(client.pending_commands(), 0);

    let response = client.execute_ex("/good/command", &[]).await.unwrap();
    assert_eq!(response.attributes.get("ret").map(String::as_str), Some("ok"));

    client.close();
    router.finish().await;
}

// ===== Send / Cancellation Tests =====

#[tokio::test]
async fn test_send_writes_without_waiting() {
    let router = MockRouter::spawn(|mut conn| async move {
        conn.accept_login().await;
        let cmd = conn.read_command().await.expect("command");
        assert_eq!(cmd.command, "/system/reboot");
        assert_eq!(cmd.tag.as_deref(), Some("custom"));
        assert_eq!(cmd.attribute("force"), Some("yes"));
        conn.drain().await;
    })
    .await;

    let client = test_client();
    connect(&client, &router).await;
    client
        .send("/system/reboot", Some("custom"), &[("force", "yes")])
        .await
        .unwrap();
    assert_eq!(client.pending_commands(), 0);

    client.close();
    router.finish().await;
}

#[tokio::test]
async fn test_abandoned_execute_leaves_no_pending_entry() {
    let router = MockRouter::spawn(|mut conn| async move {
        conn.accept_login().await;
        let slow = conn.read_command().await.expect("slow command");
        let next = conn.read_command().await.expect("next command");
        // The late reply for the abandoned tag is discarded.
        conn.reply_done(slow.tag(), &[]).await;
        conn.reply_done(next.tag(), &[]).await;
        conn.drain().await;
    })
    .await;

    let client = test_client();
    connect(&client, &router).await;

    let abandoned =
        tokio::time::timeout(Duration::from_millis(100), client.execute("/slow", &[])).await;
    assert!(abandoned.is_err());
    assert_eq!(client.pending_commands(), 0);
    assert!(client.is_connected());

    client.execute("/next", &[]).await.unwrap();

    client.close();
    router.finish().await;
}
