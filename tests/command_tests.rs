//! Command handling against an in-memory registry
mod common;

use common::{ADMIN, Harness, key};
use pricewatch_lib::commands::CommandHandler;
use pricewatch_lib::domain::{CONFIG_BUCKET, KeyValueStore, SEARCH_BUCKET};

const USER: i64 = 7;

fn handler(harness: &Harness) -> CommandHandler {
    CommandHandler::new(harness.scheduler.clone(), [USER, ADMIN])
}

#[tokio::test]
async fn unknown_users_are_ignored() {
    let harness = Harness::new();
    let handler = handler(&harness);

    assert!(handler.handle(12345, "/search @deals/B07XJ8C8F5.es").await.is_empty());
    assert!(harness.registry.is_empty().await);
}

#[tokio::test]
async fn search_registers_once() {
    let harness = Harness::new();
    let handler = handler(&harness);

    assert_eq!(
        handler.handle(USER, "/search @Deals/B07XJ8C8F5.es").await,
        vec!["searching @deals/B07XJ8C8F5.es"]
    );
    assert_eq!(
        handler.handle(USER, "/search @deals/B07XJ8C8F5.es").await,
        vec!["already searching @deals/B07XJ8C8F5.es"]
    );
    assert_eq!(handler.handle(USER, "/search").await, vec!["search arguments not provided"]);
    assert_eq!(
        handler.handle(USER, "/search 1/B07XJ8C8F5.nl").await,
        vec!["unsupported marketplace domain: nl"]
    );
    assert_eq!(harness.registry.len().await, 1);
}

#[tokio::test]
async fn pasted_link_uses_the_default_chat() {
    let harness = Harness::new();
    let handler = handler(&harness);

    let replies = handler
        .handle(USER, "check https://www.amazon.es/Widget/dp/B07XJ8C8F5/ref=sr_1_1")
        .await;

    assert_eq!(replies, vec!["searching 7/B07XJ8C8F5.es"]);
    assert!(handler.handle(USER, "just chatting").await.is_empty());
}

#[tokio::test]
async fn chat_sets_the_default_destination() {
    let harness = Harness::new();
    let handler = handler(&harness);

    assert_eq!(handler.handle(USER, "/chat").await, vec!["current chat for searches: 7"]);
    assert_eq!(
        handler.handle(USER, "/chat @Deals").await,
        vec!["chat for searches updated: @deals"]
    );
    assert_eq!(
        harness.store.get(CONFIG_BUCKET, "7").await.unwrap().as_deref(),
        Some("@deals")
    );
    assert_eq!(
        handler.handle(USER, "/search B00ABCDEFG.de?2").await,
        vec!["searching @deals/B00ABCDEFG.de?2"]
    );
    assert_eq!(handler.handle(USER, "/chat a/b").await, vec!["invalid chat: a/b"]);
}

#[tokio::test]
async fn batch_export_and_stop_all() {
    let harness = Harness::new();
    let handler = handler(&harness);

    let replies = handler
        .handle(USER, "/batch @b/B000000002.es\n\n@a/B000000001.de?1\n@c/B000000003.nl")
        .await;
    assert_eq!(
        replies,
        vec![
            "searching @b/B000000002.es",
            "searching @a/B000000001.de?1",
            "unsupported marketplace domain: nl",
        ]
    );

    assert_eq!(
        handler.handle(USER, "/export").await,
        vec!["/batch @a/B000000001.de?1\n@b/B000000002.es"]
    );

    assert_eq!(handler.handle(ADMIN, "/stop *").await, vec!["stopped all (2)"]);
    assert!(harness.registry.is_empty().await);
    assert!(harness.store.keys(SEARCH_BUCKET).await.unwrap().is_empty());
    assert_eq!(handler.handle(USER, "/export").await, vec!["no active searches"]);
}

#[tokio::test]
async fn stop_removes_one_search() {
    let harness = Harness::new();
    let handler = handler(&harness);
    handler.handle(USER, "/search B07XJ8C8F5.es").await;
    handler.handle(USER, "/search B07XJ8C8F5.it").await;

    assert_eq!(handler.handle(USER, "/stop B07XJ8C8F5.es").await, vec!["stopped 7/B07XJ8C8F5.es"]);
    assert_eq!(
        handler.handle(USER, "/stop B07XJ8C8F5.es").await,
        vec!["not searching 7/B07XJ8C8F5.es"]
    );
    assert_eq!(handler.handle(USER, "/stop").await, vec!["stop arguments not provided"]);
    assert!(harness.registry.contains(&key("7/B07XJ8C8F5.it")).await);
    assert_eq!(
        harness.store.keys(SEARCH_BUCKET).await.unwrap(),
        vec!["7/B07XJ8C8F5.it".to_string()]
    );
}

#[tokio::test]
async fn status_lists_own_or_all_searches() {
    let harness = Harness::new();
    let handler = handler(&harness);
    handler.handle(USER, "/search B07XJ8C8F5.es").await;
    handler.handle(ADMIN, "/search @deals/B00ABCDEFG.de").await;

    assert_eq!(
        handler.handle(USER, "/status").await,
        vec!["status info:", "running B07XJ8C8F5.es"]
    );
    assert_eq!(
        handler.handle(USER, "/status *").await,
        vec!["status info:", "running 7/B07XJ8C8F5.es", "running @deals/B00ABCDEFG.de"]
    );
    assert_eq!(handler.handle(USER, "/reboot").await, vec!["unknown command /reboot"]);
}
