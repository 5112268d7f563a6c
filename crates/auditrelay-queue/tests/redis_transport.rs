//! Redis Streams transport against a live server.
//!
//! Run with `AUDITRELAY_TEST_REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored`.
//! Every test uses its own stream, so a shared server is fine.

#![cfg(feature = "redis")]

use async_trait::async_trait;
use auditrelay_queue::{
    decode_entry, CancellationToken, HandlerError, Message, MessageHandler, Publisher,
    QueueError, RedisStreamConfig, RedisStreamQueue, Subscriber,
};
use auditrelay_types::{new_entry_id, Entry};
use redis::streams::{StreamPendingReply, StreamRangeReply, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use std::time::Duration;
use tokio::sync::Mutex;

const URL_VAR: &str = "AUDITRELAY_TEST_REDIS_URL";

/// Records `(entry id, attempt)` for every delivery.
struct Recorder {
    reject: bool,
    seen: Mutex<Vec<(String, u32)>>,
}

impl Recorder {
    fn accepting() -> Self {
        Self {
            reject: false,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn rejecting() -> Self {
        Self {
            reject: true,
            seen: Mutex::new(Vec::new()),
        }
    }

    async fn seen(&self) -> Vec<(String, u32)> {
        self.seen.lock().await.clone()
    }
}

#[async_trait]
impl MessageHandler for Recorder {
    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        let entry = decode_entry(&message.payload)?;
        self.seen.lock().await.push((entry.id, message.attempt));
        if self.reject {
            return Err(HandlerError::rejected(std::io::Error::new(std::io::ErrorKind::Other, "store down")));
        }
        Ok(())
    }
}

fn config() -> Option<RedisStreamConfig> {
    let url = std::env::var(URL_VAR).ok()?;
    let stream = format!("auditrelay-test-{}", new_entry_id());
    Some(RedisStreamConfig {
        url,
        group: format!("{stream}-sub"),
        stream,
        block: Duration::from_millis(100),
        claim_idle: None,
        ..Default::default()
    })
}

async fn raw(config: &RedisStreamConfig) -> redis::aio::MultiplexedConnection {
    redis::Client::open(config.url.as_str())
        .unwrap()
        .get_multiplexed_tokio_connection()
        .await
        .unwrap()
}

async fn receive_for(
    queue: &RedisStreamQueue,
    handler: &dyn MessageHandler,
    wait: Duration,
) -> Result<(), QueueError> {
    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(wait).await;
        stopper.cancel();
    });
    queue.receive(cancel, handler).await
}

async fn pending(
    conn: &mut redis::aio::MultiplexedConnection,
    config: &RedisStreamConfig,
) -> usize {
    let reply: StreamPendingReply = conn.xpending(&config.stream, &config.group).await.unwrap();
    reply.count()
}

async fn cleanup(conn: &mut redis::aio::MultiplexedConnection, config: &RedisStreamConfig) {
    let _: () = conn
        .del(&[config.stream.clone(), config.dead_letter_stream()])
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "needs a Redis server at AUDITRELAY_TEST_REDIS_URL"]
async fn test_handled_messages_are_acked() {
    let Some(config) = config() else { return };
    let queue = RedisStreamQueue::connect(config.clone()).await.unwrap();
    let mut conn = raw(&config).await;

    queue.publish(&Entry::new("login").with_id("e-1")).await.unwrap();
    queue.publish(&Entry::new("logout").with_id("e-2")).await.unwrap();

    let handler = Recorder::accepting();
    let result = receive_for(&queue, &handler, Duration::from_millis(500)).await;
    assert!(matches!(result, Err(QueueError::Cancelled)));

    assert_eq!(
        handler.seen().await,
        vec![("e-1".to_string(), 1), ("e-2".to_string(), 1)]
    );
    assert_eq!(pending(&mut conn, &config).await, 0);
    cleanup(&mut conn, &config).await;
}

#[tokio::test]
#[ignore = "needs a Redis server at AUDITRELAY_TEST_REDIS_URL"]
async fn test_rejected_message_is_retried_then_dead_lettered() {
    let Some(config) = config() else { return };
    let config = RedisStreamConfig {
        max_deliveries: 3,
        ..config
    };
    let queue = RedisStreamQueue::connect(config.clone()).await.unwrap();
    let mut conn = raw(&config).await;

    queue.publish(&Entry::new("login").with_id("e-1")).await.unwrap();

    let handler = Recorder::rejecting();
    let _ = receive_for(&queue, &handler, Duration::from_millis(800)).await;

    let attempts: Vec<u32> = handler.seen().await.into_iter().map(|(_, a)| a).collect();
    assert_eq!(attempts, vec![1, 2, 3]);
    assert_eq!(pending(&mut conn, &config).await, 0);

    let dead: StreamRangeReply = conn.xrange_all(config.dead_letter_stream()).await.unwrap();
    assert_eq!(dead.ids.len(), 1);
    assert_eq!(dead.ids[0].get::<String>("attempt").as_deref(), Some("4"));
    assert!(dead.ids[0].get::<String>("origin").is_some());
    let entry = decode_entry(&dead.ids[0].get::<Vec<u8>>("payload").unwrap()).unwrap();
    assert_eq!(entry.id, "e-1");

    cleanup(&mut conn, &config).await;
}

#[tokio::test]
#[ignore = "needs a Redis server at AUDITRELAY_TEST_REDIS_URL"]
async fn test_existing_group_is_reused() {
    let Some(config) = config() else { return };
    let mut conn = raw(&config).await;

    for _ in 0..2 {
        let queue = RedisStreamQueue::connect(config.clone()).await.unwrap();
        let handler = Recorder::accepting();
        let result = receive_for(&queue, &handler, Duration::from_millis(200)).await;
        assert!(matches!(result, Err(QueueError::Cancelled)));
    }

    cleanup(&mut conn, &config).await;
}

#[tokio::test]
#[ignore = "needs a Redis server at AUDITRELAY_TEST_REDIS_URL"]
async fn test_unsettled_deliveries_are_handled_after_restart() {
    let Some(config) = config() else { return };
    let queue = RedisStreamQueue::connect(config.clone()).await.unwrap();
    let mut conn = raw(&config).await;

    let _: () = conn
        .xgroup_create_mkstream(&config.stream, &config.group, "0")
        .await
        .unwrap();
    queue.publish(&Entry::new("login").with_id("e-1")).await.unwrap();

    // Delivered to this consumer, then dropped before it was settled.
    let options = StreamReadOptions::default()
        .group(&config.group, &config.consumer)
        .count(10);
    let read: StreamReadReply = conn
        .xread_options(&[&config.stream], &[">"], &options)
        .await
        .unwrap();
    assert_eq!(read.keys[0].ids.len(), 1);
    assert_eq!(pending(&mut conn, &config).await, 1);

    let handler = Recorder::accepting();
    let _ = receive_for(&queue, &handler, Duration::from_millis(500)).await;

    assert_eq!(handler.seen().await, vec![("e-1".to_string(), 1)]);
    assert_eq!(pending(&mut conn, &config).await, 0);
    cleanup(&mut conn, &config).await;
}

#[tokio::test]
#[ignore = "needs a Redis server at AUDITRELAY_TEST_REDIS_URL"]
async fn test_idle_messages_of_other_consumers_are_claimed() {
    let Some(config) = config() else { return };
    let config = RedisStreamConfig {
        claim_idle: Some(Duration::from_millis(50)),
        ..config
    };
    let queue = RedisStreamQueue::connect(config.clone()).await.unwrap();
    let mut conn = raw(&config).await;

    let _: () = conn
        .xgroup_create_mkstream(&config.stream, &config.group, "0")
        .await
        .unwrap();
    queue.publish(&Entry::new("login").with_id("e-1")).await.unwrap();

    let options = StreamReadOptions::default()
        .group(&config.group, "crashed-worker")
        .count(10);
    let _: StreamReadReply = conn
        .xread_options(&[&config.stream], &[">"], &options)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let handler = Recorder::accepting();
    let _ = receive_for(&queue, &handler, Duration::from_millis(600)).await;

    assert_eq!(handler.seen().await, vec![("e-1".to_string(), 1)]);
    assert_eq!(pending(&mut conn, &config).await, 0);
    cleanup(&mut conn, &config).await;
}
