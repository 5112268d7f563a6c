//! Redis Streams transport.
//!
//! Entries are appended with `XADD` and consumed through a consumer group
//! with `XREADGROUP`. A handled message is removed from the group's pending
//! list with `XACK`. A rejected message is acknowledged and appended again
//! with its attempt counter bumped, or appended to `<stream>:dead` once it
//! has used up its deliveries; both happen in one atomic pipeline.
//!
//! A subscriber first re-reads its own pending list, so messages delivered
//! before a crash or cancellation but never settled are handled again. When
//! the stream is idle it also claims messages other consumers left pending
//! for longer than [`RedisStreamConfig::claim_idle`].

use crate::{
    encode_entry, Acknowledgement, Message, MessageHandler, Publisher, QueueClient, QueueError,
    Subscriber,
};
use async_trait::async_trait;
use auditrelay_types::Entry;
use bytes::Bytes;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamId, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const FIELD_PAYLOAD: &str = "payload";
const FIELD_ATTEMPT: &str = "attempt";
const FIELD_ORIGIN: &str = "origin";

/// Configuration for [`RedisStreamQueue`].
#[derive(Debug, Clone)]
pub struct RedisStreamConfig {
    /// Redis connection URL.
    pub url: String,
    /// Stream entries are published to.
    pub stream: String,
    /// Consumer group used by subscribers.
    pub group: String,
    /// Consumer name within the group.
    pub consumer: String,
    /// Delivery attempts before a rejected message is dead-lettered.
    pub max_deliveries: u32,
    /// How long one `XREADGROUP` call blocks waiting for messages.
    pub block: Duration,
    /// Messages fetched per read.
    pub batch_size: usize,
    /// Minimum idle time before another consumer's pending message is
    /// claimed. `None` disables claiming.
    pub claim_idle: Option<Duration>,
}

impl Default for RedisStreamConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            stream: "audit-trail".to_string(),
            group: "audit-trail-sub".to_string(),
            consumer: "auditrelay".to_string(),
            max_deliveries: 5,
            block: Duration::from_secs(2),
            batch_size: 16,
            claim_idle: Some(Duration::from_secs(60)),
        }
    }
}

impl RedisStreamConfig {
    /// Name of the dead-letter stream.
    pub fn dead_letter_stream(&self) -> String {
        format!("{}:dead", self.stream)
    }

    /// Where a rejected message on its `attempt`-th delivery goes next.
    fn redelivery(&self, attempt: u32) -> Redelivery {
        let dead_letter = attempt >= self.max_deliveries;
        Redelivery {
            stream: if dead_letter {
                self.dead_letter_stream()
            } else {
                self.stream.clone()
            },
            attempt: attempt.saturating_add(1),
            dead_letter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Redelivery {
    stream: String,
    attempt: u32,
    dead_letter: bool,
}

/// Which part of the group a subscriber is reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadPhase {
    /// Messages already delivered to this consumer but not yet settled.
    Pending,
    /// Messages never delivered to any consumer.
    New,
}

impl ReadPhase {
    fn start_id(self) -> &'static str {
        match self {
            Self::Pending => "0",
            Self::New => ">",
        }
    }

    /// Stay on the pending list until a read comes back empty.
    fn after_read(self, delivered: usize) -> Self {
        match self {
            Self::Pending if delivered > 0 => Self::Pending,
            _ => Self::New,
        }
    }
}

/// One page of an `XAUTOCLAIM` reply.
#[derive(Debug, Default)]
struct Claimed {
    cursor: String,
    records: Vec<StreamId>,
    /// Pending IDs whose entries were trimmed from the stream.
    deleted: Vec<String>,
}

fn parse_autoclaim(reply: redis::Value) -> Result<Claimed, QueueError> {
    let malformed = || QueueError::Transport("malformed XAUTOCLAIM reply".to_string());

    let redis::Value::Bulk(parts) = reply else {
        return Err(malformed());
    };
    let mut parts = parts.into_iter();
    let cursor: String = redis::from_redis_value(&parts.next().ok_or_else(malformed)?)?;
    let redis::Value::Bulk(entries) = parts.next().ok_or_else(malformed)? else {
        return Err(malformed());
    };

    let mut claimed = Claimed {
        cursor,
        ..Default::default()
    };
    for entry in entries {
        let redis::Value::Bulk(pair) = entry else {
            continue;
        };
        let mut pair = pair.into_iter();
        let id: String = redis::from_redis_value(&pair.next().ok_or_else(malformed)?)?;
        match pair.next() {
            None | Some(redis::Value::Nil) => claimed.deleted.push(id),
            Some(fields) => {
                let map: HashMap<String, redis::Value> = redis::from_redis_value(&fields)?;
                claimed.records.push(StreamId { id, map });
            }
        }
    }

    // Redis 7 appends the IDs it dropped from the pending list itself.
    if let Some(redis::Value::Bulk(dropped)) = parts.next() {
        debug!(count = dropped.len(), "XAUTOCLAIM dropped deleted entries");
    }
    Ok(claimed)
}

/// Queue client over a Redis stream.
#[derive(Clone)]
pub struct RedisStreamQueue {
    client: redis::Client,
    conn: MultiplexedConnection,
    config: Arc<RedisStreamConfig>,
    closed: CancellationToken,
}

impl RedisStreamQueue {
    /// Connect to Redis. Fails if the server is unreachable.
    pub async fn connect(config: RedisStreamConfig) -> Result<Self, QueueError> {
        let client = redis::Client::open(config.url.as_str())?;
        let conn = client.get_multiplexed_tokio_connection().await?;

        info!(stream = %config.stream, group = %config.group, "Connected to Redis stream");

        Ok(Self {
            client,
            conn,
            config: Arc::new(config),
            closed: CancellationToken::new(),
        })
    }

    /// Get the stream configuration.
    pub fn config(&self) -> &RedisStreamConfig {
        &self.config
    }

    async fn ensure_group(&self) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let created: redis::RedisResult<()> = conn
            .xgroup_create_mkstream(&self.config.stream, &self.config.group, "0")
            .await;
        match created {
            Ok(()) => {
                debug!(group = %self.config.group, "Consumer group created");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn to_message(record: &StreamId) -> Message {
        let payload: Vec<u8> = record.get(FIELD_PAYLOAD).unwrap_or_default();
        let attempt: u32 = record.get(FIELD_ATTEMPT).unwrap_or(1);
        Message {
            id: record.id.clone(),
            payload: Bytes::from(payload),
            attempt: attempt.max(1),
        }
    }

    async fn settle(&self, message: &Message, ack: Acknowledgement) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let stream = &self.config.stream;
        let group = &self.config.group;

        match ack {
            Acknowledgement::Ack => {
                let _: i64 = conn.xack(stream, group, &[&message.id]).await?;
            }
            Acknowledgement::Reject => {
                let next = self.config.redelivery(message.attempt);
                if next.dead_letter {
                    warn!(
                        message_id = %message.id,
                        attempts = message.attempt,
                        "Message exhausted its deliveries, dead-lettering"
                    );
                }
                let attempt = next.attempt.to_string();
                let fields: [(&str, &[u8]); 3] = [
                    (FIELD_PAYLOAD, message.payload.as_ref()),
                    (FIELD_ATTEMPT, attempt.as_bytes()),
                    (FIELD_ORIGIN, message.id.as_bytes()),
                ];

                redis::pipe()
                    .atomic()
                    .xadd(&next.stream, "*", &fields)
                    .ignore()
                    .xack(stream, group, &[&message.id])
                    .ignore()
                    .query_async::<_, ()>(&mut conn)
                    .await?;
            }
        }
        Ok(())
    }

    async fn dispatch(
        &self,
        records: &[StreamId],
        handler: &dyn MessageHandler,
    ) -> Result<(), QueueError> {
        for record in records {
            let message = Self::to_message(record);
            let outcome = handler.handle(&message).await;
            if let Err(err) = &outcome {
                debug!(
                    message_id = %message.id,
                    attempt = message.attempt,
                    error = %err,
                    "Handler rejected message"
                );
            }
            self.settle(&message, Acknowledgement::for_outcome(&outcome)).await?;
        }
        Ok(())
    }

    /// Claim and handle messages other consumers left idle.
    ///
    /// Returns `false` when the server does not support `XAUTOCLAIM`.
    async fn claim_idle(
        &self,
        min_idle: Duration,
        handler: &dyn MessageHandler,
    ) -> Result<bool, QueueError> {
        let mut conn = self.conn.clone();
        let stream = &self.config.stream;
        let group = &self.config.group;
        let mut cursor = "0-0".to_string();

        loop {
            let reply: redis::RedisResult<redis::Value> = redis::cmd("XAUTOCLAIM")
                .arg(stream)
                .arg(group)
                .arg(&self.config.consumer)
                .arg(min_idle.as_millis() as u64)
                .arg(&cursor)
                .arg("COUNT")
                .arg(self.config.batch_size)
                .query_async(&mut conn)
                .await;
            let reply = match reply {
                Ok(reply) => reply,
                Err(e) if e.kind() == redis::ErrorKind::ResponseError => {
                    warn!(error = %e, "XAUTOCLAIM unavailable, idle messages will not be claimed");
                    return Ok(false);
                }
                Err(e) => return Err(e.into()),
            };

            let claimed = parse_autoclaim(reply)?;
            if !claimed.deleted.is_empty() {
                let _: i64 = conn.xack(stream, group, &claimed.deleted).await?;
            }
            if !claimed.records.is_empty() {
                info!(count = claimed.records.len(), "Claimed idle audit messages");
                self.dispatch(&claimed.records, handler).await?;
            }

            if claimed.cursor == "0-0" {
                return Ok(true);
            }
            cursor = claimed.cursor;
        }
    }
}

#[async_trait]
impl Publisher for RedisStreamQueue {
    async fn publish(&self, entry: &Entry) -> Result<(), QueueError> {
        if self.closed.is_cancelled() {
            return Err(QueueError::Closed);
        }
        let payload = encode_entry(entry)?;
        let fields: [(&str, &[u8]); 2] = [
            (FIELD_PAYLOAD, payload.as_ref()),
            (FIELD_ATTEMPT, b"1"),
        ];

        let mut conn = self.conn.clone();
        let id: String = conn.xadd(&self.config.stream, "*", &fields).await?;
        debug!(message_id = %id, entry_id = %entry.id, "Entry published");
        Ok(())
    }
}

#[async_trait]
impl Subscriber for RedisStreamQueue {
    async fn receive(
        &self,
        cancel: CancellationToken,
        handler: &dyn MessageHandler,
    ) -> Result<(), QueueError> {
        self.ensure_group().await?;

        // Blocking reads get their own connection so they never stall
        // publishes and acks on the multiplexed one.
        let mut reader = self.client.get_async_connection().await?;
        let new_options = StreamReadOptions::default()
            .group(&self.config.group, &self.config.consumer)
            .block(self.config.block.as_millis() as usize)
            .count(self.config.batch_size);
        let pending_options = StreamReadOptions::default()
            .group(&self.config.group, &self.config.consumer)
            .count(self.config.batch_size);

        let mut phase = ReadPhase::Pending;
        let mut claim_idle = self.config.claim_idle;

        loop {
            let options = match phase {
                ReadPhase::Pending => &pending_options,
                ReadPhase::New => &new_options,
            };
            let stream_keys = [&self.config.stream];
            let start_ids = [phase.start_id()];
            let reply: Option<StreamReadReply> = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(QueueError::Cancelled),
                _ = self.closed.cancelled() => return Err(QueueError::Closed),
                reply = reader.xread_options(&stream_keys, &start_ids, options) => reply?,
            };

            let records: Vec<StreamId> = reply
                .map(|reply| reply.keys.into_iter().flat_map(|key| key.ids).collect())
                .unwrap_or_default();
            if phase == ReadPhase::Pending && !records.is_empty() {
                info!(count = records.len(), "Redelivering pending audit messages");
            }
            self.dispatch(&records, handler).await?;

            if records.is_empty() {
                if let Some(min_idle) = claim_idle {
                    if !self.claim_idle(min_idle, handler).await? {
                        claim_idle = None;
                    }
                }
            }
            phase = phase.after_read(records.len());
        }
    }
}

#[async_trait]
impl QueueClient for RedisStreamQueue {
    fn publisher(&self) -> Arc<dyn Publisher> {
        Arc::new(self.clone())
    }

    fn subscriber(&self) -> Arc<dyn Subscriber> {
        Arc::new(self.clone())
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.closed.cancel();
        info!(stream = %self.config.stream, "Redis stream client closed");
        Ok(())
    }
}
