use async_trait::async_trait;
use auditrelay_queue::{
    decode_entry, CancellationToken, HandlerError, MemoryQueue, Message, MessageHandler,
    QueueClient, QueueError,
};
use auditrelay_types::Entry;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Default)]
struct Collect {
    ids: Mutex<Vec<String>>,
}

#[async_trait]
impl MessageHandler for Collect {
    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        let entry = decode_entry(&message.payload)?;
        self.ids.lock().await.push(entry.id);
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_publishers_through_client_handles() {
    let queue = MemoryQueue::new();
    let client: Arc<dyn QueueClient> = Arc::new(queue.clone());

    let mut tasks = Vec::new();
    for worker in 0..8 {
        let publisher = client.publisher();
        tasks.push(tokio::spawn(async move {
            for n in 0..25 {
                let entry = Entry::new("bulk").with_id(format!("{worker}-{n}"));
                publisher.publish(&entry).await.unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let handler = Collect::default();
    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        stopper.cancel();
    });

    let result = client.subscriber().receive(cancel, &handler).await;
    assert!(matches!(result, Err(QueueError::Cancelled)));

    let ids: HashSet<String> = handler.ids.lock().await.iter().cloned().collect();
    assert_eq!(ids.len(), 200);
    assert_eq!(queue.stats().acked, 200);
    assert_eq!(queue.stats().rejected, 0);
}

#[tokio::test]
async fn test_client_close_stops_publishers() {
    let queue = MemoryQueue::new();
    let client: Arc<dyn QueueClient> = Arc::new(queue);
    let publisher = client.publisher();

    publisher.publish(&Entry::new("before")).await.unwrap();
    client.close().await.unwrap();

    assert!(matches!(
        publisher.publish(&Entry::new("after")).await,
        Err(QueueError::Closed)
    ));
}
