//! Message log behavior: transactional append and positional range reads.

mod common;

use chatkeep_core::Message;
use chatkeep_records::{RecordError, RecordStore};
use common::{chat, run_records_test_both};
use std::sync::Arc;
use uuid::Uuid;

async fn seeded(store: &Arc<dyn RecordStore>, count: usize) -> (Uuid, Vec<Message>) {
    let record = chat("general", "u1");
    store.save_chat(&record).await.unwrap();

    let mut messages = Vec::with_capacity(count);
    for i in 0..count {
        let message = Message::new("u1", format!("message {i}")).unwrap();
        store.append_message(record.id, &message).await.unwrap();
        messages.push(message);
    }
    (record.id, messages)
}

fn ids(messages: &[Message]) -> Vec<Uuid> {
    messages.iter().map(|m| m.id).collect()
}

#[tokio::test]
async fn test_append_extends_message_list_in_order() {
    run_records_test_both(|store| async move {
        let (chat_id, messages) = seeded(&store, 3).await;

        let loaded = store.get_chat(chat_id).await.unwrap();
        assert_eq!(loaded.message_ids, ids(&messages));
        assert_eq!(store.message_count(chat_id).await.unwrap(), 3);
    })
    .await;
}

#[tokio::test]
async fn test_append_to_missing_chat_is_not_found() {
    run_records_test_both(|store| async move {
        let message = Message::new("u1", "hello").unwrap();
        let err = store
            .append_message(Uuid::new_v4(), &message)
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::NotFound(_)));
    })
    .await;
}

#[tokio::test]
async fn test_duplicate_message_id_rolls_back_list_append() {
    run_records_test_both(|store| async move {
        let (chat_id, messages) = seeded(&store, 1).await;

        let err = store
            .append_message(chat_id, &messages[0])
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::AlreadyExists(_)), "{err:?}");

        // The list update inside the failed transaction must not survive.
        assert_eq!(store.message_count(chat_id).await.unwrap(), 1);
    })
    .await;
}

#[tokio::test]
async fn test_range_returns_contiguous_slice() {
    run_records_test_both(|store| async move {
        let (chat_id, messages) = seeded(&store, 6).await;

        let slice = store.get_messages(chat_id, 2, 5).await.unwrap();
        assert_eq!(ids(&slice), ids(&messages[2..5]));
        assert_eq!(slice[0].body, "message 2");

        let all = store.get_messages(chat_id, 0, 6).await.unwrap();
        assert_eq!(ids(&all), ids(&messages));
    })
    .await;
}

#[tokio::test]
async fn test_range_past_end_is_truncated() {
    run_records_test_both(|store| async move {
        let (chat_id, messages) = seeded(&store, 3).await;

        let tail = store.get_messages(chat_id, 1, 100).await.unwrap();
        assert_eq!(ids(&tail), ids(&messages[1..]));

        let beyond = store.get_messages(chat_id, 10, 20).await.unwrap();
        assert!(beyond.is_empty());

        let empty = store.get_messages(chat_id, 2, 2).await.unwrap();
        assert!(empty.is_empty());
    })
    .await;
}

#[tokio::test]
async fn test_range_rejects_inverted_bounds() {
    run_records_test_both(|store| async move {
        let (chat_id, _) = seeded(&store, 2).await;
        let err = store.get_messages(chat_id, 2, 1).await.unwrap_err();
        assert!(matches!(err, RecordError::InvalidRange { from: 2, to: 1 }));
    })
    .await;
}

#[tokio::test]
async fn test_range_on_missing_chat_is_not_found() {
    run_records_test_both(|store| async move {
        let err = store
            .get_messages(Uuid::new_v4(), 0, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::NotFound(_)));

        let err = store.message_count(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, RecordError::NotFound(_)));
    })
    .await;
}

#[tokio::test]
async fn test_delete_cascades_to_messages() {
    run_records_test_both(|store| async move {
        let (chat_id, messages) = seeded(&store, 2).await;
        store.delete_chat("u1", chat_id).await.unwrap();

        // Re-creating a chat with a fresh id and replaying the same message
        // ids succeeds only if the old rows were removed.
        let replacement = chat("general", "u1");
        store.save_chat(&replacement).await.unwrap();
        for message in &messages {
            store.append_message(replacement.id, message).await.unwrap();
        }
        assert_eq!(store.message_count(replacement.id).await.unwrap(), 2);
    })
    .await;
}
