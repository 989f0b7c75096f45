mod common;

use common::{closed_draft, install_draft, set_draft, temp_ledger};
use suntally::domains::event::{EventDraft, EventKind, MessageState};
use suntally::error::LedgerError;

#[tokio::test]
async fn append_then_read_back_round_trips() {
    let (_dir, ledger) = temp_ledger().await;

    let id = ledger
        .append(&closed_draft("u1", "Jane Doe", "u2"))
        .await
        .unwrap();
    assert!(id > 0);

    let event = ledger.get_by_id(id).await.unwrap().expect("row exists");
    assert_eq!(event.id, id);
    assert_eq!(event.kind, EventKind::Closed);
    assert_eq!(event.actor_id, "u1");
    assert_eq!(event.channel_id, "chan-1");
    assert_eq!(event.customer_name, "Jane Doe");
    assert_eq!(event.system_size, Some(8.5));
    assert_eq!(event.setter_id.as_deref(), Some("u2"));
    assert_eq!(event.message_state, MessageState::Pending);
    assert!(event.message_id.is_none());
    assert!(event.created_at > 0);
    assert!(event.set_at.is_none());
}

#[tokio::test]
async fn each_kind_persists_its_own_payload() {
    let (_dir, ledger) = temp_ledger().await;

    let set_id = ledger
        .append(&set_draft("u1", "Jane Doe", 1_720_155_600))
        .await
        .unwrap();
    let install_id = ledger
        .append(&install_draft("u1", "John Roe", "u2"))
        .await
        .unwrap();

    let set = ledger.get_by_id(set_id).await.unwrap().unwrap();
    assert_eq!(set.kind, EventKind::Set);
    assert_eq!(set.set_at, Some(1_720_155_600));
    assert_eq!(set.has_bill, Some(false));
    assert!(set.system_size.is_none());

    let install = ledger.get_by_id(install_id).await.unwrap().unwrap();
    assert_eq!(install.kind, EventKind::InstallScheduled);
    assert_eq!(install.setter_id.as_deref(), Some("u2"));
    assert!(install.set_at.is_none());
}

#[tokio::test]
async fn append_rejects_invalid_drafts_before_any_write() {
    let (_dir, ledger) = temp_ledger().await;

    let draft = EventDraft::Set {
        actor_id: "u1".to_string(),
        channel_id: "chan-1".to_string(),
        customer_name: "  ".to_string(),
        set_at: 0,
        has_bill: true,
    };
    let err = ledger.append(&draft).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
    assert!(ledger.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn attach_message_is_idempotent_and_tolerates_missing_rows() {
    let (_dir, ledger) = temp_ledger().await;
    let id = ledger
        .append(&set_draft("u1", "Jane Doe", 1_720_155_600))
        .await
        .unwrap();

    ledger.attach_message(id, "msg-9").await.unwrap();
    ledger.attach_message(id, "msg-9").await.unwrap();

    let event = ledger.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(event.message_id.as_deref(), Some("msg-9"));
    assert_eq!(event.message_state, MessageState::Finalized);

    // Unknown id: no error, no new row.
    ledger.attach_message(id + 100, "msg-9").await.unwrap();
    assert_eq!(ledger.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn mark_orphaned_keeps_the_row_valid() {
    let (_dir, ledger) = temp_ledger().await;
    let id = ledger
        .append(&set_draft("u1", "Jane Doe", 1_720_155_600))
        .await
        .unwrap();

    ledger.mark_orphaned(id).await.unwrap();
    let event = ledger.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(event.message_state, MessageState::Orphaned);
    assert!(event.message_id.is_none());
}

#[tokio::test]
async fn delete_is_at_most_once_effective() {
    let (_dir, ledger) = temp_ledger().await;
    let id = ledger
        .append(&closed_draft("u1", "Jane Doe", "u2"))
        .await
        .unwrap();

    let (first, second) = tokio::join!(ledger.delete(id), ledger.delete(id));
    assert_eq!(first.unwrap() + second.unwrap(), 1);
    assert!(ledger.get_by_id(id).await.unwrap().is_none());
    assert_eq!(ledger.delete(id).await.unwrap(), 0);
}

#[tokio::test]
async fn ids_are_never_reused_after_deletion() {
    let (_dir, ledger) = temp_ledger().await;
    let first = ledger
        .append(&set_draft("u1", "Jane Doe", 1_720_155_600))
        .await
        .unwrap();
    ledger.delete(first).await.unwrap();

    let second = ledger
        .append(&set_draft("u1", "John Roe", 1_720_155_600))
        .await
        .unwrap();
    assert!(second > first);
}

#[tokio::test]
async fn list_recent_is_newest_first_and_list_all_ascending() {
    let (_dir, ledger) = temp_ledger().await;
    for customer in ["a", "b", "c"] {
        ledger
            .append(&set_draft("u1", customer, 1_720_155_600))
            .await
            .unwrap();
    }

    let recent = ledger.list_recent(2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].customer_name, "c");
    assert_eq!(recent[1].customer_name, "b");

    let all = ledger.list_all().await.unwrap();
    let ids: Vec<i64> = all.iter().map(|e| e.id).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);
    assert_eq!(all.len(), 3);
}
