//! Property tests for the message log merge engine.
//!
//! Whatever order echoes, persistence responses, and duplicate deliveries
//! arrive in, the log must never hold two records for one logical message.

use std::collections::HashSet;

use pairchat::sync::reconcile::{MergeAction, MessageLog};
use pairchat_proto::channel::ChannelId;
use pairchat_proto::message::{
    ClientId, DeliveryState, Message, MessageId, MessagePayload, Timestamp, UserId,
};
use proptest::prelude::*;

/// Payloads drawn from a small pool of ids so that merges collide often.
/// Every payload carries at least one identity key, as real traffic does:
/// the server always assigns an id, clients always attach a client key.
fn arb_payload() -> impl Strategy<Value = MessagePayload> {
    (
        prop::option::of(0u8..4),
        prop::option::of(0u8..4),
        prop::bool::ANY,
        "[a-z]{0,12}",
    )
        .prop_filter("payload needs at least one key", |(id, client_id, _, _)| {
            id.is_some() || client_id.is_some()
        })
        .prop_map(|(id, client_id, from_peer, text)| {
            let sender = if from_peer { "u2" } else { "u1" };
            MessagePayload {
                id: id.map(|n| MessageId::new(format!("m{n}"))),
                client_id: client_id.map(|n| ClientId::new(format!("u1-{n}"))),
                channel_id: ChannelId::new("u1:u2"),
                sender_id: UserId::new(sender),
                sender_name: sender.to_uppercase(),
                text: Some(text),
                attachment: None,
                created_at: Timestamp::from_millis(1_000),
            }
        })
}

proptest! {
    #[test]
    fn no_two_records_share_a_client_id(
        payloads in prop::collection::vec(arb_payload(), 1..40)
    ) {
        let mut log = MessageLog::default();
        for payload in payloads {
            log.merge(Message::confirmed(payload));
            let mut seen = HashSet::new();
            for record in log.messages() {
                if let Some(client_id) = &record.payload.client_id {
                    prop_assert!(
                        seen.insert(client_id.as_str().to_owned()),
                        "duplicate client_id {} in log",
                        client_id
                    );
                }
            }
        }
    }

    #[test]
    fn remerging_a_payload_is_always_an_update(payload in arb_payload()) {
        let mut log = MessageLog::default();
        log.merge(Message::confirmed(payload.clone()));
        let len_before = log.len();

        let (action, index) = log.merge(Message::confirmed(payload));
        prop_assert_eq!(action, MergeAction::Updated);
        prop_assert!(index < len_before);
        prop_assert_eq!(log.len(), len_before);
    }

    #[test]
    fn log_never_outgrows_the_merge_count(
        payloads in prop::collection::vec(arb_payload(), 1..40)
    ) {
        let mut log = MessageLog::default();
        let total = payloads.len();
        let mut inserts = 0;
        for payload in payloads {
            if let (MergeAction::Inserted, _) = log.merge(Message::confirmed(payload)) {
                inserts += 1;
            }
        }
        prop_assert_eq!(log.len(), inserts);
        prop_assert!(log.len() <= total);
    }

    #[test]
    fn merged_deliveries_end_up_confirmed(
        payloads in prop::collection::vec(arb_payload(), 1..40)
    ) {
        let mut log = MessageLog::default();
        for payload in payloads {
            log.merge(Message::confirmed(payload));
        }
        prop_assert!(log
            .messages()
            .iter()
            .all(|m| m.delivery_state == DeliveryState::Confirmed));
    }

    #[test]
    fn mark_failed_never_changes_the_record_count(
        payloads in prop::collection::vec(arb_payload(), 1..20),
        key in 0u8..6
    ) {
        let mut log = MessageLog::default();
        for payload in payloads {
            log.merge(Message::pending(payload));
        }
        let len_before = log.len();
        log.mark_failed(&ClientId::new(format!("u1-{key}")));
        prop_assert_eq!(log.len(), len_before);
    }
}
