//! End-to-end scenarios for the optimistic mutation controller.

mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use test_case::test_case;

use agora_cache::{CacheKey, CacheStore};
use agora_core::{FeedbackEmitter, RecordingEmitter, SyncError, ToastTier};
use agora_mutation::{MutationRequest, OptimisticController};

use common::{FakeApi, GatedApi};

fn controller(
    api: Arc<dyn agora_mutation::MutationApi>,
) -> (OptimisticController, Arc<CacheStore>, Arc<RecordingEmitter>) {
    let cache = CacheStore::new();
    let feedback = Arc::new(RecordingEmitter::new());
    let controller = OptimisticController::new(
        Arc::clone(&cache),
        Arc::clone(&feedback) as Arc<dyn FeedbackEmitter>,
        api,
    );
    (controller, cache, feedback)
}

fn cart_ids(cache: &CacheStore) -> Vec<String> {
    cache
        .get(&CacheKey::cart())
        .and_then(|v| v["data"].as_array().cloned())
        .unwrap_or_default()
        .iter()
        .filter_map(|line| line["id"].as_str().map(String::from))
        .collect()
}

/// Scenario 1: add-to-cart against a failing network. The temporary line
/// appears immediately, then the cart reverts within one reconcile
/// cycle, with exactly one error toast.
#[tokio::test]
async fn add_to_cart_failure_reverts_temporary_line() {
    let (api, mut gates) = GatedApi::new(1);
    let api = Arc::new(api);
    let (controller, cache, feedback) = controller(api);
    cache.set(CacheKey::cart(), json!({"data": []}));

    let submit = tokio::spawn({
        let request = MutationRequest::AddToCart {
            product: json!({"id": "P1", "name": "Tai nghe", "stock": 50}),
            quantity: 2,
        };
        async move { controller.submit(request).await }
    });
    tokio::task::yield_now().await;

    // Optimistic line is visible before the network resolves.
    let mid_flight = cart_ids(&cache);
    assert_eq!(mid_flight.len(), 1);
    assert!(mid_flight[0].starts_with("temp-"));

    gates
        .remove(0)
        .send(Err(SyncError::Network("offline".into())))
        .unwrap();
    let outcome = submit.await.unwrap();
    assert!(matches!(outcome, Err(SyncError::Network(_))));

    assert_eq!(cache.get(&CacheKey::cart()), Some(json!({"data": []})));
    assert_eq!(feedback.toasts_at(ToastTier::Error).len(), 1);
    assert_eq!(
        feedback.toasts_at(ToastTier::Error)[0].message,
        "Không thể thêm vào giỏ hàng"
    );
}

/// Scenario 2: quantity update 2 -> 5 confirmed by the server. The final
/// cached quantity is 5 and no error toast fires.
#[tokio::test]
async fn update_quantity_success_keeps_new_value() {
    let api = Arc::new(FakeApi::new());
    api.push_ok(json!({"id": "A", "quantity": 5}));
    let (controller, cache, feedback) = controller(api);
    cache.set(
        CacheKey::cart(),
        json!({"data": [{"id": "A", "quantity": 2}]}),
    );

    let outcome = controller
        .submit(MutationRequest::UpdateQuantity {
            purchase_id: "A".into(),
            quantity: 5,
        })
        .await
        .unwrap();

    assert_eq!(outcome.value["quantity"], 5);
    assert!(outcome.reversal.is_none());
    let cart = cache.get(&CacheKey::cart()).unwrap();
    assert_eq!(cart["data"][0]["quantity"], 5);
    assert!(feedback.toasts_at(ToastTier::Error).is_empty());
    // Settle marked the cart for re-fetch.
    assert!(cache.is_stale(&CacheKey::cart()));
}

/// Scenario 3, success half: removing two lines emits the counted undo
/// toast, excludes both ids immediately, and on confirmation dismisses
/// the undo toast and fires the final toast.
#[tokio::test]
async fn remove_two_lines_success_flow() {
    let api = Arc::new(FakeApi::new());
    api.push_ok(json!({"removed": ["A", "B"]}));
    let (controller, cache, feedback) = controller(api);
    cache.set(
        CacheKey::cart(),
        json!({"data": [
            {"id": "A", "quantity": 1},
            {"id": "B", "quantity": 2},
            {"id": "C", "quantity": 3},
        ]}),
    );

    let outcome = controller
        .submit(MutationRequest::RemoveFromCart {
            purchase_ids: vec!["A".into(), "B".into()],
        })
        .await
        .unwrap();

    assert_eq!(cart_ids(&cache), vec!["C".to_string()]);

    let success = feedback.toasts_at(ToastTier::Success);
    assert_eq!(success.len(), 2);
    assert_eq!(success[0].message, "Đã xóa 2 sản phẩm");
    assert!(success[0].dismissed);
    assert_eq!(success[1].message, "Xóa thành công");

    // Settle is deferred into the undo token.
    assert!(!cache.is_stale(&CacheKey::cart()));
    outcome.reversal.unwrap().commit();
    assert!(cache.is_stale(&CacheKey::cart()));
}

/// Scenario 3, failure half: both removed lines reappear with their
/// original field values.
#[tokio::test]
async fn remove_failure_restores_original_lines() {
    let api = Arc::new(FakeApi::new());
    api.push_err(SyncError::Network("timeout".into()));
    let (controller, cache, feedback) = controller(api);
    let original = json!({"data": [
        {"id": "A", "quantity": 1, "price": 120000},
        {"id": "B", "quantity": 2, "price": 45000},
    ]});
    cache.set(CacheKey::cart(), original.clone());

    let outcome = controller
        .submit(MutationRequest::RemoveFromCart {
            purchase_ids: vec!["A".into(), "B".into()],
        })
        .await;
    assert!(outcome.is_err());

    assert_eq!(cache.get(&CacheKey::cart()), Some(original));
    // The undo toast was dismissed, one error toast fired.
    assert!(feedback.toasts_at(ToastTier::Success)[0].dismissed);
    assert_eq!(feedback.toasts_at(ToastTier::Error).len(), 1);
    assert_eq!(
        feedback.toasts_at(ToastTier::Error)[0].message,
        "Không thể xóa sản phẩm"
    );
}

/// The undo token restores the pre-removal lines inside its window.
#[tokio::test]
async fn remove_then_revert_restores_lines() {
    let api = Arc::new(FakeApi::new());
    api.push_ok(json!({"removed": ["A"]}));
    let (controller, cache, _feedback) = controller(api);
    let original = json!({"data": [{"id": "A", "quantity": 1}]});
    cache.set(CacheKey::cart(), original.clone());

    let outcome = controller
        .submit(MutationRequest::RemoveFromCart {
            purchase_ids: vec!["A".into()],
        })
        .await
        .unwrap();

    assert_eq!(cart_ids(&cache), Vec::<String>::new());
    outcome.reversal.unwrap().revert();
    assert_eq!(cache.get(&CacheKey::cart()), Some(original));
}

/// After a successful creation no temporary ids remain anywhere.
#[tokio::test]
async fn temporary_entity_replaced_on_success() {
    let api = Arc::new(FakeApi::new());
    api.push_ok(json!({"id": "purchase-77", "product": {"id": "P1"}, "quantity": 2}));
    let (controller, cache, _feedback) = controller(api);
    cache.set(CacheKey::cart(), json!({"data": []}));

    controller
        .submit(MutationRequest::AddToCart {
            product: json!({"id": "P1"}),
            quantity: 2,
        })
        .await
        .unwrap();

    let ids = cart_ids(&cache);
    assert_eq!(ids, vec!["purchase-77".to_string()]);
    assert!(ids.iter().all(|id| !id.starts_with("temp-")));
}

/// Temp replacement skips a key that lost its cached value mid-flight
/// rather than writing a fresh envelope the server never returned.
#[tokio::test]
async fn temp_replacement_skips_absent_key() {
    let (api, mut gates) = GatedApi::new(1);
    let api = Arc::new(api);
    let (controller, cache, _feedback) = controller(api);
    let empty = cache.snapshot(&[CacheKey::cart()]);

    let submit = tokio::spawn({
        let request = MutationRequest::AddToCart {
            product: json!({"id": "P1"}),
            quantity: 1,
        };
        async move { controller.submit(request).await }
    });
    tokio::task::yield_now().await;
    assert_eq!(cart_ids(&cache).len(), 1);

    // Another actor drops the cart key while the network is in flight.
    cache.restore(&empty);

    gates
        .remove(0)
        .send(Ok(json!({"id": "purchase-77", "quantity": 1})))
        .unwrap();
    submit.await.unwrap().unwrap();

    assert_eq!(cache.get(&CacheKey::cart()), None);
}

/// A failed wishlist toggle restores both touched keys, including one
/// that was absent before the mutation.
#[tokio::test]
async fn wishlist_failure_restores_all_touched_keys() {
    let api = Arc::new(FakeApi::new());
    api.push_err(SyncError::Validation("product unavailable".into()));
    let (controller, cache, _feedback) = controller(api);
    cache.set(CacheKey::Wishlist, json!({"data": []}));
    // The check key is deliberately absent.

    let check_key = CacheKey::WishlistCheck {
        product_id: "P1".into(),
    };
    let result = controller
        .submit(MutationRequest::ToggleWishlist {
            product_id: "P1".into(),
        })
        .await;
    assert!(result.is_err());

    assert_eq!(cache.get(&CacheKey::Wishlist), Some(json!({"data": []})));
    assert_eq!(cache.get(&check_key), None);
}

/// Mark-all failure restores the list and the unread counter together.
#[tokio::test]
async fn mark_all_failure_restores_counter() {
    let api = Arc::new(FakeApi::new());
    api.push_err(SyncError::Network("offline".into()));
    let (controller, cache, _feedback) = controller(api);
    cache.set(
        CacheKey::Notifications,
        json!({"data": [{"id": "N1", "is_read": false}]}),
    );
    cache.set(CacheKey::NotificationCount, json!({"count": 1}));

    let result = controller
        .submit(MutationRequest::MarkAllNotificationsRead)
        .await;
    assert!(result.is_err());

    assert_eq!(
        cache.get(&CacheKey::NotificationCount),
        Some(json!({"count": 1}))
    );
    assert_eq!(
        cache.get(&CacheKey::Notifications),
        Some(json!({"data": [{"id": "N1", "is_read": false}]}))
    );
}

/// Network and validation rejections roll back identically; only the
/// message differs by kind.
#[test_case(MutationRequest::AddToCart { product: json!({"id": "P1"}), quantity: 1 }, "Không thể thêm vào giỏ hàng")]
#[test_case(MutationRequest::UpdateQuantity { purchase_id: "A".into(), quantity: 3 }, "Không thể cập nhật số lượng")]
#[test_case(MutationRequest::LikeReview { product_id: "P1".into(), review_id: "R1".into() }, "Không thể thích đánh giá")]
#[test_case(MutationRequest::MarkNotificationRead { notification_id: "N1".into() }, "Không thể đánh dấu đã đọc")]
#[tokio::test]
async fn failure_toast_names_the_operation(request: MutationRequest, expected: &str) {
    let api = Arc::new(FakeApi::new());
    api.push_err(SyncError::Validation("rejected".into()));
    let (controller, _cache, feedback) = controller(api);

    let result = controller.submit(request).await;
    assert!(result.is_err());

    let errors = feedback.toasts_at(ToastTier::Error);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, expected);
}

/// The documented cross-mutation race: mutation A's snapshot predates
/// mutation B's optimistic write, so A's failure rollback reverts B's
/// still-pending change too.
#[tokio::test]
async fn earlier_rollback_reverts_later_pending_write() {
    let (api, mut gates) = GatedApi::new(2);
    let api = Arc::new(api);
    let cache = CacheStore::new();
    let feedback = Arc::new(RecordingEmitter::new());
    let controller = Arc::new(OptimisticController::new(
        Arc::clone(&cache),
        Arc::clone(&feedback) as Arc<dyn FeedbackEmitter>,
        api,
    ));
    cache.set(
        CacheKey::cart(),
        json!({"data": [{"id": "A", "quantity": 2}]}),
    );

    // Mutation 1 snapshots the original cart.
    let first = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move {
            controller
                .submit(MutationRequest::UpdateQuantity {
                    purchase_id: "A".into(),
                    quantity: 9,
                })
                .await
        }
    });
    tokio::task::yield_now().await;

    // Mutation 2 applies on top of mutation 1's optimistic value.
    let second = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move {
            controller
                .submit(MutationRequest::AddToCart {
                    product: json!({"id": "P2"}),
                    quantity: 1,
                })
                .await
        }
    });
    tokio::task::yield_now().await;
    assert_eq!(cart_ids(&cache).len(), 2);

    let second_gate = gates.pop().unwrap();
    let first_gate = gates.pop().unwrap();

    // Mutation 1 fails while mutation 2 is still pending: the rollback
    // restores mutation 1's snapshot, reverting mutation 2's line.
    first_gate
        .send(Err(SyncError::Network("offline".into())))
        .unwrap();
    let _ = first.await.unwrap();
    assert_eq!(cart_ids(&cache), vec!["A".to_string()]);

    second_gate.send(Ok(json!({"id": "purchase-9"}))).unwrap();
    let _ = second.await.unwrap();
}

/// Beginning a mutation cancels an outstanding read for its key, so a
/// slow stale fetch cannot overwrite the optimistic value.
#[tokio::test]
async fn begin_cancels_inflight_reads() {
    let api = Arc::new(FakeApi::new());
    api.push_ok(json!({"id": "purchase-1"}));
    let (controller, cache, _feedback) = controller(api);
    cache.set(CacheKey::cart(), json!({"data": []}));

    // A read dispatched before the mutation...
    let ticket = cache.begin_read(CacheKey::cart());

    controller
        .submit(MutationRequest::AddToCart {
            product: json!({"id": "P1"}),
            quantity: 1,
        })
        .await
        .unwrap();

    // ...must be discarded when it finally lands.
    let landed = cache.complete_read(ticket, json!({"data": []}));
    assert!(!landed);
    assert_eq!(cart_ids(&cache), vec!["purchase-1".to_string()]);
}

/// The undo window expiring settles the removal without interaction.
#[tokio::test(start_paused = true)]
async fn undo_window_expiry_settles() {
    let api = Arc::new(FakeApi::new());
    api.push_ok(json!({"removed": ["A"]}));
    let cache = CacheStore::new();
    let feedback = Arc::new(RecordingEmitter::new());
    let controller = OptimisticController::with_config(
        Arc::clone(&cache),
        Arc::clone(&feedback) as Arc<dyn FeedbackEmitter>,
        api,
        agora_mutation::ControllerConfig {
            undo_window: Duration::from_secs(5),
        },
    );
    cache.set(CacheKey::cart(), json!({"data": [{"id": "A"}]}));

    let outcome = controller
        .submit(MutationRequest::RemoveFromCart {
            purchase_ids: vec!["A".into()],
        })
        .await
        .unwrap();
    let reversal = outcome.reversal.unwrap();

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(cache.is_stale(&CacheKey::cart()));

    // Reverting after expiry is a no-op.
    reversal.revert();
    assert_eq!(cache.get(&CacheKey::cart()), Some(json!({"data": []})));
}

/// A gated call releasing with success resolves to the server value.
#[tokio::test]
async fn gated_success_resolves_value() {
    let (api, mut gates) = GatedApi::new(1);
    let api = Arc::new(api);
    let (controller, cache, _feedback) = controller(api);
    cache.set(CacheKey::cart(), json!({"data": [{"id": "A", "quantity": 1}]}));

    let submit = tokio::spawn(async move {
        controller
            .submit(MutationRequest::UpdateQuantity {
                purchase_id: "A".into(),
                quantity: 2,
            })
            .await
    });
    tokio::task::yield_now().await;
    gates.remove(0).send(Ok(json!({"id": "A"}))).unwrap();

    let outcome: Result<_, _> = submit.await.unwrap();
    let value: Value = outcome.unwrap().value;
    assert_eq!(value["id"], "A");
}
