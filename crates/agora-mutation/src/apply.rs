//! Pure optimistic transforms over server response envelopes.
//!
//! Each function takes the current cached value (if any) and returns the
//! optimistic next value, never mutating in place. List envelopes have
//! the shape `{"data": [...]}`; counters are `{"count": n}`; the wishlist
//! check is `{"data": {"is_wishlisted": bool}}`.

use serde_json::{Value, json};
use uuid::Uuid;

/// Prefix marking an optimistic placeholder entity not yet assigned a
/// server identifier.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Allocate a fresh temporary entity id.
pub fn new_temp_id() -> String {
    format!("{TEMP_ID_PREFIX}{}", Uuid::new_v4())
}

/// Whether an id carries the temporary marker.
pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

/// Clone the `data` array of an envelope, or empty when absent.
fn data_array(current: Option<&Value>) -> Vec<Value> {
    current
        .and_then(|v| v.get("data"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn envelope(data: Vec<Value>) -> Value {
    json!({ "data": data })
}

/// Append a temporary cart line for `product`.
pub fn add_cart_line(current: Option<&Value>, product: &Value, quantity: u32, temp_id: &str) -> Value {
    let mut lines = data_array(current);
    lines.push(json!({
        "id": temp_id,
        "product": product,
        "quantity": quantity,
        "status": "in_cart",
    }));
    envelope(lines)
}

/// Patch the quantity of one cart line, leaving the rest untouched.
pub fn patch_quantity(current: Option<&Value>, purchase_id: &str, quantity: u32) -> Value {
    let lines = data_array(current)
        .into_iter()
        .map(|mut line| {
            if line.get("id").and_then(Value::as_str) == Some(purchase_id) {
                line["quantity"] = json!(quantity);
            }
            line
        })
        .collect();
    envelope(lines)
}

/// Drop every cart line whose id is in `purchase_ids`.
pub fn remove_lines(current: Option<&Value>, purchase_ids: &[String]) -> Value {
    let lines = data_array(current)
        .into_iter()
        .filter(|line| {
            line.get("id")
                .and_then(Value::as_str)
                .map(|id| !purchase_ids.iter().any(|p| p == id))
                .unwrap_or(true)
        })
        .collect();
    envelope(lines)
}

/// Toggle a product's membership in the wishlist envelope.
pub fn toggle_wishlist_list(current: Option<&Value>, product_id: &str) -> Value {
    let mut lines = data_array(current);
    let before = lines.len();
    lines.retain(|line| line.get("id").and_then(Value::as_str) != Some(product_id));
    if lines.len() == before {
        lines.push(json!({ "id": product_id }));
    }
    envelope(lines)
}

/// Flip the per-product wishlist check flag.
pub fn toggle_wishlist_check(current: Option<&Value>) -> Value {
    let wishlisted = current
        .and_then(|v| v.get("data"))
        .and_then(|d| d.get("is_wishlisted"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    json!({ "data": { "is_wishlisted": !wishlisted } })
}

/// Toggle the like on one review: flips `is_liked` and adjusts
/// `like_count` accordingly.
pub fn like_review(current: Option<&Value>, review_id: &str) -> Value {
    let lines = data_array(current)
        .into_iter()
        .map(|mut review| {
            if review.get("id").and_then(Value::as_str) == Some(review_id) {
                let liked = review
                    .get("is_liked")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let count = review
                    .get("like_count")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                let next = if liked { count.saturating_sub(1) } else { count + 1 };
                review["is_liked"] = json!(!liked);
                review["like_count"] = json!(next);
            }
            review
        })
        .collect();
    envelope(lines)
}

/// Mark one notification read.
pub fn mark_notification_read(current: Option<&Value>, notification_id: &str) -> Value {
    let lines = data_array(current)
        .into_iter()
        .map(|mut n| {
            if n.get("id").and_then(Value::as_str) == Some(notification_id) {
                n["is_read"] = json!(true);
            }
            n
        })
        .collect();
    envelope(lines)
}

/// Mark every notification read.
pub fn mark_all_notifications_read(current: Option<&Value>) -> Value {
    let lines = data_array(current)
        .into_iter()
        .map(|mut n| {
            n["is_read"] = json!(true);
            n
        })
        .collect();
    envelope(lines)
}

/// Decrement an unread counter envelope, saturating at zero.
pub fn decrement_count(current: Option<&Value>) -> Value {
    let count = current
        .and_then(|v| v.get("count"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    json!({ "count": count.saturating_sub(1) })
}

/// Zero an unread counter envelope.
pub fn zero_count(_current: Option<&Value>) -> Value {
    json!({ "count": 0 })
}

/// Replace the entity carrying `temp_id` with the server-confirmed
/// entity, matched by the temporary-id marker rather than by value.
///
/// Returns the value unchanged when the temp id is not present.
pub fn replace_temp_entity(value: &Value, temp_id: &str, server_entity: &Value) -> Value {
    let Some(lines) = value.get("data").and_then(Value::as_array) else {
        return value.clone();
    };
    let lines = lines
        .iter()
        .map(|line| {
            if line.get("id").and_then(Value::as_str) == Some(temp_id) {
                server_entity.clone()
            } else {
                line.clone()
            }
        })
        .collect();
    json!({ "data": Value::Array(lines) })
}

/// Whether any entity in the envelope still carries the temporary marker.
pub fn contains_temp_entity(value: &Value) -> bool {
    value
        .get("data")
        .and_then(Value::as_array)
        .map(|lines| {
            lines.iter().any(|line| {
                line.get("id")
                    .and_then(Value::as_str)
                    .map(is_temp_id)
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false)
}
