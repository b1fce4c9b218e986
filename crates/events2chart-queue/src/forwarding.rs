//! Payload transform applied before forwarding to the analytics backend.

use chrono::SecondsFormat;
use events2chart_core::{WorkItem, TRANSPORT_FIELDS};

/// Build the payload submitted to the backend's write API.
///
/// Works on a copy: the stored payload is never mutated. Transport-only
/// fields are stripped, and the item's creation time is injected under
/// `timestamp_field` as an ISO-8601 string, which is the representation the
/// backend's time-range queries filter on.
pub fn forwarded_payload(item: &WorkItem, timestamp_field: &str) -> serde_json::Value {
    let mut payload = item.payload.clone();
    for field in TRANSPORT_FIELDS {
        payload.remove(*field);
    }
    payload.insert(
        timestamp_field.to_string(),
        serde_json::Value::String(
            item.created_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        ),
    );
    serde_json::Value::Object(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn item_with_payload(payload: serde_json::Value) -> WorkItem {
        let serde_json::Value::Object(map) = payload else {
            panic!("test payload must be an object");
        };
        WorkItem::new(
            1,
            "Purchases".to_string(),
            map,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn transport_fields_are_stripped_and_timestamp_injected() {
        let item = item_with_payload(serde_json::json!({
            "event_type": "Purchases",
            "status": "pending",
            "created_at": "2024-05-01T11:59:59Z",
            "customer": { "gender": "Female" },
            "cost": 10.0,
        }));

        let forwarded = forwarded_payload(&item, "timestamp");
        let obj = forwarded.as_object().unwrap();
        assert!(!obj.contains_key("event_type"));
        assert!(!obj.contains_key("status"));
        assert!(!obj.contains_key("created_at"));
        assert_eq!(obj["cost"], serde_json::json!(10.0));
        assert_eq!(obj["customer"]["gender"], serde_json::json!("Female"));
        assert_eq!(
            obj["timestamp"],
            serde_json::json!("2024-05-01T12:00:00.000Z")
        );
    }

    #[test]
    fn stored_payload_is_untouched() {
        let item = item_with_payload(serde_json::json!({
            "status": "pending",
            "cost": 10.0,
        }));
        let _ = forwarded_payload(&item, "timestamp");
        assert!(item.payload.contains_key("status"));
        assert!(!item.payload.contains_key("timestamp"));
    }
}
