use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_COUPON_TITLE: &str = "Unknown coupon";
pub const DEFAULT_EVENT: &str = "Coupon redeemed";
pub const DEFAULT_MESSAGE: &str = "A coupon has been redeemed.";

/// Inbound redemption event as posted by the coupons page.
///
/// Every field is optional. Only non-empty JSON strings are kept; any other
/// value (null, number, object, empty string) reads as absent so that the
/// default for that field applies.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NotificationRequest {
    #[serde(default, deserialize_with = "non_empty_string")]
    pub coupon_title: Option<String>,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub event: Option<String>,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub timestamp: Option<String>,
}

fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    })
}

impl NotificationRequest {
    /// Parse a raw request body. An empty body, or a JSON value that is not
    /// an object, yields a request with every field absent.
    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        let value: serde_json::Value = serde_json::from_slice(body)?;
        if value.is_object() {
            serde_json::from_value(value)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply the per-field defaults. `now` is used for a missing timestamp.
    pub fn into_template_data(self, now: DateTime<Utc>) -> TemplateData {
        TemplateData {
            coupon_title: self
                .coupon_title
                .unwrap_or_else(|| DEFAULT_COUPON_TITLE.to_string()),
            event: self.event.unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            message: self.message.unwrap_or_else(|| DEFAULT_MESSAGE.to_string()),
            timestamp: self
                .timestamp
                .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

/// Variables handed to the provider-side email template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateData {
    pub coupon_title: String,
    pub event: String,
    pub message: String,
    pub timestamp: String,
}

/// JSON body returned by the relay endpoint, one per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResult {
    pub success: bool,
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl NotificationResult {
    pub fn delivered(message_id: Option<String>) -> Self {
        Self {
            success: true,
            message_id,
            error: None,
            details: None,
        }
    }

    pub fn failed(
        error: impl Into<String>,
        details: Option<String>,
        message_id: Option<String>,
    ) -> Self {
        Self {
            success: false,
            message_id,
            error: Some(error.into()),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 14, 9, 30, 0).unwrap()
    }

    #[test]
    fn empty_body_takes_every_default() {
        let data = NotificationRequest::from_json(b"")
            .unwrap()
            .into_template_data(fixed_now());

        assert_eq!(data.coupon_title, DEFAULT_COUPON_TITLE);
        assert_eq!(data.event, DEFAULT_EVENT);
        assert_eq!(data.message, DEFAULT_MESSAGE);
        assert_eq!(data.timestamp, "2026-02-14T09:30:00.000Z");
    }

    #[test]
    fn defaults_apply_per_field() {
        let body = br#"{"coupon_title": "Breakfast in bed", "event": "", "message": 42}"#;
        let data = NotificationRequest::from_json(body)
            .unwrap()
            .into_template_data(fixed_now());

        assert_eq!(data.coupon_title, "Breakfast in bed");
        assert_eq!(data.event, DEFAULT_EVENT);
        assert_eq!(data.message, DEFAULT_MESSAGE);
        assert_eq!(data.timestamp, "2026-02-14T09:30:00.000Z");
    }

    #[test]
    fn any_timestamp_string_is_passed_through() {
        let body = br#"{"timestamp": "2/14/2026, 9:30:00 AM", "unknown": true}"#;
        let data = NotificationRequest::from_json(body)
            .unwrap()
            .into_template_data(fixed_now());

        assert_eq!(data.timestamp, "2/14/2026, 9:30:00 AM");
    }

    #[test]
    fn non_object_json_reads_as_empty_request() {
        let bodies: [&[u8]; 4] = [b"[]", b"null", b"\"text\"", b"7"];
        for body in bodies {
            assert_eq!(
                NotificationRequest::from_json(body).unwrap(),
                NotificationRequest::default()
            );
        }
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(NotificationRequest::from_json(b"{not json").is_err());
    }

    #[test]
    fn result_serializes_in_camel_case() {
        let ok = serde_json::to_value(NotificationResult::delivered(Some("abc".into()))).unwrap();
        assert_eq!(ok, serde_json::json!({"success": true, "messageId": "abc"}));

        let failed = serde_json::to_value(NotificationResult::failed("boom", None, None)).unwrap();
        assert_eq!(
            failed,
            serde_json::json!({"success": false, "messageId": null, "error": "boom"})
        );
    }
}
