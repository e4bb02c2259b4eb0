//! Envelope and header construction

use chrono::Utc;
use hookrelay_domain::constants::{HEADER_EVENT_ID, HEADER_EVENT_TYPE, HEADER_WEBHOOK_SECRET};
use hookrelay_domain::{DeliveryError, SystemContext, WebhookEnvelope, WebhookEvent};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

/// Wrap `event` in a fresh envelope.
///
/// The event id and type are taken from the event so every retry of the same
/// event carries the same `eventId`.
pub fn build_envelope<E: WebhookEvent>(
    event: &E,
    context: Option<&Value>,
    environment: &str,
) -> Result<WebhookEnvelope, DeliveryError> {
    let payload = serde_json::to_value(event).map_err(|err| {
        DeliveryError::invalid_request(format!("failed to serialize event payload: {err}"))
    })?;
    let now = Utc::now();

    Ok(WebhookEnvelope {
        event_id: event.event_id().to_owned(),
        event_type: event.event_type().to_owned(),
        event_timestamp: now,
        payload,
        system_context: SystemContext {
            environment: environment.to_owned(),
            timestamp: now,
            request_metadata: context.cloned().unwrap_or(Value::Null),
        },
    })
}

/// Per-request headers; `Content-Type` and `User-Agent` are set by the client.
pub fn build_headers(
    envelope: &WebhookEnvelope,
    secret: Option<&str>,
) -> Result<HeaderMap, DeliveryError> {
    let mut headers = HeaderMap::new();
    insert(&mut headers, HEADER_EVENT_ID, &envelope.event_id)?;
    insert(&mut headers, HEADER_EVENT_TYPE, &envelope.event_type)?;
    if let Some(secret) = secret {
        insert(&mut headers, HEADER_WEBHOOK_SECRET, secret)?;
    }
    Ok(headers)
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) -> Result<(), DeliveryError> {
    let value = HeaderValue::from_str(value).map_err(|_| {
        DeliveryError::invalid_request(format!("{name} contains characters not allowed in a header"))
    })?;
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|err| DeliveryError::invalid_request(format!("invalid header name {name}: {err}")))?;
    headers.insert(name, value);
    Ok(())
}
