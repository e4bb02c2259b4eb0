//! Conversions from external infrastructure errors into domain errors.

use std::error::Error as StdError;
use std::time::Duration;

use hookrelay_domain::{DeliveryError, HookRelayError};
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub HookRelayError);

impl From<InfraError> for HookRelayError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<HookRelayError> for InfraError {
    fn from(value: HookRelayError) -> Self {
        InfraError(value)
    }
}

/// Classify a transport failure as a [`DeliveryError`].
///
/// The request timeout is passed in because reqwest does not report which
/// limit fired.
pub trait IntoDeliveryError {
    fn into_delivery(self, timeout: Duration) -> DeliveryError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → DeliveryError */
/* -------------------------------------------------------------------------- */

impl IntoDeliveryError for HttpError {
    fn into_delivery(self, timeout: Duration) -> DeliveryError {
        if self.is_timeout() {
            return DeliveryError::timeout(timeout);
        }

        if let Some(status) = self.status() {
            return DeliveryError::http_status(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown Status"),
            );
        }

        if self.is_builder() {
            return DeliveryError::invalid_request(error_chain(&self));
        }

        DeliveryError::network(error_chain(&self))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → HookRelayError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        if value.is_builder() {
            return InfraError(HookRelayError::Config(format!(
                "failed to build HTTP client: {}",
                error_chain(&value)
            )));
        }
        InfraError(HookRelayError::Network(error_chain(&value)))
    }
}

/// `outer: inner: innermost`, so connect failures keep their OS reason.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
