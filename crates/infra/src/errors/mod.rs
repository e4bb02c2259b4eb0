//! Infrastructure-side error conversions

mod conversions;

pub use conversions::{InfraError, IntoDeliveryError};
