//! HTTP transport

pub mod client;

pub use client::{DeliveryResponse, HttpClient, HttpClientBuilder};
