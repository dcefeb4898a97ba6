//! REST API definitions.

pub mod auth;

use axum::{
    routing::{get, post},
    Router,
};
use serde::Serialize;

/// Builds a [`Router`] serving the REST API.
///
/// The [`Service`] is expected to be provided as an [`Extension`].
///
/// [`Extension`]: axum::Extension
/// [`Service`]: crate::Service
#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/verify", get(auth::verify))
}

/// Success envelope of the REST API.
///
/// The error counterpart is produced by [`Error`]'s [`IntoResponse`].
///
/// [`Error`]: crate::Error
/// [`IntoResponse`]: axum::response::IntoResponse
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    /// Always `true` for successful responses.
    pub success: bool,

    /// Human-readable message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,

    /// Payload of the response.
    pub data: T,
}

impl<T> Envelope<T> {
    /// Creates a new [`Envelope`] wrapping the provided `data`.
    #[must_use]
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    /// Creates a new [`Envelope`] wrapping the provided `data` along with a
    /// `message`.
    #[must_use]
    pub fn with_message(message: &'static str, data: T) -> Self {
        Self {
            success: true,
            message: Some(message),
            data,
        }
    }
}
