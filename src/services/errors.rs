use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::io::ErrorKind;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::error;

use crate::clients::gaia::RelayError;

const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCategory {
    #[serde(rename = "NETWORK_ERROR")]
    Network,
    #[serde(rename = "API_ERROR")]
    Api,
    #[serde(rename = "AUTHENTICATION_ERROR")]
    Authentication,
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    #[serde(rename = "UNKNOWN_ERROR")]
    Unknown,
}

/// One classified failure, captured at the moment it was caught.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub category: ErrorCategory,
    pub message: String,
    pub cause: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, String>>,
}

/// Assign exactly one category to a failure.
pub fn classify(error: &RelayError) -> ErrorCategory {
    classify_parts(
        &error.to_string(),
        error.status(),
        is_connection_failure(error),
    )
}

/// Ordered rules, first match wins. The order is observable: a 401 is
/// Authentication even though the Api rule would also match it, and a message
/// mentioning "network" wins over any attached status.
fn classify_parts(message: &str, status: Option<u16>, connection_failure: bool) -> ErrorCategory {
    if connection_failure || message.contains("network") || message.contains("fetch") {
        return ErrorCategory::Network;
    }
    if matches!(status, Some(401) | Some(403)) {
        return ErrorCategory::Authentication;
    }
    if status.map_or(false, |s| s >= 400) || message.contains("API") {
        return ErrorCategory::Api;
    }
    if message.contains("validation") || message.contains("invalid") {
        return ErrorCategory::Validation;
    }
    ErrorCategory::Unknown
}

fn is_connection_failure(error: &RelayError) -> bool {
    let RelayError::Transport(e) = error else {
        return false;
    };
    if e.is_connect() || e.is_timeout() {
        return true;
    }
    let mut source = std::error::Error::source(e);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            return matches!(
                io.kind(),
                ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset | ErrorKind::TimedOut
            );
        }
        source = err.source();
    }
    false
}

/// Bounded, newest-first history of classified failures.
///
/// Constructed explicitly and shared by reference through the server context;
/// writes from concurrent requests interleave without a defined order, which
/// is acceptable for best-effort diagnostics. The oldest entry is evicted
/// once the store is full. Nothing survives a restart.
pub struct ErrorStore {
    entries: Mutex<VecDeque<ErrorInfo>>,
    capacity: usize,
}

impl ErrorStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ErrorStore {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn record(&self, info: ErrorInfo) {
        let mut entries = self.entries.lock().unwrap();
        entries.push_front(info);
        entries.truncate(self.capacity);
    }

    pub fn recent(&self, limit: usize) -> Vec<ErrorInfo> {
        let entries = self.entries.lock().unwrap();
        entries.iter().take(limit).cloned().collect()
    }

    #[allow(dead_code)]
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl Default for ErrorStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify a failure, log it, and append it to the store.
pub fn report(
    store: &ErrorStore,
    error: &RelayError,
    context: Option<HashMap<String, String>>,
) -> ErrorInfo {
    let category = classify(error);
    let info = ErrorInfo {
        category,
        message: message_for(error, category),
        cause: format!("{:?}", error),
        occurred_at: Utc::now(),
        context,
    };
    error!(
        "{:?}: {} (context: {:?})",
        info.category, info.message, info.context
    );
    store.record(info.clone());
    info
}

fn message_for(error: &RelayError, category: ErrorCategory) -> String {
    let message = error.to_string();
    if !message.is_empty() {
        return message;
    }
    match category {
        ErrorCategory::Network => {
            "Network error occurred. Please check your internet connection and try again."
        }
        ErrorCategory::Api => {
            "An error occurred while communicating with the server. Please try again later."
        }
        ErrorCategory::Authentication => {
            "Authentication error. Please check your credentials or log in again."
        }
        ErrorCategory::Validation => "Validation error. Please check your input and try again.",
        ErrorCategory::Unknown => "An unexpected error occurred. Please try again later.",
    }
    .to_string()
}

/// One fixed sentence per category for end-user display, independent of
/// whatever the original failure said.
pub fn user_message(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Network => {
            "Unable to connect to the server. Please check your internet connection and try again."
        }
        ErrorCategory::Api => {
            "The server encountered an issue processing your request. Please try again later."
        }
        ErrorCategory::Authentication => {
            "Your session may have expired. Please log in again to continue."
        }
        ErrorCategory::Validation => "Please check your input and try again.",
        ErrorCategory::Unknown => "Something went wrong. Please try again later.",
    }
}

/// Run one unit of work, reporting any failure to the store before
/// propagating it unchanged.
pub async fn with_error_handling<T, F, Fut>(
    store: &ErrorStore,
    context: HashMap<String, String>,
    work: F,
) -> Result<T, RelayError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, RelayError>>,
{
    match work().await {
        Ok(value) => Ok(value),
        Err(error) => {
            report(store, &error, Some(context));
            Err(error)
        }
    }
}
