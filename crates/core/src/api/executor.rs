//! Remote call executor with per-call error disposition
//!
//! One executor instance serves one worker process. Every call site declares
//! which reason codes it wants treated as soft (log and skip) or retryable
//! (bounded backoff); anything unnamed propagates as a typed failure. The
//! executor never upgrades or downgrades a disposition on its own.
//!
//! Backoff shape: `attempt²` seconds for declared-retryable API reasons and
//! a flat short delay for transport-level failures, no jitter. Operators
//! observe these timings, so they are kept as-is.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use steward_domain::{ApiReason, Result, StewardError};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::ports::{ApiRequest, ApiResponse, ApiTransport, TransportError};
use crate::auth::CredentialSource;

/// Flat delay between attempts after a transport-level failure.
const NETWORK_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Query parameter carrying the page cursor.
const PAGE_TOKEN_PARAM: &str = "pageToken";

/// Field carrying the continuation cursor in paginated responses. Absence is
/// the termination condition.
const NEXT_PAGE_FIELD: &str = "nextPageToken";

/// Per-call error disposition, declared by the caller.
///
/// Reasons not named in any set default to throw. `throw` records the
/// reasons the caller intends to branch on; listing a reason there does not
/// change how it propagates, it documents call-site intent and is logged
/// when an undeclared reason surfaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallPolicy<'a> {
    /// Log a warning and return `Ok(None)`; the enclosing loop continues.
    pub soft: &'a [ApiReason],
    /// Back off and retry up to the configured ceiling, then escalate.
    pub retry: &'a [ApiReason],
    /// Typed failures the caller declares interest in handling.
    pub throw: &'a [ApiReason],
}

/// Executes remote operations with classification, bounded retries, and
/// multi-page accumulation.
pub struct ApiCallExecutor {
    transport: Arc<dyn ApiTransport>,
    credentials: Arc<dyn CredentialSource>,
    max_retries: usize,
    /// Resolved API-version/discovery metadata, keyed by API name.
    /// Process-local by design; workers never share this.
    metadata: Mutex<HashMap<String, Value>>,
}

impl ApiCallExecutor {
    pub fn new(
        transport: Arc<dyn ApiTransport>,
        credentials: Arc<dyn CredentialSource>,
        max_retries: usize,
    ) -> Self {
        Self {
            transport,
            credentials,
            max_retries: max_retries.max(1),
            metadata: Mutex::new(HashMap::new()),
        }
    }

    /// Invoke one remote operation.
    ///
    /// Returns `Ok(Some(body))` on success and `Ok(None)` when the failure
    /// reason was declared soft, so a soft-skipped item stays
    /// distinguishable from a legitimately empty result.
    ///
    /// # Errors
    /// - `StewardError::Network` after the retry ceiling on transport
    ///   failures.
    /// - `StewardError::Api` for classified API failures, including
    ///   retryable reasons that exhausted the ceiling (the attempt count is
    ///   stated in the message; there is no extra wrapper).
    pub async fn call(
        &self,
        request: &ApiRequest,
        policy: &CallPolicy<'_>,
    ) -> Result<Option<Value>> {
        let mut credential = self.credentials.credential().await?;
        let mut refreshed = false;
        let ceiling = self.max_retries;
        let mut attempt = 0_usize;

        loop {
            attempt += 1;
            let response = match self.transport.execute(&credential, request).await {
                Ok(response) => response,
                Err(err) => {
                    // Transport failures are always retryable up to the
                    // ceiling, then fatal.
                    if attempt >= ceiling {
                        return Err(StewardError::Network(format!(
                            "{} {} failed after {} attempts: {}",
                            request.method.as_str(),
                            request.path,
                            attempt,
                            err
                        )));
                    }
                    debug!(
                        attempt,
                        path = %request.path,
                        error = %err,
                        "transport failure, retrying"
                    );
                    tokio::time::sleep(network_delay(&err)).await;
                    continue;
                }
            };

            if response.is_success() {
                return Ok(Some(response.body));
            }

            let (reason, message) = classify(&response);

            if policy.soft.contains(&reason) {
                warn!(%reason, path = %request.path, "{message}");
                return Ok(None);
            }

            // Expired/invalid credential: exactly one refresh-and-retry
            // before the reason is handled like any other.
            if reason == ApiReason::AuthError && !refreshed {
                refreshed = true;
                debug!(path = %request.path, "authorization rejected, refreshing credential");
                credential = self.credentials.refresh().await?;
                attempt -= 1;
                continue;
            }

            if policy.retry.contains(&reason) {
                if attempt >= ceiling {
                    return Err(StewardError::Api {
                        reason,
                        message: format!("{message} ({attempt} attempts)"),
                    });
                }
                let delay = Duration::from_secs((attempt * attempt) as u64);
                info!(
                    %reason,
                    attempt,
                    delay_secs = delay.as_secs(),
                    path = %request.path,
                    "retryable API error, backing off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if !policy.throw.contains(&reason) {
                debug!(%reason, path = %request.path, "undeclared reason, propagating as fatal");
            }
            return Err(StewardError::Api { reason, message });
        }
    }

    /// Fetch every page of a paginated listing, preserving server order.
    ///
    /// The named result list from each page is appended into one sequence.
    /// Zero-item pages do not terminate the loop while a cursor is present;
    /// only a missing cursor does. A soft-skipped page ends accumulation
    /// with whatever was collected so far.
    ///
    /// # Errors
    /// Propagates the single-page call's errors unchanged.
    pub async fn get_all_pages(
        &self,
        request: ApiRequest,
        items_field: &str,
        policy: &CallPolicy<'_>,
        page_message: Option<&str>,
    ) -> Result<Vec<Value>> {
        let mut request = request;
        let mut items: Vec<Value> = Vec::new();
        let mut pages = 0_usize;

        loop {
            let Some(body) = self.call(&request, policy).await? else {
                break;
            };
            pages += 1;

            if let Some(page_items) = body.get(items_field).and_then(Value::as_array) {
                items.extend(page_items.iter().cloned());
            }

            if let Some(message) = page_message {
                // Advisory progress only; goes to the log stream.
                info!(pages, total = items.len(), "{message}");
            }

            match body.get(NEXT_PAGE_FIELD).and_then(Value::as_str) {
                Some(cursor) if !cursor.is_empty() => {
                    request.set_query(PAGE_TOKEN_PARAM, cursor.to_string());
                }
                _ => break,
            }
        }

        Ok(items)
    }

    /// Resolve API discovery/version metadata, fetching it at most once per
    /// API name for the lifetime of this executor.
    ///
    /// # Errors
    /// Propagates the underlying call's errors; an empty discovery response
    /// is an internal error.
    pub async fn discover(&self, api_name: &str, discovery_path: &str) -> Result<Value> {
        {
            let cache = self.metadata.lock().await;
            if let Some(document) = cache.get(api_name) {
                return Ok(document.clone());
            }
        }

        let document = self
            .call(&ApiRequest::get(discovery_path), &CallPolicy::default())
            .await?
            .ok_or_else(|| {
                StewardError::Internal(format!("discovery for {api_name} returned no document"))
            })?;

        self.metadata.lock().await.insert(api_name.to_string(), document.clone());
        Ok(document)
    }
}

fn network_delay(err: &TransportError) -> Duration {
    // Timeouts already consumed the configured request timeout; the flat
    // delay is only breathing room before the next attempt.
    match err {
        TransportError::Network(_) | TransportError::Timeout(_) => NETWORK_RETRY_DELAY,
    }
}

/// Extract (reason, message) from a non-2xx response body.
///
/// Handles both the structured error envelope
/// (`{"error": {"errors": [{"reason": ...}], "message": ...}}`) and the
/// RFC 6749 flat form (`{"error": "...", "error_description": "..."}`).
fn classify(response: &ApiResponse) -> (ApiReason, String) {
    let body = &response.body;

    let reason_str = body
        .pointer("/error/errors/0/reason")
        .and_then(Value::as_str)
        .or_else(|| body.pointer("/error/status").and_then(Value::as_str))
        .or_else(|| body.get("error").and_then(Value::as_str))
        .unwrap_or("");

    let message = body
        .pointer("/error/message")
        .and_then(Value::as_str)
        .or_else(|| body.get("error_description").and_then(Value::as_str))
        .map_or_else(
            || format!("request failed with status {}", response.status),
            ToString::to_string,
        );

    (ApiReason::from_http(response.status, reason_str), message)
}
