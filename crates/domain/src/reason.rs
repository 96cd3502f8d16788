//! Closed vocabulary of API error reason codes
//!
//! Every error returned by the remote API is classified into one of these
//! reasons. The reason is the contract between the call executor and its
//! callers: callers declare per call which reasons they want treated as soft
//! or retryable, and anything they do not name propagates as a typed error.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Classification reason attached to a remote API error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiReason {
    NotFound,
    Duplicate,
    RateLimited,
    QuotaExceeded,
    Forbidden,
    BadRequest,
    ServiceUnavailable,
    BackendError,
    AuthError,
    InvalidGrant,
    ConditionNotMet,
    Aborted,
    Unknown,
}

/// Server reason strings mapped to classification reasons, built once at
/// startup. The remote API spells the same condition several ways across
/// services (`userRateLimitExceeded` vs `rateLimitExceeded` and so on).
static REASON_TABLE: Lazy<HashMap<&'static str, ApiReason>> = Lazy::new(|| {
    HashMap::from([
        ("notFound", ApiReason::NotFound),
        ("userNotFound", ApiReason::NotFound),
        ("resourceNotFound", ApiReason::NotFound),
        ("groupNotFound", ApiReason::NotFound),
        ("duplicate", ApiReason::Duplicate),
        ("alreadyExists", ApiReason::Duplicate),
        ("rateLimitExceeded", ApiReason::RateLimited),
        ("userRateLimitExceeded", ApiReason::RateLimited),
        ("quotaExceeded", ApiReason::QuotaExceeded),
        ("dailyLimitExceeded", ApiReason::QuotaExceeded),
        ("forbidden", ApiReason::Forbidden),
        ("insufficientPermissions", ApiReason::Forbidden),
        ("domainPolicy", ApiReason::Forbidden),
        ("badRequest", ApiReason::BadRequest),
        ("invalid", ApiReason::BadRequest),
        ("invalidArgument", ApiReason::BadRequest),
        ("serviceNotAvailable", ApiReason::ServiceUnavailable),
        ("serviceLimit", ApiReason::ServiceUnavailable),
        ("backendError", ApiReason::BackendError),
        ("internalError", ApiReason::BackendError),
        ("authError", ApiReason::AuthError),
        ("required", ApiReason::AuthError),
        ("invalid_grant", ApiReason::InvalidGrant),
        ("conditionNotMet", ApiReason::ConditionNotMet),
        ("failedPrecondition", ApiReason::ConditionNotMet),
        ("aborted", ApiReason::Aborted),
        ("conflict", ApiReason::Aborted),
    ])
});

impl ApiReason {
    /// Classify an error from the HTTP status and the server's reason string.
    ///
    /// The reason string wins when it is a known spelling; the status code is
    /// the fallback for responses without a structured error body.
    #[must_use]
    pub fn from_http(status: u16, reason: &str) -> Self {
        if let Some(known) = REASON_TABLE.get(reason) {
            return *known;
        }
        match status {
            400 => Self::BadRequest,
            401 => Self::AuthError,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            409 => Self::Aborted,
            412 => Self::ConditionNotMet,
            429 => Self::RateLimited,
            500 => Self::BackendError,
            502 | 503 | 504 => Self::ServiceUnavailable,
            _ => Self::Unknown,
        }
    }

    /// Reasons that indicate transient server pressure and are worth a
    /// backoff-and-retry when the caller opts in.
    #[must_use]
    pub fn is_backoff(&self) -> bool {
        matches!(
            self,
            Self::RateLimited
                | Self::QuotaExceeded
                | Self::ServiceUnavailable
                | Self::BackendError
                | Self::Aborted
        )
    }

    /// Canonical snake_case name, as used in error messages and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Duplicate => "duplicate",
            Self::RateLimited => "rate_limited",
            Self::QuotaExceeded => "quota_exceeded",
            Self::Forbidden => "forbidden",
            Self::BadRequest => "bad_request",
            Self::ServiceUnavailable => "server_unavailable",
            Self::BackendError => "backend_error",
            Self::AuthError => "auth_error",
            Self::InvalidGrant => "invalid_grant",
            Self::ConditionNotMet => "condition_not_met",
            Self::Aborted => "aborted",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ApiReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_reason_strings_win_over_status() {
        // A 403 carrying a rate-limit reason is a backoff case, not a
        // permissions problem.
        assert_eq!(ApiReason::from_http(403, "userRateLimitExceeded"), ApiReason::RateLimited);
        assert_eq!(ApiReason::from_http(403, "quotaExceeded"), ApiReason::QuotaExceeded);
    }

    #[test]
    fn status_fallback_covers_unstructured_errors() {
        assert_eq!(ApiReason::from_http(404, ""), ApiReason::NotFound);
        assert_eq!(ApiReason::from_http(429, "whoKnows"), ApiReason::RateLimited);
        assert_eq!(ApiReason::from_http(503, ""), ApiReason::ServiceUnavailable);
        assert_eq!(ApiReason::from_http(418, ""), ApiReason::Unknown);
    }

    #[test]
    fn backoff_set_matches_transient_reasons() {
        assert!(ApiReason::RateLimited.is_backoff());
        assert!(ApiReason::ServiceUnavailable.is_backoff());
        assert!(!ApiReason::NotFound.is_backoff());
        assert!(!ApiReason::InvalidGrant.is_backoff());
    }

    #[test]
    fn display_uses_snake_case_vocabulary() {
        assert_eq!(ApiReason::ServiceUnavailable.to_string(), "server_unavailable");
        assert_eq!(ApiReason::NotFound.to_string(), "not_found");
    }
}
