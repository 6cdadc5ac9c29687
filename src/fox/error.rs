use thiserror::Error;

/// Errors from the FoxWQ API.
///
/// `is_retryable()` separates transient transport failures from responses
/// that will not improve on a second attempt.
#[derive(Debug, Error)]
pub enum FoxError {
    #[error("HTTP request to {endpoint} failed: {source}")]
    Http {
        endpoint: &'static str,
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {endpoint}")]
    HttpStatus { endpoint: &'static str, status: u16 },

    #[error("No record content for chess id {0}")]
    NotFound(String),

    #[error("Malformed response from {endpoint}: {reason}")]
    MalformedResponse {
        endpoint: &'static str,
        reason: String,
    },

    #[error("Player '{0}' not found")]
    UnknownPlayer(String),
}

impl FoxError {
    pub fn malformed(endpoint: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            endpoint,
            reason: reason.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            FoxError::Http { source, .. } => !source.is_decode() && !source.is_builder(),
            FoxError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            FoxError::NotFound(_) => false,
            FoxError::MalformedResponse { .. } => false,
            FoxError::UnknownPlayer(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_retryable() {
        for status in [429, 500, 502, 503] {
            let e = FoxError::HttpStatus {
                endpoint: "TXWQFetchChess",
                status,
            };
            assert!(e.is_retryable(), "{status} should be retried");
        }
    }

    #[test]
    fn test_client_errors_not_retryable() {
        for status in [400, 401, 403, 404] {
            let e = FoxError::HttpStatus {
                endpoint: "TXWQFetchChess",
                status,
            };
            assert!(!e.is_retryable(), "{status} should not be retried");
        }
    }

    #[test]
    fn test_missing_content_not_retryable() {
        assert!(!FoxError::NotFound("123".into()).is_retryable());
        assert!(!FoxError::malformed("TXWQFetchChessList", "no chesslist").is_retryable());
    }

    #[test]
    fn test_connection_refused_retryable() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let err = rt
            .block_on(reqwest::Client::new().get("http://127.0.0.1:1").send())
            .unwrap_err();
        let e = FoxError::Http {
            endpoint: "TXWQFetchChess",
            source: err,
        };
        assert!(e.is_retryable());
    }
}
