//! Error types for outbound delivery

use thiserror::Error;

/// Boxed error from an injected lookup capability
pub type LookupError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("failed to lookup MX records for {domain}: {source}")]
    Lookup {
        domain: String,
        #[source]
        source: LookupError,
    },

    #[error("no MX records found for domain: {domain}")]
    NoCandidates { domain: String },

    #[error("failed to connect to MX server {host}: {source}")]
    Connect {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("deadline exceeded talking to {host}")]
    Timeout { host: String },

    #[error("{stage}: {source}")]
    Io {
        stage: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected response for {command}: {reply}")]
    UnexpectedReply { command: String, reply: String },

    #[error("failed to send email via any MX server: {0}")]
    Exhausted(#[source] Box<DeliveryError>),
}

impl DeliveryError {
    /// Whether the destination domain had no usable mail exchangers at all
    pub fn is_no_candidates(&self) -> bool {
        matches!(self, DeliveryError::NoCandidates { .. })
    }

    /// The last per-host failure, when every candidate was tried
    pub fn last_host_error(&self) -> Option<&DeliveryError> {
        match self {
            DeliveryError::Exhausted(last) => Some(last.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_wraps_last_error() {
        let last = DeliveryError::UnexpectedReply {
            command: "RCPT TO:<u@local.domain>".to_string(),
            reply: "550 No such user here".to_string(),
        };
        let err = DeliveryError::Exhausted(Box::new(last));

        assert_eq!(
            err.to_string(),
            "failed to send email via any MX server: unexpected response for \
             RCPT TO:<u@local.domain>: 550 No such user here"
        );
        assert!(matches!(
            err.last_host_error(),
            Some(DeliveryError::UnexpectedReply { .. })
        ));
    }

    #[test]
    fn test_lookup_and_no_candidates_are_distinct() {
        let lookup = DeliveryError::Lookup {
            domain: "example.com".to_string(),
            source: "SERVFAIL".into(),
        };
        let empty = DeliveryError::NoCandidates {
            domain: "example.com".to_string(),
        };

        assert!(!lookup.is_no_candidates());
        assert!(empty.is_no_candidates());
        assert_eq!(
            lookup.to_string(),
            "failed to lookup MX records for example.com: SERVFAIL"
        );
    }
}
