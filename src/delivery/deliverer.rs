//! Ranked, sequential delivery of one message to one recipient

use log::{info, warn};

use crate::delivery::error::DeliveryError;
use crate::delivery::exchange::{DeliveryConfig, deliver_to_host};
use crate::delivery::resolver::{MxLookup, resolve_candidates};

/// Split an address into local part and domain. Exactly one `@` is required.
pub fn split_address(address: &str) -> Result<(&str, &str), DeliveryError> {
    let mut parts = address.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty() => {
            Ok((local, domain))
        }
        _ => Err(DeliveryError::InvalidAddress(address.to_string())),
    }
}

/// Relays messages to the mail exchangers of the recipient's domain.
///
/// Hosts are tried one after another in preference order; the first host that accepts the
/// message ends the attempt. Nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct Deliverer<L> {
    lookup: L,
    config: DeliveryConfig,
}

impl<L: MxLookup> Deliverer<L> {
    pub fn new(lookup: L, config: DeliveryConfig) -> Self {
        Self { lookup, config }
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Deliver `body_lines` from `sender` to a single `recipient`.
    ///
    /// Returns the host that accepted the message. When every candidate fails, the last
    /// host's error is returned wrapped in [`DeliveryError::Exhausted`].
    pub fn deliver(
        &self,
        sender: &str,
        recipient: &str,
        body_lines: &[String],
    ) -> Result<String, DeliveryError> {
        let (_, domain) = split_address(recipient)?;
        let candidates = resolve_candidates(&self.lookup, domain)?;

        let mut last_error = None;
        for mx in candidates {
            match deliver_to_host(&mx.host, &self.config, sender, recipient, body_lines) {
                Ok(()) => {
                    info!("delivered <{sender}> -> <{recipient}> via {}", mx.host);
                    return Ok(mx.host);
                }
                Err(e) => {
                    warn!("{} (preference {}) failed: {e}", mx.host, mx.preference);
                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error.unwrap_or_else(|| DeliveryError::NoCandidates {
            domain: domain.to_string(),
        });
        Err(DeliveryError::Exhausted(Box::new(last_error)))
    }
}
