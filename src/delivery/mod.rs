//! Sending side: MX resolution and ranked relay

pub mod deliverer;
pub mod error;
pub mod exchange;
pub mod resolver;

pub use deliverer::{Deliverer, split_address};
pub use error::{DeliveryError, LookupError};
pub use exchange::{DeliveryConfig, deliver_to_host};
pub use resolver::{DnsResolver, MxCandidate, MxLookup, StaticResolver, resolve_candidates};
