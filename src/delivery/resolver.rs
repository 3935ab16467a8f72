//! Mail-exchanger resolution

use std::collections::HashMap;

use hickory_resolver::Resolver;
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::lookup::MxLookup as MxAnswer;
use hickory_resolver::proto::op::ResponseCode;
use log::debug;

use crate::delivery::error::{DeliveryError, LookupError};

/// One ranked destination host for a domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxCandidate {
    pub host: String,
    /// Lower value means higher priority
    pub preference: u16,
}

impl MxCandidate {
    pub fn new(host: &str, preference: u16) -> Self {
        Self {
            host: host.to_string(),
            preference,
        }
    }
}

/// Domain-record lookup capability.
///
/// Returns the raw records in discovery order. An empty list means the domain exists but has
/// no MX records.
pub trait MxLookup {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxCandidate>, LookupError>;
}

impl<L: MxLookup + ?Sized> MxLookup for &L {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxCandidate>, LookupError> {
        (**self).lookup_mx(domain)
    }
}

/// Resolve `domain` into candidates sorted by ascending preference.
///
/// Equal preferences keep their discovery order.
pub fn resolve_candidates<L: MxLookup + ?Sized>(
    lookup: &L,
    domain: &str,
) -> Result<Vec<MxCandidate>, DeliveryError> {
    let mut candidates = lookup
        .lookup_mx(domain)
        .map_err(|source| DeliveryError::Lookup {
            domain: domain.to_string(),
            source,
        })?;

    if candidates.is_empty() {
        return Err(DeliveryError::NoCandidates {
            domain: domain.to_string(),
        });
    }

    candidates.sort_by_key(|candidate| candidate.preference);
    debug!("MX candidates for {domain}: {candidates:?}");
    Ok(candidates)
}

/// MX lookups through the system-configured DNS resolver
pub struct DnsResolver {
    inner: Resolver,
}

impl DnsResolver {
    /// Build a resolver from the host's resolver configuration
    pub fn from_system_conf() -> std::io::Result<Self> {
        Ok(Self {
            inner: Resolver::from_system_conf()?,
        })
    }
}

impl MxLookup for DnsResolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxCandidate>, LookupError> {
        candidates_from_answer(self.inner.mx_lookup(domain))
    }
}

/// Turn the outcome of an MX query into raw candidates.
///
/// A NOERROR answer without MX records is an empty list. NXDOMAIN and every other failure are
/// lookup errors.
fn candidates_from_answer(
    answer: Result<MxAnswer, ResolveError>,
) -> Result<Vec<MxCandidate>, LookupError> {
    match answer {
        Ok(response) => Ok(response
            .iter()
            .map(|mx| {
                let host = mx.exchange().to_utf8();
                MxCandidate::new(host.trim_end_matches('.'), mx.preference())
            })
            .collect()),
        Err(e) => match e.kind() {
            ResolveErrorKind::NoRecordsFound { response_code, .. }
                if *response_code == ResponseCode::NoError =>
            {
                Ok(Vec::new())
            }
            _ => Err(Box::new(e)),
        },
    }
}

/// Fixed domain-to-records table.
///
/// Domains that were never added fail the lookup, domains added with no records resolve to an
/// empty list.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    records: HashMap<String, Vec<MxCandidate>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the records of one domain, in discovery order
    pub fn with_records(mut self, domain: &str, records: Vec<MxCandidate>) -> Self {
        self.records.insert(domain.to_string(), records);
        self
    }
}

impl MxLookup for StaticResolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxCandidate>, LookupError> {
        self.records
            .get(domain)
            .cloned()
            .ok_or_else(|| format!("no such domain: {domain}").into())
    }
}
