//! SPF record parsing and evaluation.
//!
//! Parses a domain's `v=spf1` TXT record into ordered directives and
//! evaluates them against a client address, following `include` and
//! `redirect` delegation with a shared DNS lookup budget. The outcome is
//! one of the seven standard [`SpfResult`] dispositions.
//!
//! DNS caching and retries are the caller's responsibility. All network
//! access goes through the [`DnsResolver`] trait; implement it with
//! caching at the resolver layer.

pub mod dns;
pub mod domain;
pub mod eval;
pub mod mechanism;
pub mod net;
pub mod record;

pub use dns::{DnsError, DnsResolver, HickoryResolver, MockResolver};
pub use eval::SpfEvaluator;
pub use mechanism::{Directive, Kind, Qualifier};
pub use net::Network;
pub use record::{SpfRecord, MAX_LOOKUPS};

use std::fmt;

use thiserror::Error;

/// Outcome of evaluating a sender policy against a client address.
///
/// `None` and `Neutral` are non-authoritative defaults; `TempError`
/// signals a transient resolution failure; `PermError` a malformed or
/// unsafe policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpfResult {
    Pass,
    Fail,
    SoftFail,
    Neutral,
    None,
    TempError,
    PermError,
}

impl fmt::Display for SpfResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpfResult::Pass => "Pass",
            SpfResult::Fail => "Fail",
            SpfResult::SoftFail => "SoftFail",
            SpfResult::Neutral => "Neutral",
            SpfResult::None => "None",
            SpfResult::TempError => "TempError",
            SpfResult::PermError => "PermError",
        };
        f.write_str(name)
    }
}

/// Record construction errors. Evaluation itself never fails; everything
/// here is detected while building a record, and the top-level entry point
/// maps each variant to a disposition.
#[derive(Debug, Error)]
pub enum SpfError {
    /// The resolver could not complete a TXT lookup.
    #[error("DNS error: {0}")]
    Dns(#[from] DnsError),
    /// No `v=spf1` record among the domain's TXT records.
    #[error("no SPF record found for {0}")]
    NoRecord(String),
    /// Record text does not carry the `v=spf1` version marker.
    #[error("invalid SPF record: {0}")]
    InvalidRecord(String),
    /// A token failed to parse as a directive, or failed its per-kind
    /// validity check.
    #[error("invalid mechanism: {0}")]
    InvalidMechanism(String),
    /// An `include` names the record's own domain.
    #[error("include loop detected: {0}")]
    IncludeLoop(String),
    /// The resolution budget reached [`MAX_LOOKUPS`].
    #[error("too many DNS lookups")]
    TooManyLookups,
    /// The email address handed to the entry point has no `@`.
    #[error("email address has no domain part: {0}")]
    InvalidEmail(String),
}
