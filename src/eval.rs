//! Recursive policy evaluation: record building, directive dispatch, and
//! the top-level check entry points.

use std::net::IpAddr;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::dns::DnsResolver;
use crate::domain::{domain_from_email, normalize};
use crate::mechanism::{Directive, Kind};
use crate::net::{any_contains, Network};
use crate::record::SpfRecord;
use crate::{SpfError, SpfResult};

/// Evaluates sender policies against client addresses through an injected
/// resolver.
///
/// One call is one depth-first walk; there is no fan-out across directives
/// and no caching or retry layer here. The lookup budget lives on the
/// evaluation stack, so concurrent top-level calls on one evaluator never
/// interfere.
pub struct SpfEvaluator<R: DnsResolver> {
    resolver: Arc<R>,
}

impl<R: DnsResolver> SpfEvaluator<R> {
    pub fn new(resolver: Arc<R>) -> Self {
        Self { resolver }
    }

    /// Check whether `client` is authorized to send mail for the domain of
    /// `email`.
    ///
    /// Never fails for expected conditions: a domain without a policy maps
    /// to `None`, a TXT transport failure to `TempError`, a malformed or
    /// unsafe record to `PermError`. The error half of the pair is
    /// advisory: callers may log it but only the disposition matters.
    pub async fn test_address(
        &self,
        client: IpAddr,
        email: &str,
    ) -> (SpfResult, Option<SpfError>) {
        let Some(domain) = domain_from_email(email) else {
            return (
                SpfResult::PermError,
                Some(SpfError::InvalidEmail(email.to_string())),
            );
        };
        let domain = normalize(domain);

        let outcome = match self.build_record(&domain, None, 0).await {
            Ok(record) => (self.evaluate(&record, client).await, None),
            Err(err @ SpfError::Dns(_)) => (SpfResult::TempError, Some(err)),
            // A domain that publishes no policy is not an error condition.
            Err(SpfError::NoRecord(_)) => (SpfResult::None, None),
            Err(err) => (SpfResult::PermError, Some(err)),
        };
        debug!(%client, domain = %domain, result = %outcome.0, "SPF check complete");
        outcome
    }

    /// True iff [`test_address`](Self::test_address) yields `Pass`.
    pub async fn is_authorized(&self, client: IpAddr, email: &str) -> bool {
        self.test_address(client, email).await.0 == SpfResult::Pass
    }

    /// Build the policy record for `domain`, fetching the TXT text unless
    /// `raw` supplies it, and folding `inherited` lookups into the budget.
    pub async fn build_record(
        &self,
        domain: &str,
        raw: Option<&str>,
        inherited: usize,
    ) -> Result<SpfRecord, SpfError> {
        let text = match raw {
            Some(text) => text.to_string(),
            None => self.fetch_record(domain).await?,
        };
        SpfRecord::parse_with_lookups(domain, &text, inherited)
    }

    async fn fetch_record(&self, domain: &str) -> Result<String, SpfError> {
        let records = self.resolver.query_txt(domain).await?;
        records
            .into_iter()
            .find(|record| is_spf_record(record))
            .ok_or_else(|| SpfError::NoRecord(domain.to_string()))
    }

    /// Walk the record's directives in order against `client`, returning
    /// the first decisive disposition, or `Neutral` when nothing matches.
    pub async fn evaluate(&self, record: &SpfRecord, client: IpAddr) -> SpfResult {
        let mut lookups = record.lookups;
        self.evaluate_record(record, client, &mut lookups).await
    }

    async fn evaluate_record(
        &self,
        record: &SpfRecord,
        client: IpAddr,
        lookups: &mut usize,
    ) -> SpfResult {
        debug!(domain = %record.domain, %client, "evaluating SPF record");
        for directive in &record.directives {
            if let Some(result) = self
                .evaluate_directive(record, directive, client, lookups)
                .await
            {
                trace!(directive = %directive, result = %result, "directive matched");
                return result;
            }
        }
        SpfResult::Neutral
    }

    /// Dispatch one directive. `Some` means the directive matched and its
    /// disposition ends the walk; `None` falls through to the next
    /// directive.
    async fn evaluate_directive(
        &self,
        record: &SpfRecord,
        directive: &Directive,
        client: IpAddr,
        lookups: &mut usize,
    ) -> Option<SpfResult> {
        let target = directive.target(&record.domain);
        let matched = directive.qualifier.to_result();

        match directive.kind {
            Kind::All => Some(matched),

            Kind::Ip4 | Kind::Ip6 => {
                let network = Network::new(target, directive.prefix.as_deref()).ok()?;
                network.contains(client).then_some(matched)
            }

            Kind::A => {
                let addrs = self.resolver.query_host(target).await.ok()?;
                let networks = build_networks(&addrs, directive.prefix.as_deref());
                any_contains(&networks, client).then_some(matched)
            }

            Kind::Mx => {
                let exchangers = self.resolver.query_mx(target).await.ok()?;
                let mut networks = Vec::new();
                for host in exchangers {
                    if let Ok(addrs) = self.resolver.query_host(&host).await {
                        networks.extend(build_networks(&addrs, directive.prefix.as_deref()));
                    }
                }
                any_contains(&networks, client).then_some(matched)
            }

            Kind::Ptr => {
                let names = self.resolver.query_ptr(client).await.ok()?;
                let suffix = target.to_ascii_lowercase();
                names
                    .iter()
                    .any(|name| name.to_ascii_lowercase().ends_with(&suffix))
                    .then_some(matched)
            }

            Kind::Exists => {
                let addrs = self.resolver.query_host(target).await.ok()?;
                (!addrs.is_empty()).then_some(matched)
            }

            Kind::Include => match self.build_record(target, None, *lookups).await {
                // A missing or over-budget target record is a policy
                // defect and surfaces immediately.
                Err(SpfError::NoRecord(_) | SpfError::TooManyLookups) => {
                    Some(SpfResult::PermError)
                }
                // Anything else: the include simply does not match.
                Err(_) => None,
                Ok(child) => {
                    *lookups = child.lookups;
                    match Box::pin(self.evaluate_record(&child, client, lookups)).await {
                        result @ (SpfResult::Pass | SpfResult::PermError) => Some(result),
                        _ => None,
                    }
                }
            },

            Kind::Redirect => match self.build_record(target, None, *lookups).await {
                Err(SpfError::Dns(_)) => Some(SpfResult::TempError),
                Err(_) => Some(SpfResult::PermError),
                // Redirect replaces the remainder of the walk entirely.
                Ok(child) => {
                    *lookups = child.lookups;
                    Some(Box::pin(self.evaluate_record(&child, client, lookups)).await)
                }
            },
        }
    }
}

fn build_networks(addrs: &[IpAddr], prefix: Option<&str>) -> Vec<Network> {
    addrs
        .iter()
        .filter_map(|addr| Network::from_ip(*addr, prefix).ok())
        .collect()
}

/// Case-insensitive `v=spf1` marker check: the tag alone or followed by a
/// space. `v=spf10` is some other record.
fn is_spf_record(txt: &str) -> bool {
    let lower = txt.to_ascii_lowercase();
    lower == "v=spf1" || lower.starts_with("v=spf1 ")
}
