//! Parsed SPF policy records and the resolution budget.

use std::fmt;

use crate::domain::domains_equal;
use crate::mechanism::{Directive, Kind, Qualifier};
use crate::SpfError;

/// Ceiling on lookup-incurring directives across one recursive evaluation
/// chain (RFC 7208 section 4.6.4). Record construction fails once the
/// running count reaches it.
pub const MAX_LOOKUPS: usize = 10;

/// A parsed sender policy for one domain. Immutable after construction;
/// discarded when the enclosing evaluation returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpfRecord {
    /// Record text as found in DNS.
    pub raw: String,
    /// Domain the record was published under.
    pub domain: String,
    /// Version tag, without the leading `v=`.
    pub version: String,
    /// Directives in file order.
    pub directives: Vec<Directive>,
    /// Lookup-incurring directives accumulated so far in the chain rooted
    /// at the top-level request, this record's included.
    pub lookups: usize,
}

impl SpfRecord {
    /// Parse a record for `domain` with a fresh lookup budget.
    pub fn parse(domain: &str, raw: &str) -> Result<SpfRecord, SpfError> {
        Self::parse_with_lookups(domain, raw, 0)
    }

    /// Parse a record, inheriting the lookup count accumulated by the
    /// records that delegated here.
    pub fn parse_with_lookups(
        domain: &str,
        raw: &str,
        inherited: usize,
    ) -> Result<SpfRecord, SpfError> {
        let trimmed = raw.trim();
        let mut tokens = trimmed.split_whitespace();

        let version = match tokens.next() {
            Some(tag) if tag.eq_ignore_ascii_case("v=spf1") => tag[2..].to_string(),
            _ => return Err(SpfError::InvalidRecord(trimmed.to_string())),
        };

        let mut directives = Vec::new();
        let mut lookups = inherited;

        for token in tokens {
            let (qualifier, rest) = Qualifier::parse_prefix(token);
            let directive = Directive::parse(rest, qualifier)
                .map_err(|_| SpfError::InvalidMechanism(token.to_string()))?;

            // Direct self-reference only; longer cycles are caught by the
            // lookup budget.
            if directive.kind == Kind::Include
                && directive
                    .domain
                    .as_deref()
                    .is_some_and(|target| domains_equal(target, domain))
            {
                return Err(SpfError::IncludeLoop(domain.to_string()));
            }

            if directive.kind.requires_lookup() {
                lookups += 1;
            }
            directives.push(directive);
        }

        if lookups >= MAX_LOOKUPS {
            return Err(SpfError::TooManyLookups);
        }

        Ok(SpfRecord {
            raw: trimmed.to_string(),
            domain: domain.to_string(),
            version,
            directives,
            lookups,
        })
    }
}

impl fmt::Display for SpfRecord {
    /// Canonical record text: version tag plus rendered directives.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v={}", self.version)?;
        for directive in &self.directives {
            write!(f, " {directive}")?;
        }
        Ok(())
    }
}
