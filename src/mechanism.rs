//! Directive parsing and rendering (RFC 7208 mechanism syntax).

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::{SpfError, SpfResult};

/// Qualifier prefix on a directive. Defaults to Pass if omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    Pass,     // +
    Fail,     // -
    SoftFail, // ~
    Neutral,  // ?
}

impl Qualifier {
    /// Strip a leading qualifier sigil. Returns (Qualifier, remaining str);
    /// absence implies Pass.
    pub fn parse_prefix(s: &str) -> (Qualifier, &str) {
        match s.as_bytes().first() {
            Some(b'+') => (Qualifier::Pass, &s[1..]),
            Some(b'-') => (Qualifier::Fail, &s[1..]),
            Some(b'~') => (Qualifier::SoftFail, &s[1..]),
            Some(b'?') => (Qualifier::Neutral, &s[1..]),
            _ => (Qualifier::Pass, s),
        }
    }

    /// The disposition a matching directive with this qualifier yields.
    pub fn to_result(self) -> SpfResult {
        match self {
            Qualifier::Pass => SpfResult::Pass,
            Qualifier::Fail => SpfResult::Fail,
            Qualifier::SoftFail => SpfResult::SoftFail,
            Qualifier::Neutral => SpfResult::Neutral,
        }
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sigil = match self {
            Qualifier::Pass => '+',
            Qualifier::Fail => '-',
            Qualifier::SoftFail => '~',
            Qualifier::Neutral => '?',
        };
        write!(f, "{sigil}")
    }
}

/// Mechanism kind. The set is fixed by the record grammar and will not
/// grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    All,
    A,
    Mx,
    Ptr,
    Ip4,
    Ip6,
    Exists,
    Include,
    Redirect,
}

impl Kind {
    fn from_name(name: &str) -> Option<Kind> {
        match name.to_ascii_lowercase().as_str() {
            "all" => Some(Kind::All),
            "a" => Some(Kind::A),
            "mx" => Some(Kind::Mx),
            "ptr" => Some(Kind::Ptr),
            "ip4" => Some(Kind::Ip4),
            "ip6" => Some(Kind::Ip6),
            "exists" => Some(Kind::Exists),
            "include" => Some(Kind::Include),
            "redirect" => Some(Kind::Redirect),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Kind::All => "all",
            Kind::A => "a",
            Kind::Mx => "mx",
            Kind::Ptr => "ptr",
            Kind::Ip4 => "ip4",
            Kind::Ip6 => "ip6",
            Kind::Exists => "exists",
            Kind::Include => "include",
            Kind::Redirect => "redirect",
        }
    }

    /// Whether evaluating this kind may trigger a DNS lookup. These count
    /// against the resolution budget.
    pub const fn requires_lookup(self) -> bool {
        matches!(
            self,
            Kind::A | Kind::Mx | Kind::Ptr | Kind::Exists | Kind::Include | Kind::Redirect
        )
    }
}

/// One policy rule: qualifier + kind + optional target and prefix length.
///
/// `domain: None` inherits the owning record's domain at evaluation time.
/// `prefix: None` is a host route (full address width at evaluation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub qualifier: Qualifier,
    pub kind: Kind,
    pub domain: Option<String>,
    pub prefix: Option<String>,
}

impl Directive {
    /// Parse one whitespace-delimited term, its qualifier sigil already
    /// stripped by the caller.
    pub fn parse(term: &str, qualifier: Qualifier) -> Result<Directive, SpfError> {
        let invalid = || SpfError::InvalidMechanism(term.to_string());

        let (name, domain, prefix) = split_term(term).ok_or_else(invalid)?;
        let kind = Kind::from_name(name).ok_or_else(invalid)?;

        match kind {
            // Target must be a literal address of the matching family.
            Kind::Ip4 => match domain {
                Some(addr) if addr.parse::<Ipv4Addr>().is_ok() => {}
                _ => return Err(invalid()),
            },
            Kind::Ip6 => match domain {
                Some(addr) if addr.parse::<Ipv6Addr>().is_ok() => {}
                _ => return Err(invalid()),
            },
            // These have no sensible default target.
            Kind::Include | Kind::Exists | Kind::Redirect if domain.is_none() => {
                return Err(invalid())
            }
            Kind::All if domain.is_some() || prefix.is_some() => return Err(invalid()),
            _ => {}
        }

        Ok(Directive {
            qualifier,
            kind,
            domain: domain.map(str::to_string),
            prefix: prefix.map(str::to_string),
        })
    }

    /// Target domain, falling back to the owning record's domain.
    pub fn target<'a>(&'a self, record_domain: &'a str) -> &'a str {
        self.domain.as_deref().unwrap_or(record_domain)
    }
}

/// Split a term at the first separator found among `:` `/` `=`:
/// `name:domain/prefix`, `name:domain`, `name/prefix`, `name=value`, or a
/// bare `name`. Returns None for an empty segment or a slash preceding the
/// colon.
fn split_term(term: &str) -> Option<(&str, Option<&str>, Option<&str>)> {
    let colon = term.find(':');
    let slash = term.find('/');

    let (name, domain, prefix) = match (colon, slash) {
        (Some(c), Some(s)) if c < s => {
            (&term[..c], Some(&term[c + 1..s]), Some(&term[s + 1..]))
        }
        (Some(_), Some(_)) => return None,
        (Some(c), None) => (&term[..c], Some(&term[c + 1..]), None),
        (None, Some(s)) => (&term[..s], None, Some(&term[s + 1..])),
        (None, None) => match term.find('=') {
            Some(e) => (&term[..e], Some(&term[e + 1..]), None),
            None => (term, None, None),
        },
    };

    if name.is_empty() || domain == Some("") || prefix == Some("") {
        return None;
    }
    Some((name, domain, prefix))
}

impl fmt::Display for Directive {
    /// Canonical token form. The default `+` qualifier is omitted except
    /// on `all`, which always carries its sigil; `redirect` renders as
    /// `redirect=domain`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == Kind::All || self.qualifier != Qualifier::Pass {
            write!(f, "{}", self.qualifier)?;
        }
        f.write_str(self.kind.name())?;
        if let Some(domain) = &self.domain {
            if self.kind == Kind::Redirect {
                write!(f, "={domain}")?;
            } else {
                write!(f, ":{domain}")?;
            }
        }
        if let Some(prefix) = &self.prefix {
            write!(f, "/{prefix}")?;
        }
        Ok(())
    }
}
