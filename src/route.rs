use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnetwork::Ipv4Network;

use crate::shared::{PolicyError, ASN};

pub type Prefix = Ipv4Network;

const MAX_LENGTH: u8 = 32;

/// Canonical range of more-specifics attached to a prefix.
///
/// Values are always produced by [`RangeOp::normalize`], so two routes
/// describing the same range compare equal regardless of how the range was
/// written (`^+` vs `^16-32` on a /16, `^17` vs `^17-17`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RangeOp {
    Exact,
    Single(u8),
    Range(u8, u8),
}

impl RangeOp {
    pub fn normalize(prefix_length: u8, n: u8, m: u8) -> RangeOp {
        if n == m {
            if n == prefix_length {
                RangeOp::Exact
            } else {
                RangeOp::Single(n)
            }
        } else {
            RangeOp::Range(n, m)
        }
    }

    /// Effective `(n, m)` bounds for a prefix of the given length.
    pub fn bounds(&self, prefix_length: u8) -> (u8, u8) {
        match *self {
            RangeOp::Exact => (prefix_length, prefix_length),
            RangeOp::Single(n) => (n, n),
            RangeOp::Range(n, m) => (n, m),
        }
    }

    pub fn render(&self, prefix_length: u8) -> String {
        match *self {
            RangeOp::Exact => String::new(),
            RangeOp::Single(n) => format!("^{}", n),
            RangeOp::Range(n, MAX_LENGTH) if n == prefix_length => "^+".to_string(),
            RangeOp::Range(n, MAX_LENGTH) if n == prefix_length + 1 => "^-".to_string(),
            RangeOp::Range(n, m) => format!("^{}-{}", n, m),
        }
    }
}

/// Range operator as written after a prefix or set reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceOp {
    MoreSpecificInclusive,
    MoreSpecificExclusive,
    Exact(u8),
    Range(u8, u8),
}

impl FromStr for SurfaceOp {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PolicyError::InvalidOperator(s.to_string());
        let body = s.trim().strip_prefix('^').ok_or_else(invalid)?;

        match body {
            "+" => Ok(SurfaceOp::MoreSpecificInclusive),
            "-" => Ok(SurfaceOp::MoreSpecificExclusive),
            _ => {
                let parse_len = |v: &str| -> Result<u8, PolicyError> {
                    let len = v.parse::<u8>().map_err(|_| invalid())?;
                    if len > MAX_LENGTH {
                        return Err(invalid());
                    }
                    Ok(len)
                };
                match body.split_once('-') {
                    Some((n, m)) => {
                        let (n, m) = (parse_len(n)?, parse_len(m)?);
                        if n > m {
                            return Err(invalid());
                        }
                        Ok(SurfaceOp::Range(n, m))
                    }
                    None => Ok(SurfaceOp::Exact(parse_len(body)?)),
                }
            }
        }
    }
}

impl fmt::Display for SurfaceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceOp::MoreSpecificInclusive => write!(f, "^+"),
            SurfaceOp::MoreSpecificExclusive => write!(f, "^-"),
            SurfaceOp::Exact(n) => write!(f, "^{}", n),
            SurfaceOp::Range(n, m) => write!(f, "^{}-{}", n, m),
        }
    }
}

/// Split a member or announce item into its base and trailing range operator.
/// For a braced prefix-set literal only an operator after the closing brace
/// counts.
pub fn split_operator(item: &str) -> Result<(&str, Option<SurfaceOp>), PolicyError> {
    let search_from = if item.starts_with('{') {
        match item.rfind('}') {
            Some(close) => close + 1,
            None => return Ok((item, None)),
        }
    } else {
        0
    };

    match item[search_from..].find('^') {
        Some(idx) => {
            let idx = search_from + idx;
            Ok((&item[..idx], Some(item[idx..].parse::<SurfaceOp>()?)))
        }
        None => Ok((item, None)),
    }
}

#[derive(Debug, Clone)]
pub struct Route {
    pub prefix: Prefix,
    pub range: RangeOp,
    pub next_hop: Option<Ipv4Addr>,
    pub actions: BTreeMap<String, String>,
    pub origin_as: Option<ASN>,
    pub member_of: BTreeSet<String>,
    /// Lowercased `mnt-by` maintainers of the route object.
    pub maintainers: BTreeSet<String>,
    pub withdrawn: bool,
}

impl Route {
    pub fn new(prefix: Prefix, next_hop: Option<Ipv4Addr>) -> Self {
        Route {
            prefix,
            range: RangeOp::Exact,
            next_hop,
            actions: BTreeMap::new(),
            origin_as: None,
            member_of: BTreeSet::new(),
            maintainers: BTreeSet::new(),
            withdrawn: false,
        }
    }

    /// Parse `a.b.c.d/len` with an optional range operator suffix.
    pub fn parse(text: &str, next_hop: Option<Ipv4Addr>) -> Result<Self, PolicyError> {
        let text = text.trim();
        let (base, op) = split_operator(text)?;
        if !base.contains('/') {
            return Err(PolicyError::InvalidPrefix(text.to_string()));
        }
        let prefix = base
            .parse::<Ipv4Network>()
            .map_err(|_| PolicyError::InvalidPrefix(text.to_string()))?;

        let route = Route::new(prefix, next_hop);
        match op {
            None => Ok(route),
            Some(op) => {
                // A literal range may not reach above its own mask length.
                if op.min_length(prefix.prefix()) < prefix.prefix() {
                    return Err(PolicyError::InvalidPrefix(text.to_string()));
                }
                route.apply_operator(op)
            }
        }
    }

    /// Masked network address of the prefix.
    pub fn network(&self) -> Ipv4Addr {
        self.prefix.network()
    }

    pub fn prefix_length(&self) -> u8 {
        self.prefix.prefix()
    }

    pub fn bounds(&self) -> (u8, u8) {
        self.range.bounds(self.prefix_length())
    }

    /// Compose a range operator onto this route.
    ///
    /// The lower bound only ever moves towards longer prefixes; the upper
    /// bound is dictated by the outer operator. A composition whose lower
    /// bound ends up above its upper bound yields `InvalidRange` and the
    /// route must be dropped by the caller.
    pub fn apply_operator(&self, op: SurfaceOp) -> Result<Route, PolicyError> {
        let prefix_length = self.prefix_length();
        let (cur_n, _) = self.bounds();

        let (new_n, new_m) = match op {
            SurfaceOp::MoreSpecificInclusive => (cur_n, MAX_LENGTH),
            SurfaceOp::MoreSpecificExclusive => (cur_n + 1, MAX_LENGTH),
            SurfaceOp::Exact(n) => (cur_n.max(n), n),
            SurfaceOp::Range(n, m) => (cur_n.max(n), m),
        };

        if new_n > new_m || new_n > MAX_LENGTH {
            return Err(PolicyError::InvalidRange {
                prefix: self.to_string(),
                operator: op.to_string(),
            });
        }

        let mut route = self.clone();
        route.range = RangeOp::normalize(prefix_length, new_n, new_m);
        Ok(route)
    }

    pub fn with_next_hop(mut self, next_hop: Ipv4Addr) -> Self {
        self.next_hop = Some(next_hop);
        self
    }

    pub fn with_actions(mut self, actions: BTreeMap<String, String>) -> Self {
        self.actions = actions;
        self
    }

    fn identity(&self) -> (Ipv4Addr, u8, RangeOp, Option<Ipv4Addr>) {
        (self.network(), self.prefix_length(), self.range, self.next_hop)
    }
}

impl SurfaceOp {
    fn min_length(&self, prefix_length: u8) -> u8 {
        match *self {
            SurfaceOp::MoreSpecificInclusive => prefix_length,
            SurfaceOp::MoreSpecificExclusive => prefix_length + 1,
            SurfaceOp::Exact(n) | SurfaceOp::Range(n, _) => n,
        }
    }
}

impl PartialEq for Route {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Route {}

impl Hash for Route {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl PartialOrd for Route {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Route {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.range.render(self.prefix_length()))
    }
}
