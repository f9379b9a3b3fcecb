use std::fmt;
use std::net::Ipv4Addr;

pub type ASN = u32;

/// Peer address meaning "every peer in the AS", used when a peering
/// specification names an AS without listing router addresses.
pub const ANY_ADDRESS: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

/// Key of an export table entry: (peer AS, peer address).
pub type PeerKey = (ASN, Ipv4Addr);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keywords;

impl Keywords {
    pub const ANY: &'static str = "any";
    pub const FILTER_OPERATORS: [&'static str; 3] = ["and", "or", "not"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetKind {
    AsSet,
    RouteSet,
}

impl SetKind {
    /// Classify a set name. Hierarchical names (`AS1:RS-CUSTOMERS`) count
    /// when any component carries the set prefix.
    pub fn of_name(name: &str) -> Option<SetKind> {
        let mut kind = None;
        for component in name.split(':') {
            let lower = component.to_ascii_lowercase();
            if lower.starts_with("rs-") {
                return Some(SetKind::RouteSet);
            }
            if lower.starts_with("as-") {
                kind = Some(SetKind::AsSet);
            }
        }
        kind
    }
}

impl fmt::Display for SetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SetKind::AsSet => "as-set",
            SetKind::RouteSet => "route-set",
        };
        write!(f, "{}", s)
    }
}

/// Parse an `AS<n>` token, case-insensitively.
pub fn parse_asn(token: &str) -> Result<ASN, PolicyError> {
    let token = token.trim();
    let digits = token
        .get(..2)
        .filter(|p| p.eq_ignore_ascii_case("as"))
        .map(|_| &token[2..])
        .ok_or_else(|| PolicyError::InvalidAsn(token.to_string()))?;

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PolicyError::InvalidAsn(token.to_string()));
    }
    digits
        .parse::<ASN>()
        .map_err(|_| PolicyError::InvalidAsn(token.to_string()))
}

pub fn parse_address(token: &str) -> Result<Ipv4Addr, PolicyError> {
    token
        .trim()
        .parse::<Ipv4Addr>()
        .map_err(|_| PolicyError::InvalidAddress(token.to_string()))
}

/// Set names and maintainer names compare case-insensitively.
pub fn ci_key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

pub fn format_peer_address(addr: &Ipv4Addr) -> String {
    if *addr == ANY_ADDRESS {
        "ANY".to_string()
    } else {
        addr.to_string()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PolicyError {
    #[error("invalid range: {operator} cannot be applied to {prefix}")]
    InvalidRange { prefix: String, operator: String },

    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),

    #[error("invalid range operator: {0}")]
    InvalidOperator(String),

    #[error("invalid as number: {0}")]
    InvalidAsn(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("invalid set member: {0}")]
    InvalidMember(String),

    #[error("requires {expected} object, got {found}")]
    WrongObjectType { expected: String, found: String },

    #[error("{object} is missing mandatory attribute {attribute}")]
    MissingAttribute { object: String, attribute: String },

    #[error("unknown emitter: {0}")]
    UnknownEmitter(String),

    #[error("{emitter} emitter: invalid argument {argument}")]
    InvalidEmitterArgument { emitter: String, argument: String },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("xml: {0}")]
    Xml(#[from] quick_xml::Error),
}
