use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::net::Ipv4Addr;

use log::{debug, warn};

use crate::document::PolicyDocument;
use crate::policy_set::apply_suffix;
use crate::route::{split_operator, Route};
use crate::rpsl::lexer::{tokenize_attribute, Token};
use crate::rpsl::object::{AttributeType, ObjectType, RpslObject};
use crate::shared::{
    format_peer_address, parse_address, parse_asn, Keywords, PeerKey, PolicyError, SetKind,
    ANY_ADDRESS, ASN,
};

/// A `to <AS> [<addr>] at <local-router>` peering, flattened to one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeeringSpec {
    pub peer_as: ASN,
    pub peer_addr: Ipv4Addr,
    pub local_router: Ipv4Addr,
}

impl PeeringSpec {
    pub fn new(peer_as: ASN, peer_addr: Ipv4Addr, local_router: Ipv4Addr) -> Self {
        PeeringSpec {
            peer_as,
            peer_addr,
            local_router,
        }
    }

    pub fn key(&self) -> PeerKey {
        (self.peer_as, self.peer_addr)
    }
}

impl fmt::Display for PeeringSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AS{} {} at {}",
            self.peer_as,
            format_peer_address(&self.peer_addr),
            self.local_router
        )
    }
}

/// Routes exported to one peer (or to a whole peer AS), as seen from one
/// autonomous system.
#[derive(Debug, Clone)]
pub struct RouteTable {
    pub peer_as: ASN,
    pub peer_addr: Ipv4Addr,
    pub name: String,
    pub routes: HashSet<Route>,
}

impl RouteTable {
    pub fn new(peer_as: ASN, peer_addr: Ipv4Addr, as_name: &str, routes: HashSet<Route>) -> Self {
        RouteTable {
            peer_as,
            peer_addr,
            name: format!("AS{}({})-in-{}", peer_as, format_peer_address(&peer_addr), as_name),
            routes,
        }
    }
}

impl fmt::Display for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone)]
pub struct AutonomousSystem {
    pub asn: ASN,
    pub name: String,
    export_table: BTreeMap<PeerKey, HashSet<Route>>,
    // Keys of `export_table` in the order their peerings were declared.
    peer_order: Vec<PeerKey>,
}

impl AutonomousSystem {
    /// Build an autonomous system from its `aut-num` object, resolving every
    /// `export:` attribute against `doc`.
    pub fn new(object: &RpslObject, doc: &PolicyDocument) -> Result<Self, PolicyError> {
        if object.object_type() != ObjectType::AutNum {
            return Err(PolicyError::WrongObjectType {
                expected: ObjectType::AutNum.to_string(),
                found: object.object_type().to_string(),
            });
        }
        let asn = parse_asn(object.key())?;
        let name = match object.value_for(&AttributeType::AsName) {
            Some(name) => name.to_string(),
            None => {
                warn!("aut-num AS{} has no as-name", asn);
                format!("AS{}", asn)
            }
        };

        let mut export_table: BTreeMap<PeerKey, HashSet<Route>> = BTreeMap::new();
        let mut peer_order: Vec<PeerKey> = Vec::new();
        for attr in object.find_attributes(&AttributeType::Export) {
            let tokens = tokenize_attribute(attr);
            let peers = export_peers(&tokens);
            if peers.is_empty() {
                debug!("AS{}: export without peerings: {}", asn, attr.value);
                continue;
            }

            let mut announced: HashMap<Ipv4Addr, HashSet<Route>> = HashMap::new();
            for peer in &peers {
                let routes = announced
                    .entry(peer.local_router)
                    .or_insert_with(|| resolve_announce(&tokens, peer.local_router, doc));
                let actions = resolve_actions(&tokens, peer);

                if !export_table.contains_key(&peer.key()) {
                    peer_order.push(peer.key());
                }
                let table = export_table.entry(peer.key()).or_default();
                for route in routes.iter() {
                    // An existing entry keeps the actions it was first exported with.
                    if !table.contains(route) {
                        table.insert(route.clone().with_actions(actions.clone()));
                    }
                }
            }
        }

        Ok(AutonomousSystem {
            asn,
            name,
            export_table,
            peer_order,
        })
    }

    pub fn export_table(&self) -> &BTreeMap<PeerKey, HashSet<Route>> {
        &self.export_table
    }

    pub fn export_table_for(&self, peer_as: ASN, peer_addr: Ipv4Addr) -> HashSet<Route> {
        self.export_table
            .get(&(peer_as, peer_addr))
            .cloned()
            .unwrap_or_default()
    }

    /// Routes exported to one addressed peer.
    pub fn table_for_peer(&self, peer_as: ASN, peer_addr: Ipv4Addr) -> RouteTable {
        RouteTable::new(
            peer_as,
            peer_addr,
            &self.name,
            self.export_table_for(peer_as, peer_addr),
        )
    }

    /// Routes exported to every peer of `peer_as`.
    pub fn table_for_as(&self, peer_as: ASN) -> RouteTable {
        self.table_for_peer(peer_as, ANY_ADDRESS)
    }

    /// AS of the first declared peering this system exports to at `addr`.
    pub fn peer_as_for_address(&self, addr: Ipv4Addr) -> Option<ASN> {
        self.peer_order
            .iter()
            .find(|(_, peer_addr)| *peer_addr == addr)
            .map(|(peer_as, _)| *peer_as)
    }
}

impl fmt::Display for AutonomousSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (AS{})", self.name, self.asn)
    }
}

/// Extract the peerings of an export attribute, in declaration order and
/// without duplicates.
///
/// Each `to` entry must be directly followed by an `at` entry carrying
/// exactly one local router. A `to` without addresses yields a single
/// peering with [`ANY_ADDRESS`].
pub fn export_peers(tokens: &[Token]) -> Vec<PeeringSpec> {
    let mut peers: Vec<PeeringSpec> = Vec::new();
    let mut push = |peer: PeeringSpec| {
        if !peers.contains(&peer) {
            peers.push(peer);
        }
    };

    for (i, token) in tokens.iter().enumerate() {
        if !token.is("to") {
            continue;
        }
        let at = match tokens.get(i + 1) {
            Some(at) if at.is("at") && at.values.len() == 1 => at,
            _ => {
                warn!("Malformed peering specification: to {}", token.values.join(" "));
                continue;
            }
        };
        let Some(first) = token.values.first() else {
            continue;
        };
        let peer_as = match parse_asn(first) {
            Ok(peer_as) => peer_as,
            Err(e) => {
                warn!("Malformed peering specification: {}", e);
                continue;
            }
        };
        let local_router = match parse_address(&at.values[0]) {
            Ok(addr) => addr,
            Err(e) => {
                warn!("Malformed peering specification: {}", e);
                continue;
            }
        };

        if token.values.len() < 2 {
            push(PeeringSpec::new(peer_as, ANY_ADDRESS, local_router));
            continue;
        }
        for value in &token.values[1..] {
            match parse_address(value) {
                Ok(peer_addr) => push(PeeringSpec::new(peer_as, peer_addr, local_router)),
                Err(e) => warn!("Malformed peering specification: {}", e),
            }
        }
    }

    peers
}

/// Action statements attached to the first `to`/`at` pair matching `peer`.
///
/// A peering for [`ANY_ADDRESS`] only matches a `to` entry that lists no
/// addresses. Actions are `key = value` triples.
pub fn resolve_actions(tokens: &[Token], peer: &PeeringSpec) -> BTreeMap<String, String> {
    let mut actions = BTreeMap::new();
    let any_peer = peer.peer_addr == ANY_ADDRESS;

    for (i, token) in tokens.iter().enumerate() {
        if !token.is("to") {
            continue;
        }
        let Some(at) = tokens.get(i + 1).filter(|t| t.is("at")) else {
            continue;
        };
        if at.values.len() != 1 || parse_address(&at.values[0]).ok() != Some(peer.local_router) {
            continue;
        }
        if token.values.first().and_then(|v| parse_asn(v).ok()) != Some(peer.peer_as) {
            continue;
        }

        let addresses = &token.values[1..];
        let matches = if any_peer {
            addresses.is_empty()
        } else {
            addresses
                .iter()
                .any(|a| parse_address(a).ok() == Some(peer.peer_addr))
        };
        if !matches {
            continue;
        }

        let Some(action) = tokens.get(i + 2).filter(|t| t.is("action")) else {
            continue;
        };
        for triple in action.values.chunks_exact(3) {
            actions.insert(triple[0].clone(), triple[2].clone());
        }
        break;
    }

    actions
}

/// Resolve the `announce` entries of an export attribute into routes with
/// `local_router` as next hop.
///
/// Filter expressions are not evaluated: an announce list containing a
/// combinator yields nothing at all.
pub fn resolve_announce(tokens: &[Token], local_router: Ipv4Addr, doc: &PolicyDocument) -> HashSet<Route> {
    let items: Vec<&String> = tokens
        .iter()
        .filter(|t| t.is("announce"))
        .flat_map(|t| t.values.iter())
        .collect();

    if let Some(operator) = items
        .iter()
        .find(|item| Keywords::FILTER_OPERATORS.contains(&item.to_ascii_lowercase().as_str()))
    {
        warn!("filter expressions are not supported ({}), announcing nothing", operator);
        return HashSet::new();
    }

    let mut routes = HashSet::new();
    for item in items {
        match resolve_announce_item(item, doc) {
            Ok(resolved) => routes.extend(resolved.into_iter().map(|r| r.with_next_hop(local_router))),
            Err(e) => warn!("skipping announce item \"{}\": {}", item, e),
        }
    }
    routes
}

fn resolve_announce_item(item: &str, doc: &PolicyDocument) -> Result<HashSet<Route>, PolicyError> {
    let (base, op) = split_operator(item)?;

    if base.eq_ignore_ascii_case(Keywords::ANY) {
        debug!("announce ANY contributes no routes");
        return Ok(HashSet::new());
    }

    if let Some(inner) = base.strip_prefix('{').and_then(|b| b.strip_suffix('}')) {
        let mut routes = HashSet::new();
        for literal in inner.split(',').map(str::trim).filter(|l| !l.is_empty()) {
            routes.insert(Route::parse(literal, None)?);
        }
        return Ok(apply_suffix(routes, op));
    }

    if SetKind::of_name(base).is_some() {
        return Ok(apply_suffix(doc.resolve_set(base), op));
    }

    if let Ok(asn) = parse_asn(base) {
        return Ok(apply_suffix(doc.routes_originated_by(asn), op));
    }

    Ok(HashSet::from([Route::parse(item, None)?]))
}
