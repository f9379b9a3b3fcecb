use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::Ipv4Addr;

use log::{debug, warn};

use crate::aut_num::{AutonomousSystem, RouteTable};
use crate::route::Route;
use crate::rpsl::lexer::tokenize_attribute;
use crate::rpsl::object::{AttributeType, ObjectType, RpslAttribute, RpslObject};
use crate::shared::{format_peer_address, parse_address, parse_asn, PolicyError, ASN};

/// (owning AS, listening address) of a speaker.
pub type SpeakerKey = (ASN, Ipv4Addr);

/// One BGP session of a speaker.
#[derive(Debug, Clone)]
pub struct Peer {
    pub peer_as: ASN,
    pub peer_addr: Ipv4Addr,
    pub speaker: SpeakerKey,
    pub name: String,
    tables: BTreeSet<String>,
    routes: HashSet<Route>,
}

impl Peer {
    pub fn new(peer_as: ASN, peer_addr: Ipv4Addr, speaker: SpeakerKey, speaker_name: &str) -> Self {
        Peer {
            peer_as,
            peer_addr,
            speaker,
            name: format!("AS{}({})-peer-of-{}", peer_as, peer_addr, speaker_name),
            tables: BTreeSet::new(),
            routes: HashSet::new(),
        }
    }

    /// Merge a route table into this peer. Returns false if a table of the
    /// same name was already added. Routes already present keep their actions.
    pub fn add_route_table(&mut self, table: RouteTable) -> bool {
        if !self.tables.insert(table.name) {
            return false;
        }
        self.routes.extend(table.routes);
        true
    }

    pub fn routes(&self) -> &HashSet<Route> {
        &self.routes
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(String::as_str)
    }

    fn identity(&self) -> (SpeakerKey, Ipv4Addr, ASN) {
        (self.speaker, self.peer_addr, self.peer_as)
    }
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Peer {}

impl Hash for Peer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A router interface declared by an `inet-rtr` object.
#[derive(Debug, Clone)]
pub struct Speaker {
    /// DNS name of the `inet-rtr`.
    pub name: String,
    pub owning_as: ASN,
    pub as_name: String,
    pub address: Ipv4Addr,
    peers: Vec<Peer>,
}

impl Speaker {
    /// One speaker per distinct `ifaddr` of an `inet-rtr` object.
    pub fn instances(object: &RpslObject, aut_num: &AutonomousSystem) -> Result<Vec<Speaker>, PolicyError> {
        check_inet_rtr(object)?;

        let mut seen = HashSet::new();
        let mut speakers = Vec::new();
        for attr in object.find_attributes(&AttributeType::Ifaddr) {
            let Some(address) = interface_address(attr) else {
                warn!("inet-rtr {}: unusable ifaddr \"{}\"", object.key(), attr.value);
                continue;
            };
            if seen.insert(address) {
                speakers.push(Speaker::new(object, address, aut_num)?);
            }
        }
        Ok(speakers)
    }

    pub fn new(object: &RpslObject, address: Ipv4Addr, aut_num: &AutonomousSystem) -> Result<Self, PolicyError> {
        check_inet_rtr(object)?;

        let mut speaker = Speaker {
            name: object.key().to_string(),
            owning_as: aut_num.asn,
            as_name: aut_num.name.clone(),
            address,
            peers: Vec::new(),
        };
        for attr in object.find_attributes(&AttributeType::Peer) {
            speaker.add_peer(attr, aut_num);
        }
        Ok(speaker)
    }

    fn add_peer(&mut self, attr: &RpslAttribute, aut_num: &AutonomousSystem) {
        let tokens = tokenize_attribute(attr);

        let Some(peer_addr) = tokens
            .iter()
            .find(|t| t.is("peer") && t.values.len() > 1)
            .and_then(|t| parse_address(&t.values[1]).ok())
        else {
            warn!("{}: peer without usable address: {}", self, attr.value);
            return;
        };

        let explicit = tokens
            .iter()
            .find(|t| t.is("asno") && !t.values.is_empty())
            .and_then(|t| match parse_asn(&t.values[0]) {
                Ok(asn) => Some(asn),
                Err(e) => {
                    warn!("{}: ignoring asno of peer {}: {}", self, peer_addr, e);
                    None
                }
            });
        let peer_as = match explicit.or_else(|| aut_num.peer_as_for_address(peer_addr)) {
            Some(asn) if asn > 0 => asn,
            _ => {
                warn!("{}: dropping peer {} with unknown AS", self, peer_addr);
                return;
            }
        };

        // The addressed table goes first so its actions win on shared routes.
        let mut peer = Peer::new(peer_as, peer_addr, self.key(), &self.to_string());
        peer.add_route_table(aut_num.table_for_peer(peer_as, peer_addr));
        peer.add_route_table(aut_num.table_for_as(peer_as));

        if self.peers.contains(&peer) {
            debug!("{}: duplicate peer {}", self, peer);
            return;
        }
        self.peers.push(peer);
    }

    pub fn key(&self) -> SpeakerKey {
        (self.owning_as, self.address)
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }
}

impl PartialEq for Speaker {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Speaker {}

impl Hash for Speaker {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.as_name, format_peer_address(&self.address))
    }
}

fn check_inet_rtr(object: &RpslObject) -> Result<(), PolicyError> {
    if object.object_type() != ObjectType::InetRtr {
        return Err(PolicyError::WrongObjectType {
            expected: ObjectType::InetRtr.to_string(),
            found: object.object_type().to_string(),
        });
    }
    Ok(())
}

fn interface_address(attr: &RpslAttribute) -> Option<Ipv4Addr> {
    tokenize_attribute(attr)
        .into_iter()
        .find(|t| t.is("ifaddr"))
        .and_then(|t| t.values.first().and_then(|v| parse_address(v).ok()))
}
