use std::collections::{BTreeSet, HashSet};
use std::fmt;

use log::{debug, warn};

use crate::document::PolicyDocument;
use crate::route::{split_operator, Route, SurfaceOp};
use crate::rpsl::object::{AttributeType, ObjectType, RpslObject};
use crate::shared::{ci_key, parse_asn, Keywords, PolicyError, SetKind, ASN};

/// One entry of a set's `members:` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberRef {
    AsNumber { asn: ASN, op: Option<SurfaceOp> },
    SetReference { name: String, op: Option<SurfaceOp> },
    LiteralPrefix(Route),
}

impl MemberRef {
    pub fn parse(item: &str, kind: SetKind) -> Result<MemberRef, PolicyError> {
        let item = item.trim();
        let (base, op) = split_operator(item)?;

        if let Some(referenced) = SetKind::of_name(base) {
            if is_any_set(base) {
                return Err(PolicyError::InvalidMember(item.to_string()));
            }
            if kind == SetKind::AsSet && referenced == SetKind::RouteSet {
                return Err(PolicyError::InvalidMember(item.to_string()));
            }
            return Ok(MemberRef::SetReference { name: ci_key(base), op });
        }

        if let Ok(asn) = parse_asn(base) {
            return Ok(MemberRef::AsNumber { asn, op });
        }

        match kind {
            SetKind::RouteSet => Ok(MemberRef::LiteralPrefix(Route::parse(item, None)?)),
            SetKind::AsSet => Err(PolicyError::InvalidMember(item.to_string())),
        }
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = |op: &Option<SurfaceOp>| op.map(|op| op.to_string()).unwrap_or_default();
        match self {
            MemberRef::AsNumber { asn, op } => write!(f, "AS{}{}", asn, suffix(op)),
            MemberRef::SetReference { name, op } => write!(f, "{}{}", name, suffix(op)),
            MemberRef::LiteralPrefix(route) => write!(f, "{}", route),
        }
    }
}

fn is_any_set(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name == "as-any" || name == "rs-any"
}

/// An `as-set` or `route-set` and its membership rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySet {
    pub name: String,
    pub kind: SetKind,
    pub members: Vec<MemberRef>,
    /// Maintainer names, lowercased. May contain `any`.
    pub mbrs_by_ref: BTreeSet<String>,
}

impl PolicySet {
    pub fn new(object: &RpslObject) -> Result<Self, PolicyError> {
        let kind = match object.object_type() {
            ObjectType::AsSet => SetKind::AsSet,
            ObjectType::RouteSet => SetKind::RouteSet,
            other => {
                return Err(PolicyError::WrongObjectType {
                    expected: "as-set or route-set".to_string(),
                    found: other.to_string(),
                })
            }
        };
        let name = object.key().to_string();

        let mut members = Vec::new();
        for item in object.values_for(&AttributeType::Members) {
            match MemberRef::parse(&item, kind) {
                Ok(member) => members.push(member),
                Err(e) => warn!("{} {}: skipping member \"{}\": {}", kind, name, item, e),
            }
        }

        let mbrs_by_ref = object
            .values_for(&AttributeType::MbrsByRef)
            .iter()
            .map(|mnt| ci_key(mnt))
            .collect();

        Ok(PolicySet {
            name,
            kind,
            members,
            mbrs_by_ref,
        })
    }

    /// Lowercased name used for lookups and cycle detection.
    pub fn key(&self) -> String {
        ci_key(&self.name)
    }

    pub fn accepts_any(&self) -> bool {
        self.mbrs_by_ref.contains(Keywords::ANY)
    }

    /// Flatten this set into the routes it stands for.
    pub fn resolve(&self, doc: &PolicyDocument) -> HashSet<Route> {
        let mut visited = HashSet::new();
        self.resolve_with(doc, &mut visited)
    }

    /// Depth-first resolution sharing `visited` with the caller, so that
    /// cyclic membership graphs terminate. A set already in `visited`
    /// contributes nothing.
    pub fn resolve_with(&self, doc: &PolicyDocument, visited: &mut HashSet<String>) -> HashSet<Route> {
        let mut routes = HashSet::new();
        if !visited.insert(self.key()) {
            debug!("{} {} already visited", self.kind, self.name);
            return routes;
        }

        routes.extend(self.by_ref_members(doc));

        for member in &self.members {
            match member {
                MemberRef::AsNumber { asn, op } => {
                    routes.extend(apply_suffix(doc.routes_originated_by(*asn), *op));
                }
                MemberRef::SetReference { name, op } => {
                    let Some(referenced) = doc.policy_set(name) else {
                        debug!("{} {}: unknown set {}", self.kind, self.name, name);
                        continue;
                    };
                    if self.kind == SetKind::AsSet && referenced.kind == SetKind::RouteSet {
                        warn!("{} {}: cannot include route-set {}", self.kind, self.name, name);
                        continue;
                    }
                    routes.extend(apply_suffix(referenced.resolve_with(doc, visited), *op));
                }
                MemberRef::LiteralPrefix(route) => {
                    routes.insert(route.clone());
                }
            }
        }

        routes
    }

    fn by_ref_members(&self, doc: &PolicyDocument) -> HashSet<Route> {
        if self.mbrs_by_ref.is_empty() {
            return HashSet::new();
        }
        let index = doc.index();

        match self.kind {
            SetKind::RouteSet => index
                .set_member_routes(&self.name)
                .iter()
                .filter(|route| self.trusts(&route.maintainers))
                .cloned()
                .collect(),
            SetKind::AsSet => {
                let trusted: BTreeSet<ASN> = if self.accepts_any() {
                    index.set_member_asns(&self.name)
                } else {
                    let maintained: BTreeSet<ASN> = self
                        .mbrs_by_ref
                        .iter()
                        .flat_map(|mnt| index.asns_maintained_by(mnt))
                        .collect();
                    index
                        .set_member_asns(&self.name)
                        .intersection(&maintained)
                        .copied()
                        .collect()
                };
                trusted
                    .into_iter()
                    .flat_map(|asn| doc.routes_originated_by(asn))
                    .collect()
            }
        }
    }

    fn trusts(&self, maintainers: &BTreeSet<String>) -> bool {
        self.accepts_any() || !self.mbrs_by_ref.is_disjoint(maintainers)
    }
}

impl fmt::Display for PolicySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.name)
    }
}

/// Compose `op` onto every route, dropping those the composition rejects.
pub fn apply_suffix(routes: HashSet<Route>, op: Option<SurfaceOp>) -> HashSet<Route> {
    let Some(op) = op else {
        return routes;
    };
    routes
        .into_iter()
        .filter_map(|route| match route.apply_operator(op) {
            Ok(route) => Some(route),
            Err(e) => {
                debug!("dropping {}: {}", route, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_members() {
        assert_eq!(
            MemberRef::parse("AS5", SetKind::AsSet).unwrap(),
            MemberRef::AsNumber { asn: 5, op: None }
        );
        assert_eq!(
            MemberRef::parse("as-bar^+", SetKind::AsSet).unwrap(),
            MemberRef::SetReference {
                name: "as-bar".to_string(),
                op: Some(SurfaceOp::MoreSpecificInclusive)
            }
        );
        assert_eq!(
            MemberRef::parse("AS1:RS-Customers^24", SetKind::RouteSet).unwrap(),
            MemberRef::SetReference {
                name: "as1:rs-customers".to_string(),
                op: Some(SurfaceOp::Exact(24))
            }
        );
        match MemberRef::parse("1.1.1.0/24^+", SetKind::RouteSet).unwrap() {
            MemberRef::LiteralPrefix(route) => assert_eq!(route.to_string(), "1.1.1.0/24^+"),
            other => panic!("expected literal, got {:?}", other),
        }
    }

    #[test]
    fn test_rejected_members() {
        assert!(MemberRef::parse("1.1.1.0/24", SetKind::AsSet).is_err());
        assert!(MemberRef::parse("rs-foo", SetKind::AsSet).is_err());
        assert!(MemberRef::parse("RS-ANY", SetKind::RouteSet).is_err());
        assert!(MemberRef::parse("AS-ANY", SetKind::AsSet).is_err());
        assert!(MemberRef::parse("as-foo^33", SetKind::AsSet).is_err());
    }

    #[test]
    fn test_new_from_object() {
        let object = RpslObject::parse(
            "route-set: RS-Foo\nmembers: 1.1.1.0/24, rs-bar^-,\n  AS3\nmbrs-by-ref: MNTR-ONE, MNTR-TWO",
        )
        .unwrap();
        let set = PolicySet::new(&object).unwrap();

        assert_eq!(set.key(), "rs-foo");
        assert_eq!(set.kind, SetKind::RouteSet);
        assert_eq!(set.members.len(), 3);
        assert_eq!(
            set.mbrs_by_ref,
            BTreeSet::from(["mntr-one".to_string(), "mntr-two".to_string()])
        );
        assert!(!set.accepts_any());
    }

    #[test]
    fn test_new_rejects_other_objects() {
        let object = RpslObject::parse("route: 1.0.0.0/8\norigin: AS1").unwrap();
        assert!(matches!(
            PolicySet::new(&object),
            Err(PolicyError::WrongObjectType { .. })
        ));
    }

    #[test]
    fn test_apply_suffix_drops_invalid() {
        let routes = HashSet::from([
            Route::parse("10.0.0.0/8", None).unwrap(),
            Route::parse("10.1.0.0/30", None).unwrap(),
        ]);
        let result = apply_suffix(routes, Some(SurfaceOp::Range(16, 24)));
        assert_eq!(result.len(), 1);
        assert!(result.contains(&Route::parse("10.0.0.0/8^16-24", None).unwrap()));
    }
}
