use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;
use log::{debug, warn};

use crate::config::parse_rpsl_date;
use crate::route::Route;
use crate::rpsl::object::{AttributeType, ObjectType, RpslObject};
use crate::shared::{ci_key, parse_asn, PolicyError, ASN};

/// Lookup tables built in one pass over the input objects.
///
/// Withdrawn routes never enter any table. Set and maintainer names are
/// stored lowercased.
#[derive(Debug, Default)]
pub struct PolicyObjectIndex {
    routes_by_origin: HashMap<ASN, HashSet<Route>>,
    // Claims are kept per object so each one can be checked against its own
    // maintainer; route equality would merge claims from different objects.
    routes_by_set: HashMap<String, Vec<Route>>,
    routes_by_maintainer: HashMap<String, HashSet<Route>>,
    asns_by_set: HashMap<String, BTreeSet<ASN>>,
    asns_by_maintainer: HashMap<String, BTreeSet<ASN>>,
}

impl PolicyObjectIndex {
    pub fn build(objects: &[RpslObject], reference_date: NaiveDate) -> Self {
        let mut index = PolicyObjectIndex::default();

        for object in objects {
            match object.object_type() {
                ObjectType::Route => match route_from_object(object, reference_date) {
                    Ok(route) if route.withdrawn => {
                        debug!("route {} is withdrawn, not indexing", route);
                    }
                    Ok(route) => index.add_route(route),
                    Err(e) => warn!("skipping route object {}: {}", object.key(), e),
                },
                ObjectType::AutNum => match parse_asn(object.key()) {
                    Ok(asn) => index.add_aut_num(asn, object),
                    Err(e) => warn!("skipping aut-num object {}: {}", object.key(), e),
                },
                _ => {}
            }
        }

        index
    }

    fn add_route(&mut self, route: Route) {
        for set in &route.member_of {
            self.routes_by_set
                .entry(set.clone())
                .or_default()
                .push(route.clone());
        }
        for maintainer in &route.maintainers {
            self.routes_by_maintainer
                .entry(maintainer.clone())
                .or_default()
                .insert(route.clone());
        }
        if let Some(origin) = route.origin_as {
            self.routes_by_origin.entry(origin).or_default().insert(route);
        }
    }

    fn add_aut_num(&mut self, asn: ASN, object: &RpslObject) {
        for maintainer in object.values_for(&AttributeType::MntBy) {
            self.asns_by_maintainer
                .entry(ci_key(&maintainer))
                .or_default()
                .insert(asn);
        }
        for set in object.values_for(&AttributeType::MemberOf) {
            self.asns_by_set.entry(ci_key(&set)).or_default().insert(asn);
        }
    }

    pub fn routes_originated_by(&self, asn: ASN) -> HashSet<Route> {
        self.routes_by_origin.get(&asn).cloned().unwrap_or_default()
    }

    pub fn routes_maintained_by(&self, maintainer: &str) -> HashSet<Route> {
        self.routes_by_maintainer
            .get(&ci_key(maintainer))
            .cloned()
            .unwrap_or_default()
    }

    /// Every route object claiming membership of `set`, one entry per object.
    pub fn set_member_routes(&self, set: &str) -> &[Route] {
        self.routes_by_set
            .get(&ci_key(set))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn set_member_asns(&self, set: &str) -> BTreeSet<ASN> {
        self.asns_by_set.get(&ci_key(set)).cloned().unwrap_or_default()
    }

    pub fn asns_maintained_by(&self, maintainer: &str) -> BTreeSet<ASN> {
        self.asns_by_maintainer
            .get(&ci_key(maintainer))
            .cloned()
            .unwrap_or_default()
    }
}

/// Build the [`Route`] described by a `route` object.
pub fn route_from_object(object: &RpslObject, reference_date: NaiveDate) -> Result<Route, PolicyError> {
    if object.object_type() != ObjectType::Route {
        return Err(PolicyError::WrongObjectType {
            expected: ObjectType::Route.to_string(),
            found: object.object_type().to_string(),
        });
    }

    let mut route = Route::parse(object.key(), None)?;
    route.origin_as = Some(parse_asn(object.require(&AttributeType::Origin)?)?);
    route.member_of = object
        .values_for(&AttributeType::MemberOf)
        .iter()
        .map(|set| ci_key(set))
        .collect();
    route.maintainers = object
        .values_for(&AttributeType::MntBy)
        .iter()
        .map(|mnt| ci_key(mnt))
        .collect();
    route.withdrawn = is_withdrawn(object, reference_date);

    Ok(route)
}

fn is_withdrawn(object: &RpslObject, reference_date: NaiveDate) -> bool {
    for attr in object.find_attributes(&AttributeType::Withdrawn) {
        match parse_rpsl_date(&attr.value) {
            Ok(date) => return date <= reference_date,
            Err(e) => warn!("route object \"{}\" has {}", object.key(), e),
        }
    }
    false
}
