use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io::BufRead;
use std::num::NonZeroUsize;
use std::sync::{Mutex, OnceLock};

use log::{debug, info, warn};
use lru::LruCache;

use crate::aut_num::AutonomousSystem;
use crate::config::ResolverConfig;
use crate::index::PolicyObjectIndex;
use crate::policy_set::PolicySet;
use crate::route::Route;
use crate::rpsl::object::{AttributeType, ObjectType, RpslObject};
use crate::shared::{ci_key, parse_asn, PolicyError, ASN};
use crate::speaker::{Peer, Speaker};

/// A parsed RPSL document and everything derived from it.
///
/// The input objects are never modified. Autonomous systems and speakers
/// are computed on first access and then reused; resolved sets are kept in
/// a bounded memo.
pub struct PolicyDocument {
    objects: Vec<RpslObject>,
    config: ResolverConfig,
    index: PolicyObjectIndex,
    sets: HashMap<String, PolicySet>,
    aut_nums: OnceLock<BTreeMap<ASN, AutonomousSystem>>,
    speakers: OnceLock<Vec<Speaker>>,
    set_cache: Mutex<LruCache<String, HashSet<Route>>>,
}

impl PolicyDocument {
    pub fn from_objects(objects: Vec<RpslObject>) -> Self {
        Self::from_objects_with_config(objects, ResolverConfig::default())
    }

    pub fn from_objects_with_config(objects: Vec<RpslObject>, config: ResolverConfig) -> Self {
        let index = PolicyObjectIndex::build(&objects, config.effective_reference_date());

        let mut sets: HashMap<String, PolicySet> = HashMap::new();
        for object in &objects {
            if !matches!(object.object_type(), ObjectType::AsSet | ObjectType::RouteSet) {
                continue;
            }
            match PolicySet::new(object) {
                Ok(set) if sets.contains_key(&set.key()) => {
                    warn!("duplicate {}, keeping the first", set);
                }
                Ok(set) => {
                    sets.insert(set.key(), set);
                }
                Err(e) => warn!("skipping {}: {}", object.key(), e),
            }
        }

        let capacity = NonZeroUsize::new(config.set_cache_capacity).unwrap_or(NonZeroUsize::MIN);
        info!("loaded {} objects, {} sets", objects.len(), sets.len());

        PolicyDocument {
            objects,
            config,
            index,
            sets,
            aut_nums: OnceLock::new(),
            speakers: OnceLock::new(),
            set_cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn parse(text: &str) -> Self {
        Self::parse_with_config(text, ResolverConfig::default())
    }

    pub fn parse_with_config(text: &str, config: ResolverConfig) -> Self {
        Self::from_objects_with_config(RpslObject::parse_all(text), config)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, PolicyError> {
        Self::from_reader_with_config(reader, ResolverConfig::default())
    }

    pub fn from_reader_with_config<R: BufRead>(reader: R, config: ResolverConfig) -> Result<Self, PolicyError> {
        Ok(Self::from_objects_with_config(RpslObject::read_objects(reader)?, config))
    }

    pub fn objects(&self) -> &[RpslObject] {
        &self.objects
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn index(&self) -> &PolicyObjectIndex {
        &self.index
    }

    pub fn routes_originated_by(&self, asn: ASN) -> HashSet<Route> {
        self.index.routes_originated_by(asn)
    }

    pub fn routes_maintained_by(&self, maintainer: &str) -> HashSet<Route> {
        self.index.routes_maintained_by(maintainer)
    }

    /// Routes claiming membership of `set`, whether or not the set trusts them.
    pub fn set_member_routes(&self, set: &str) -> HashSet<Route> {
        self.index.set_member_routes(set).iter().cloned().collect()
    }

    pub fn set_member_asns(&self, set: &str) -> BTreeSet<ASN> {
        self.index.set_member_asns(set)
    }

    pub fn asns_maintained_by(&self, maintainer: &str) -> BTreeSet<ASN> {
        self.index.asns_maintained_by(maintainer)
    }

    pub fn policy_set(&self, name: &str) -> Option<&PolicySet> {
        self.sets.get(&ci_key(name))
    }

    pub fn policy_sets(&self) -> impl Iterator<Item = &PolicySet> {
        self.sets.values()
    }

    /// Resolve a set by name. Unknown sets resolve to nothing.
    pub fn resolve_set(&self, name: &str) -> HashSet<Route> {
        let key = ci_key(name);
        if let Ok(mut cache) = self.set_cache.lock() {
            if let Some(routes) = cache.get(&key) {
                return routes.clone();
            }
        }

        let Some(set) = self.sets.get(&key) else {
            debug!("unknown set {}", name);
            return HashSet::new();
        };
        let routes = set.resolve(self);

        if let Ok(mut cache) = self.set_cache.lock() {
            cache.put(key, routes.clone());
        }
        routes
    }

    pub fn aut_nums(&self) -> &BTreeMap<ASN, AutonomousSystem> {
        self.aut_nums.get_or_init(|| self.build_aut_nums())
    }

    pub fn aut_num(&self, asn: ASN) -> Option<&AutonomousSystem> {
        self.aut_nums().get(&asn)
    }

    fn build_aut_nums(&self) -> BTreeMap<ASN, AutonomousSystem> {
        let mut aut_nums = BTreeMap::new();
        for object in self.objects_of_type(ObjectType::AutNum) {
            match AutonomousSystem::new(object, self) {
                Ok(aut_num) if aut_nums.contains_key(&aut_num.asn) => {
                    warn!("duplicate aut-num AS{}, keeping the first", aut_num.asn);
                }
                Ok(aut_num) => {
                    aut_nums.insert(aut_num.asn, aut_num);
                }
                Err(e) => warn!("skipping aut-num {}: {}", object.key(), e),
            }
        }
        aut_nums
    }

    pub fn speakers(&self) -> &[Speaker] {
        self.speakers.get_or_init(|| self.build_speakers())
    }

    fn build_speakers(&self) -> Vec<Speaker> {
        let aut_nums = self.aut_nums();
        let mut speakers: Vec<Speaker> = Vec::new();

        for object in self.objects_of_type(ObjectType::InetRtr) {
            let local_as = match object.require(&AttributeType::LocalAs).and_then(parse_asn) {
                Ok(asn) => asn,
                Err(e) => {
                    warn!("skipping inet-rtr {}: {}", object.key(), e);
                    continue;
                }
            };
            let Some(aut_num) = aut_nums.get(&local_as) else {
                warn!("skipping inet-rtr {}: no aut-num for AS{}", object.key(), local_as);
                continue;
            };

            match Speaker::instances(object, aut_num) {
                Ok(instances) => {
                    for speaker in instances {
                        if speakers.contains(&speaker) {
                            warn!("duplicate speaker {}, keeping the first", speaker);
                        } else {
                            speakers.push(speaker);
                        }
                    }
                }
                Err(e) => warn!("skipping inet-rtr {}: {}", object.key(), e),
            }
        }
        speakers
    }

    pub fn peers(&self) -> HashSet<&Peer> {
        self.speakers().iter().flat_map(|s| s.peers()).collect()
    }

    fn objects_of_type(&self, object_type: ObjectType) -> impl Iterator<Item = &RpslObject> {
        self.objects
            .iter()
            .filter(move |o| o.object_type() == object_type)
    }
}
