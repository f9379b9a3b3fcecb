use chrono::NaiveDate;
use rpslresolver::{PolicyDocument, ResolverConfig, Route};
use std::collections::HashSet;

fn doc(text: &str) -> PolicyDocument {
    let config = ResolverConfig::new().with_reference_date(NaiveDate::from_ymd_opt(2015, 1, 1).unwrap());
    PolicyDocument::parse_with_config(text, config)
}

fn prefixes(routes: &HashSet<Route>) -> HashSet<String> {
    routes.iter().map(|r| r.to_string()).collect()
}

const ROUTE_SET_MEMBERS: &str = "
route: 1.1.1.1/16
origin: AS1
mnt-by: MNTR-ONE
member-of: rs-set

route: 2.2.2.2/8
origin: AS2
mnt-by: MNTR-TWO
member-of: rs-set

route: 3.3.3.0/24
origin: AS3
mnt-by: MNTR-EVIL
member-of: rs-set
";

#[test]
fn test_route_set_mbrs_by_ref_maintainer() {
    let text = format!("{}\nroute-set: rs-set\nmbrs-by-ref: MNTR-ONE\n", ROUTE_SET_MEMBERS);
    let routes = doc(&text).resolve_set("rs-set");

    assert_eq!(routes.len(), 1);
    assert!(prefixes(&routes).contains("1.1.1.1/16"));
}

#[test]
fn test_route_set_mbrs_by_ref_two_maintainers() {
    let text = format!("{}\nroute-set: rs-set\nmbrs-by-ref: MNTR-ONE, mntr-two\n", ROUTE_SET_MEMBERS);
    let routes = doc(&text).resolve_set("rs-set");

    assert_eq!(prefixes(&routes), HashSet::from(["1.1.1.1/16".to_string(), "2.2.2.2/8".to_string()]));
}

#[test]
fn test_route_set_mbrs_by_ref_any() {
    let text = format!("{}\nroute-set: rs-set\nmbrs-by-ref: ANY\n", ROUTE_SET_MEMBERS);
    assert_eq!(doc(&text).resolve_set("rs-set").len(), 3);
}

#[test]
fn test_route_set_without_mbrs_by_ref_ignores_claims() {
    let text = format!("{}\nroute-set: rs-set\n", ROUTE_SET_MEMBERS);
    let d = doc(&text);

    assert!(d.resolve_set("rs-set").is_empty());
    assert_eq!(d.set_member_routes("rs-set").len(), 3);
}

#[test]
fn test_route_set_explicit_members() {
    let d = doc("
route-set: rs-set
members: 1.1.1.1/16
");
    assert_eq!(prefixes(&d.resolve_set("rs-set")), HashSet::from(["1.1.1.1/16".to_string()]));

    let text = format!(
        "{}\nroute-set: rs-set\nmembers: 2.2.2.2/8\nmbrs-by-ref: MNTR-ONE\n",
        ROUTE_SET_MEMBERS
    );
    let routes = doc(&text).resolve_set("rs-set");
    assert_eq!(prefixes(&routes), HashSet::from(["1.1.1.1/16".to_string(), "2.2.2.2/8".to_string()]));
}

const AS_SET_MEMBERS: &str = "
aut-num: AS1
as-name: FIRST
mnt-by: MNTR-ONE
member-of: as-set

aut-num: AS2
as-name: SECOND
mnt-by: MNTR-TWO
member-of: as-set

route: 1.1.1.0/24
origin: AS1

route: 2.2.2.0/24
origin: AS2
";

#[test]
fn test_as_set_mbrs_by_ref_maintainer() {
    let text = format!("{}\nas-set: as-set\nmbrs-by-ref: MNTR-ONE\n", AS_SET_MEMBERS);
    let routes = doc(&text).resolve_set("as-set");

    assert_eq!(prefixes(&routes), HashSet::from(["1.1.1.0/24".to_string()]));
}

#[test]
fn test_as_set_mbrs_by_ref_any() {
    let text = format!("{}\nas-set: as-set\nmbrs-by-ref: ANY\n", AS_SET_MEMBERS);
    assert_eq!(doc(&text).resolve_set("as-set").len(), 2);
}

#[test]
fn test_as_set_without_mbrs_by_ref_is_empty() {
    let text = format!("{}\nas-set: as-set\n", AS_SET_MEMBERS);
    let d = doc(&text);

    assert!(d.resolve_set("as-set").is_empty());
    assert_eq!(d.set_member_asns("as-set").len(), 2);
}

#[test]
fn test_recursive_as_sets() {
    let d = doc("
route: 1.1.1.0/24
origin: AS1

route: 2.2.2.0/24
origin: AS2

as-set: as-outer
members: AS1, as-inner

as-set: as-inner
members: AS2
");
    let routes = d.resolve_set("AS-OUTER");
    assert_eq!(prefixes(&routes), HashSet::from(["1.1.1.0/24".to_string(), "2.2.2.0/24".to_string()]));
}

#[test]
fn test_same_prefix_from_two_origins_is_one_route() {
    let d = doc("
route: 1.1.1.0/24
origin: AS1

route: 1.1.1.0/24
origin: AS2

as-set: as-both
members: AS1, AS2
");
    assert_eq!(d.resolve_set("as-both").len(), 1);
}

#[test]
fn test_cyclic_sets_terminate() {
    let d = doc("
route: 1.1.1.0/24
origin: AS1

route: 2.2.2.0/24
origin: AS2

as-set: as-a
members: AS1, as-b

as-set: as-b
members: AS2, as-a
");
    let a = d.resolve_set("as-a");
    let b = d.resolve_set("as-b");

    assert_eq!(a.len(), 2);
    assert_eq!(a, b);
}

#[test]
fn test_member_operators_apply_to_resolved_routes() {
    let d = doc("
route: 10.0.0.0/8
origin: AS1

route-set: rs-inner
members: 10.0.0.0/8, 192.168.0.0/16^24

route-set: rs-outer
members: rs-inner^+, AS1^-
");
    let routes = prefixes(&d.resolve_set("rs-outer"));

    assert!(routes.contains("10.0.0.0/8^+"));
    assert!(routes.contains("10.0.0.0/8^-"));
    // The lower bound of ^24 survives the outer ^+.
    assert!(routes.contains("192.168.0.0/16^24-32"));
    assert_eq!(routes.len(), 3);
}

#[test]
fn test_as_set_cannot_include_route_set() {
    let d = doc("
route-set: rs-foo
members: 1.0.0.0/8

route: 2.0.0.0/8
origin: AS2

as-set: as-foo
members: rs-foo, AS2
");
    assert_eq!(prefixes(&d.resolve_set("as-foo")), HashSet::from(["2.0.0.0/8".to_string()]));
}

#[test]
fn test_unknown_references_resolve_to_nothing() {
    let d = doc("
as-set: as-foo
members: as-missing, AS99
");
    assert!(d.resolve_set("as-foo").is_empty());
    assert!(d.resolve_set("rs-nowhere").is_empty());
}

#[test]
fn test_hierarchical_set_names() {
    let d = doc("
route-set: AS1:RS-CUSTOMERS
members: 5.5.5.0/24
");
    assert_eq!(d.resolve_set("as1:rs-customers").len(), 1);
    assert!(d.policy_set("AS1:rs-customers").is_some());
}

#[test]
fn test_route_set_trusts_any_listed_maintainer() {
    let d = doc("
route: 1.1.1.0/24
origin: AS1
mnt-by: MNTR-ONE, MNTR-TWO
member-of: rs-set

route: 2.2.2.0/24
origin: AS2
mnt-by: MNTR-EVIL
mnt-by: MNTR-TWO
member-of: rs-set

route-set: rs-set
mbrs-by-ref: MNTR-ONE
");
    assert_eq!(prefixes(&d.resolve_set("rs-set")), HashSet::from(["1.1.1.0/24".to_string()]));
    assert_eq!(d.routes_maintained_by("mntr-two").len(), 2);
}

#[test]
fn test_as_set_trusts_any_listed_maintainer() {
    let d = doc("
aut-num: AS1
as-name: FIRST
mnt-by: MNTR-ONE, MNTR-TWO
member-of: as-set

route: 1.1.1.0/24
origin: AS1

as-set: as-set
mbrs-by-ref: MNTR-TWO
");
    assert_eq!(prefixes(&d.resolve_set("as-set")), HashSet::from(["1.1.1.0/24".to_string()]));
    assert!(d.asns_maintained_by("MNTR-ONE").contains(&1));
}
