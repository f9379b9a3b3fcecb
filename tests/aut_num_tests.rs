use chrono::NaiveDate;
use rpslresolver::{AutonomousSystem, PolicyDocument, PolicyError, ResolverConfig, RpslObject, ANY_ADDRESS};
use std::collections::HashSet;
use std::net::Ipv4Addr;

fn doc(text: &str) -> PolicyDocument {
    let config = ResolverConfig::new().with_reference_date(NaiveDate::from_ymd_opt(2015, 1, 1).unwrap());
    PolicyDocument::parse_with_config(text, config)
}

fn addr(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

const EXPORTS: &str = "
aut-num: AS1
as-name: AARNET-NT-RNO
export: to AS2 1.1.1.1 1.1.1.2 at 8.8.8.8
\tto AS3 1.1.1.3 at 8.8.8.8
\tto AS4 at 8.8.8.8
\tannounce AS-FOO 2.2.2.0/23^+
export: to AS3 1.1.1.3 at 9.9.9.9
+ announce AS-FOO 2.2.2.0/23^+

as-set: AS-FOO
members: AS5

route: 2.2.1.0/24
origin: AS5
";

#[test]
fn test_export_tables() {
    let d = doc(EXPORTS);
    let aut_num = d.aut_num(1).unwrap();

    assert_eq!(aut_num.export_table().len(), 4);
    assert_eq!(aut_num.export_table_for(2, addr("1.1.1.1")).len(), 2);
    assert_eq!(aut_num.export_table_for(2, addr("1.1.1.2")).len(), 2);
    assert!(aut_num.export_table_for(2, ANY_ADDRESS).is_empty());
    assert_eq!(aut_num.export_table_for(4, ANY_ADDRESS).len(), 2);

    let to_as3 = aut_num.export_table_for(3, addr("1.1.1.3"));
    assert_eq!(to_as3.len(), 4);
    let hops: HashSet<Ipv4Addr> = to_as3.iter().filter_map(|r| r.next_hop).collect();
    assert_eq!(hops, HashSet::from([addr("8.8.8.8"), addr("9.9.9.9")]));

    for route in aut_num.export_table_for(2, addr("1.1.1.1")) {
        assert_eq!(route.next_hop, Some(addr("8.8.8.8")));
    }
}

#[test]
fn test_table_for_as_and_peer() {
    let d = doc(EXPORTS);
    let aut_num = d.aut_num(1).unwrap();

    let whole_as = aut_num.table_for_as(4);
    assert_eq!(whole_as.name, "AS4(ANY)-in-AARNET-NT-RNO");
    assert_eq!(whole_as.routes.len(), 2);

    let peer = aut_num.table_for_peer(2, addr("1.1.1.1"));
    assert_eq!(peer.name, "AS2(1.1.1.1)-in-AARNET-NT-RNO");
    assert_eq!(peer.routes.len(), 2);

    assert!(aut_num.table_for_as(2).routes.is_empty());
}

#[test]
fn test_peer_as_for_address() {
    let d = doc(EXPORTS);
    let aut_num = d.aut_num(1).unwrap();

    assert_eq!(aut_num.peer_as_for_address(addr("1.1.1.3")), Some(3));
    assert_eq!(aut_num.peer_as_for_address(addr("7.7.7.7")), None);
}

#[test]
fn test_display() {
    let d = doc(EXPORTS);
    assert_eq!(d.aut_num(1).unwrap().to_string(), "AARNET-NT-RNO (AS1)");
}

#[test]
fn test_filter_expressions_announce_nothing() {
    let d = doc("
aut-num: AS1
as-name: FILTERED
export: to AS2 at 1.1.1.1 announce AS-FOO AND NOT 1.1.2.0/24

as-set: AS-FOO
members: AS5

route: 1.1.1.0/24
origin: AS5
");
    let aut_num = d.aut_num(1).unwrap();
    assert!(aut_num.export_table_for(2, ANY_ADDRESS).is_empty());
}

#[test]
fn test_announce_forms() {
    let d = doc("
aut-num: AS1
as-name: FORMS
export: to AS2 at 1.1.1.1 announce ANY
export: to AS3 at 1.1.1.1 announce {10.0.0.0/8, 11.0.0.0/8}^16
export: to AS4 at 1.1.1.1 announce AS1^+
export: to AS5 at 1.1.1.1 announce rs-foo

route-set: rs-foo
members: 12.0.0.0/8

route: 1.1.0.0/16
origin: AS1
");
    let aut_num = d.aut_num(1).unwrap();

    assert!(aut_num.export_table_for(2, ANY_ADDRESS).is_empty());

    let braced: HashSet<String> = aut_num
        .export_table_for(3, ANY_ADDRESS)
        .iter()
        .map(|r| r.to_string())
        .collect();
    assert_eq!(braced, HashSet::from(["10.0.0.0/8^16".to_string(), "11.0.0.0/8^16".to_string()]));

    let by_origin: Vec<String> = aut_num
        .export_table_for(4, ANY_ADDRESS)
        .iter()
        .map(|r| r.to_string())
        .collect();
    assert_eq!(by_origin, vec!["1.1.0.0/16^+".to_string()]);

    assert_eq!(aut_num.export_table_for(5, ANY_ADDRESS).len(), 1);
}

#[test]
fn test_actions_are_attached_per_peering() {
    let d = doc("
aut-num: AS1
as-name: ACTIONS
export: to AS2 2.2.2.1 at 1.1.1.1 action pref = 10; med = 5;
\tto AS2 at 1.1.1.1 action pref = 20;
\tannounce 10.0.0.0/8
export: to AS2 2.2.2.1 at 1.1.1.1 action pref = 99; announce 10.0.0.0/8
");
    let aut_num = d.aut_num(1).unwrap();

    let addressed = aut_num.export_table_for(2, addr("2.2.2.1"));
    let route = addressed.iter().next().unwrap();
    assert_eq!(route.actions.get("pref").map(String::as_str), Some("10"));
    assert_eq!(route.actions.get("med").map(String::as_str), Some("5"));

    let whole_as = aut_num.export_table_for(2, ANY_ADDRESS);
    let route = whole_as.iter().next().unwrap();
    assert_eq!(route.actions.get("pref").map(String::as_str), Some("20"));
    assert_eq!(route.actions.len(), 1);
}

#[test]
fn test_missing_as_name_falls_back_to_number() {
    let d = doc("
aut-num: AS7
export: to AS2 at 1.1.1.1 announce 10.0.0.0/8
");
    let aut_num = d.aut_num(7).unwrap();
    assert_eq!(aut_num.name, "AS7");
    assert_eq!(aut_num.table_for_as(2).name, "AS2(ANY)-in-AS7");
}

#[test]
fn test_requires_aut_num_object() {
    let d = doc("");
    let object = RpslObject::parse("route: 1.1.1.0/24\norigin: AS1\n").unwrap();

    let err = AutonomousSystem::new(&object, &d).unwrap_err();
    assert!(matches!(err, PolicyError::WrongObjectType { .. }));
}

#[test]
fn test_peer_as_follows_declaration_order() {
    let d = doc("
aut-num: AS1
as-name: SHARED-ADDRESS
export: to AS9 5.5.5.5 at 1.1.1.1 announce 10.0.0.0/8
export: to AS2 5.5.5.5 at 1.1.1.1 announce 11.0.0.0/8
");
    let aut_num = d.aut_num(1).unwrap();
    assert_eq!(aut_num.peer_as_for_address(addr("5.5.5.5")), Some(9));
}
