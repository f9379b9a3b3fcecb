use std::collections::HashMap;

use serde_json::{json, Value};

use crate::document::PolicyDocument;
use crate::emitters::OutputEmitter;
use crate::route::Route;
use crate::shared::{format_peer_address, PolicyError};
use crate::speaker::{Peer, Speaker};

/// Speakers, their peers and each peer's routes as a JSON document.
#[derive(Debug)]
pub struct JsonEmitter {
    pretty: bool,
}

impl JsonEmitter {
    pub fn new() -> Self {
        JsonEmitter { pretty: true }
    }

    pub fn to_json(&self, doc: &PolicyDocument) -> Value {
        let mut speakers: Vec<&Speaker> = doc.speakers().iter().collect();
        speakers.sort_by_key(|s| s.key());

        json!({
            "speakers": speakers.into_iter().map(speaker_json).collect::<Vec<_>>(),
        })
    }
}

impl Default for JsonEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputEmitter for JsonEmitter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn set_arguments(&mut self, arguments: &HashMap<String, String>) -> Result<(), PolicyError> {
        for (key, value) in arguments {
            match key.as_str() {
                "pretty" => {
                    self.pretty = value.parse().map_err(|_| PolicyError::InvalidEmitterArgument {
                        emitter: self.name().to_string(),
                        argument: format!("{}={}", key, value),
                    })?;
                }
                other => log::warn!("json emitter ignores argument {}", other),
            }
        }
        Ok(())
    }

    fn emit(&self, doc: &PolicyDocument) -> Result<String, PolicyError> {
        let value = self.to_json(doc);
        let rendered = if self.pretty {
            serde_json::to_string_pretty(&value)?
        } else {
            serde_json::to_string(&value)?
        };
        Ok(rendered)
    }
}

fn speaker_json(speaker: &Speaker) -> Value {
    let mut peers: Vec<&Peer> = speaker.peers().iter().collect();
    peers.sort_by_key(|p| (p.peer_as, p.peer_addr));

    json!({
        "name": speaker.to_string(),
        "router": speaker.name,
        "asn": speaker.owning_as,
        "address": speaker.address.to_string(),
        "peers": peers.into_iter().map(peer_json).collect::<Vec<_>>(),
    })
}

fn peer_json(peer: &Peer) -> Value {
    let mut routes: Vec<&Route> = peer.routes().iter().collect();
    routes.sort();

    json!({
        "name": peer.name,
        "asn": peer.peer_as,
        "address": format_peer_address(&peer.peer_addr),
        "tables": peer.table_names().collect::<Vec<_>>(),
        "routes": routes.into_iter().map(route_json).collect::<Vec<_>>(),
    })
}

fn route_json(route: &Route) -> Value {
    let range = route.range.render(route.prefix_length());
    json!({
        "prefix": format!("{}/{}", route.network(), route.prefix_length()),
        "range": if range.is_empty() { Value::Null } else { Value::String(range) },
        "next_hop": route.next_hop.map(|hop| hop.to_string()),
        "actions": route.actions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::config::ResolverConfig;

    const DOCUMENT: &str = "aut-num: AS1\n\
        as-name: FIRST-AS\n\
        export: to AS3 2.2.2.1 at 1.1.1.1 action pref = 10; announce AS1 1.2.0.0/16^+\n\
        \n\
        route: 1.1.1.0/24\n\
        origin: AS1\n\
        \n\
        inet-rtr: router1.example.net\n\
        local-as: AS1\n\
        ifaddr: 1.1.1.1 masklen 24\n\
        peer: BGP4 2.2.2.1\n";

    fn doc() -> PolicyDocument {
        let config = ResolverConfig::new().with_reference_date(NaiveDate::from_ymd_opt(2015, 1, 1).unwrap());
        PolicyDocument::parse_with_config(DOCUMENT, config)
    }

    #[test]
    fn test_json_layout() {
        let value = JsonEmitter::new().to_json(&doc());
        let speaker = &value["speakers"][0];
        assert_eq!(speaker["name"], "FIRST-AS(1.1.1.1)");
        assert_eq!(speaker["router"], "router1.example.net");

        let peer = &speaker["peers"][0];
        assert_eq!(peer["asn"], 3);
        assert_eq!(peer["address"], "2.2.2.1");
        assert_eq!(peer["tables"], json!(["AS3(2.2.2.1)-in-FIRST-AS", "AS3(ANY)-in-FIRST-AS"]));

        let routes = peer["routes"].as_array().unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0]["prefix"], "1.1.1.0/24");
        assert_eq!(routes[0]["range"], Value::Null);
        assert_eq!(routes[0]["next_hop"], "1.1.1.1");
        assert_eq!(routes[0]["actions"]["pref"], "10");
        assert_eq!(routes[1]["prefix"], "1.2.0.0/16");
        assert_eq!(routes[1]["range"], "^+");
    }

    #[test]
    fn test_compact_output() {
        let mut emitter = JsonEmitter::new();
        emitter
            .set_arguments(&HashMap::from([("pretty".to_string(), "false".to_string())]))
            .unwrap();
        let output = emitter.emit(&doc()).unwrap();
        assert!(!output.contains('\n'));

        assert!(emitter
            .set_arguments(&HashMap::from([("pretty".to_string(), "maybe".to_string())]))
            .is_err());
    }
}
