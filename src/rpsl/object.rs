use std::fmt;
use std::io::BufRead;

use log::{error, warn};

use crate::shared::PolicyError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectType {
    AutNum,
    Route,
    RouteSet,
    AsSet,
    InetRtr,
    Other(String),
}

impl ObjectType {
    pub fn from_key(key: &str) -> Self {
        match key {
            "aut-num" => ObjectType::AutNum,
            "route" => ObjectType::Route,
            "route-set" => ObjectType::RouteSet,
            "as-set" => ObjectType::AsSet,
            "inet-rtr" => ObjectType::InetRtr,
            other => ObjectType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectType::AutNum => "aut-num",
            ObjectType::Route => "route",
            ObjectType::RouteSet => "route-set",
            ObjectType::AsSet => "as-set",
            ObjectType::InetRtr => "inet-rtr",
            ObjectType::Other(key) => key.as_str(),
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeType {
    AutNum,
    AsName,
    Export,
    Import,
    Default,
    MntBy,
    MemberOf,
    Members,
    MbrsByRef,
    Route,
    Origin,
    RouteSet,
    AsSet,
    InetRtr,
    LocalAs,
    Ifaddr,
    Peer,
    Withdrawn,
    Other(String),
}

impl AttributeType {
    pub fn from_key(key: &str) -> Self {
        match key {
            "aut-num" => AttributeType::AutNum,
            "as-name" => AttributeType::AsName,
            "export" => AttributeType::Export,
            "import" => AttributeType::Import,
            "default" => AttributeType::Default,
            "mnt-by" => AttributeType::MntBy,
            "member-of" => AttributeType::MemberOf,
            "members" => AttributeType::Members,
            "mbrs-by-ref" => AttributeType::MbrsByRef,
            "route" => AttributeType::Route,
            "origin" => AttributeType::Origin,
            "route-set" => AttributeType::RouteSet,
            "as-set" => AttributeType::AsSet,
            "inet-rtr" => AttributeType::InetRtr,
            "local-as" => AttributeType::LocalAs,
            "ifaddr" => AttributeType::Ifaddr,
            "peer" => AttributeType::Peer,
            "withdrawn" => AttributeType::Withdrawn,
            other => AttributeType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttributeType::AutNum => "aut-num",
            AttributeType::AsName => "as-name",
            AttributeType::Export => "export",
            AttributeType::Import => "import",
            AttributeType::Default => "default",
            AttributeType::MntBy => "mnt-by",
            AttributeType::MemberOf => "member-of",
            AttributeType::Members => "members",
            AttributeType::MbrsByRef => "mbrs-by-ref",
            AttributeType::Route => "route",
            AttributeType::Origin => "origin",
            AttributeType::RouteSet => "route-set",
            AttributeType::AsSet => "as-set",
            AttributeType::InetRtr => "inet-rtr",
            AttributeType::LocalAs => "local-as",
            AttributeType::Ifaddr => "ifaddr",
            AttributeType::Peer => "peer",
            AttributeType::Withdrawn => "withdrawn",
            AttributeType::Other(key) => key.as_str(),
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpslAttribute {
    pub attribute_type: AttributeType,
    /// Value with comments removed and continuation lines joined by spaces.
    pub value: String,
}

impl RpslAttribute {
    pub fn new(attribute_type: AttributeType, value: &str) -> Self {
        RpslAttribute {
            attribute_type,
            value: value.trim().to_string(),
        }
    }

    /// Comma separated list items of the value.
    pub fn list_values(&self) -> Vec<String> {
        self.value
            .split(',')
            .map(|item| item.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|item| !item.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpslObject {
    attributes: Vec<RpslAttribute>,
}

impl RpslObject {
    pub fn new(attributes: Vec<RpslAttribute>) -> Result<Self, PolicyError> {
        if attributes.is_empty() {
            return Err(PolicyError::MissingAttribute {
                object: "<empty>".to_string(),
                attribute: "type".to_string(),
            });
        }
        Ok(RpslObject { attributes })
    }

    /// Parse a single object from its `key: value` text form.
    pub fn parse(text: &str) -> Result<Self, PolicyError> {
        let mut attributes: Vec<(String, String)> = Vec::new();

        for line in text.lines() {
            if line.starts_with('%') || line.starts_with('#') {
                continue;
            }
            let content = strip_comment(line);

            let continuation = line.starts_with(' ') || line.starts_with('\t') || line.starts_with('+');
            if continuation {
                let Some((_, value)) = attributes.last_mut() else {
                    return Err(PolicyError::MissingAttribute {
                        object: line.trim().to_string(),
                        attribute: "type".to_string(),
                    });
                };
                let content = content.strip_prefix('+').unwrap_or(content);
                value.push(' ');
                value.push_str(content.trim());
                continue;
            }

            if content.trim().is_empty() {
                continue;
            }

            match content.split_once(':') {
                Some((key, value)) if !key.trim().is_empty() && !key.contains(char::is_whitespace) => {
                    attributes.push((key.trim().to_ascii_lowercase(), value.trim().to_string()));
                }
                _ => {
                    return Err(PolicyError::MissingAttribute {
                        object: content.trim().to_string(),
                        attribute: "key".to_string(),
                    })
                }
            }
        }

        RpslObject::new(
            attributes
                .into_iter()
                .map(|(key, value)| RpslAttribute::new(AttributeType::from_key(&key), &value))
                .collect(),
        )
    }

    /// Parse every object of a document, skipping objects that fail to parse.
    pub fn parse_all(text: &str) -> Vec<RpslObject> {
        split_objects(text.lines().map(str::to_string))
    }

    /// Read objects from a stream of RPSL text.
    pub fn read_objects<R: BufRead>(reader: R) -> Result<Vec<RpslObject>, PolicyError> {
        let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;
        Ok(split_objects(lines.into_iter()))
    }

    pub fn object_type(&self) -> ObjectType {
        ObjectType::from_key(&self.attributes[0].attribute_type.to_string())
    }

    /// Value of the first (type) attribute, e.g. `AS1` for `aut-num: AS1`.
    pub fn key(&self) -> &str {
        &self.attributes[0].value
    }

    pub fn attributes(&self) -> &[RpslAttribute] {
        &self.attributes
    }

    pub fn has_attribute(&self, attribute_type: &AttributeType) -> bool {
        self.attributes.iter().any(|a| &a.attribute_type == attribute_type)
    }

    pub fn find_attributes<'a>(
        &'a self,
        attribute_type: &AttributeType,
    ) -> impl Iterator<Item = &'a RpslAttribute> + 'a {
        let attribute_type = attribute_type.clone();
        self.attributes
            .iter()
            .filter(move |a| a.attribute_type == attribute_type)
    }

    pub fn value_for(&self, attribute_type: &AttributeType) -> Option<&str> {
        self.find_attributes(attribute_type)
            .next()
            .map(|a| a.value.as_str())
    }

    pub fn values_for(&self, attribute_type: &AttributeType) -> Vec<String> {
        self.find_attributes(attribute_type)
            .flat_map(|a| a.list_values())
            .collect()
    }

    /// Like [`value_for`](Self::value_for), but a missing attribute is an error.
    pub fn require(&self, attribute_type: &AttributeType) -> Result<&str, PolicyError> {
        self.value_for(attribute_type)
            .ok_or_else(|| PolicyError::MissingAttribute {
                object: format!("{}: {}", self.object_type(), self.key()),
                attribute: attribute_type.to_string(),
            })
    }
}

impl fmt::Display for RpslObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for attr in &self.attributes {
            writeln!(f, "{}: {}", attr.attribute_type, attr.value)?;
        }
        Ok(())
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn split_objects<I: Iterator<Item = String>>(lines: I) -> Vec<RpslObject> {
    let mut objects = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for line in lines {
        if line.trim().is_empty() {
            flush_object(&mut current, &mut objects);
        } else if !(current.is_empty() && (line.starts_with('%') || line.starts_with('#'))) {
            current.push(line);
        }
    }
    flush_object(&mut current, &mut objects);

    objects
}

fn flush_object(current: &mut Vec<String>, objects: &mut Vec<RpslObject>) {
    if current.is_empty() {
        return;
    }
    match RpslObject::parse(&current.join("\n")) {
        Ok(object) => objects.push(object),
        Err(e) => {
            warn!("Unable to parse following object, skipping... ({})", e);
            for line in current.iter().take(3) {
                error!("{}", line);
            }
            if current.len() > 3 {
                error!("...");
            }
        }
    }
    current.clear();
}
