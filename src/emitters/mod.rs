pub mod json;
pub mod xml;

use std::collections::{BTreeMap, HashMap};

use lazy_static::lazy_static;

use crate::document::PolicyDocument;
use crate::shared::PolicyError;

pub use json::JsonEmitter;
pub use xml::XmlEmitter;

/// Renders the resolved peers of a document.
pub trait OutputEmitter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Apply `key=value` arguments given on the command line.
    fn set_arguments(&mut self, arguments: &HashMap<String, String>) -> Result<(), PolicyError> {
        for key in arguments.keys() {
            log::warn!("{} emitter ignores argument {}", self.name(), key);
        }
        Ok(())
    }

    fn emit(&self, doc: &PolicyDocument) -> Result<String, PolicyError>;
}

/// Emits nothing. Useful for checking a document for diagnostics only.
#[derive(Debug, Default)]
pub struct NullEmitter;

impl OutputEmitter for NullEmitter {
    fn name(&self) -> &'static str {
        "null"
    }

    fn emit(&self, _doc: &PolicyDocument) -> Result<String, PolicyError> {
        Ok(String::new())
    }
}

type EmitterFactory = fn() -> Box<dyn OutputEmitter>;

lazy_static! {
    static ref EMITTERS: BTreeMap<&'static str, EmitterFactory> = {
        let mut emitters: BTreeMap<&'static str, EmitterFactory> = BTreeMap::new();
        emitters.insert("null", || Box::new(NullEmitter));
        emitters.insert("json", || Box::new(JsonEmitter::new()));
        emitters.insert("xml", || Box::new(XmlEmitter::new()));
        emitters
    };
}

pub fn create_emitter(name: &str) -> Result<Box<dyn OutputEmitter>, PolicyError> {
    EMITTERS
        .get(name.to_ascii_lowercase().as_str())
        .map(|factory| factory())
        .ok_or_else(|| PolicyError::UnknownEmitter(name.to_string()))
}

pub fn emitter_names() -> Vec<&'static str> {
    EMITTERS.keys().copied().collect()
}

/// Split `key=value` command line arguments. Entries without `=` map to an
/// empty value.
pub fn parse_arguments<S: AsRef<str>>(raw: &[S]) -> HashMap<String, String> {
    raw.iter()
        .map(|arg| match arg.as_ref().split_once('=') {
            Some((key, value)) => (key.trim().to_string(), value.trim().to_string()),
            None => (arg.as_ref().trim().to_string(), String::new()),
        })
        .collect()
}
