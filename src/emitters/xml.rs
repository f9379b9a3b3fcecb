use std::collections::HashMap;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::document::PolicyDocument;
use crate::emitters::OutputEmitter;
use crate::rpsl::lexer::tokenize_attribute;
use crate::rpsl::object::{RpslAttribute, RpslObject};
use crate::shared::PolicyError;

const ROOT: &str = "rpsl";

/// Every input object as an XML element.
///
/// An object becomes `<type value="key">` with one child per remaining
/// attribute. Attributes with a tokenizer grammar are expanded into
/// `<keyword>values</keyword>` children; the others are written as one
/// element per list value.
#[derive(Debug)]
pub struct XmlEmitter {
    pretty: bool,
}

impl XmlEmitter {
    pub fn new() -> Self {
        XmlEmitter { pretty: true }
    }

    pub fn to_xml(&self, doc: &PolicyDocument) -> Result<String, PolicyError> {
        let mut writer = if self.pretty {
            Writer::new_with_indent(Vec::new(), b' ', 2)
        } else {
            Writer::new(Vec::new())
        };

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new(ROOT)))?;
        for object in doc.objects() {
            write_object(&mut writer, object)?;
        }
        writer.write_event(Event::End(BytesEnd::new(ROOT)))?;

        Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
    }
}

impl Default for XmlEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputEmitter for XmlEmitter {
    fn name(&self) -> &'static str {
        "xml"
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
                other => log::warn!("xml emitter ignores argument {}", other),
            }
        }
        Ok(())
    }

    fn emit(&self, doc: &PolicyDocument) -> Result<String, PolicyError> {
        self.to_xml(doc)
    }
}

fn write_object(writer: &mut Writer<Vec<u8>>, object: &RpslObject) -> Result<(), PolicyError> {
    let object_type = object.object_type().to_string();
    let mut start = BytesStart::new(object_type.as_str());
    start.push_attribute(("value", object.key()));
    writer.write_event(Event::Start(start))?;

    // The first attribute is the type and is carried by the element itself.
    for attr in object.attributes().iter().skip(1) {
        write_attribute(writer, attr)?;
    }

    writer.write_event(Event::End(BytesEnd::new(object_type.as_str())))?;
    Ok(())
}

fn write_attribute(writer: &mut Writer<Vec<u8>>, attr: &RpslAttribute) -> Result<(), PolicyError> {
    let name = attr.attribute_type.to_string();
    let tokens = tokenize_attribute(attr);

    if tokens.is_empty() {
        for value in attr.list_values() {
            write_text_element(writer, &name, &value)?;
        }
        return Ok(());
    }

    writer.write_event(Event::Start(BytesStart::new(name.as_str())))?;
    for token in &tokens {
        write_text_element(writer, &token.key, &token.values.join(" "))?;
    }
    writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
    Ok(())
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<(), PolicyError> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
