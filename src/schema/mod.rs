//! XSD subset used to validate interfile headers and decode them into a
//! nested record.
//!
//! Supported: global and local elements (including `ref`), named and
//! anonymous complex and simple types, `sequence`/`all`/`choice` groups,
//! `minOccurs`/`maxOccurs`, attributes, simple/complex content extension,
//! enumerations and `xs:any`/`xs:anyType`. Element order inside a group is
//! not checked.

pub mod decode;
pub mod error;
pub mod types;
pub mod xml;

pub use error::SchemaError;
pub use types::*;

use log::{debug, warn};
use std::collections::HashMap;
use std::path::Path;

use crate::model::Node;
use xml::{local_name, prefix, XmlElement};

const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Turns raw header bytes into a nested record, rejecting invalid documents
pub trait RecordDecoder: Send + Sync {
    fn decode(&self, document: &[u8]) -> Result<Node, SchemaError>;
}

/// A loaded XSD schema
#[derive(Debug, Clone, Default)]
pub struct XmlSchema {
    target_namespace: Option<String>,
    elements: HashMap<String, ElementDecl>,
    complex_types: HashMap<String, ComplexType>,
    simple_types: HashMap<String, SimpleType>,
}

impl XmlSchema {
    /// Load a schema from an `.xsd` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded schema {} ({} bytes)", path.display(), bytes.len());
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(xsd: &[u8]) -> Result<Self, SchemaError> {
        let root = xml::parse_document(xsd)?;
        SchemaLoader::new(&root)?.load(&root)
    }

    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    pub fn element(&self, name: &str) -> Option<&ElementDecl> {
        self.elements.get(name)
    }

    pub fn complex_type(&self, name: &str) -> Option<&ComplexType> {
        self.complex_types.get(name)
    }

    pub fn simple_type(&self, name: &str) -> Option<&SimpleType> {
        self.simple_types.get(name)
    }

    /// Validate a document without keeping the decoded record
    pub fn validate(&self, document: &[u8]) -> Result<(), SchemaError> {
        self.to_record(document).map(|_| ())
    }

    pub fn is_valid(&self, document: &[u8]) -> bool {
        self.validate(document).is_ok()
    }

    /// Validate a document and decode it into a nested record
    pub fn to_record(&self, document: &[u8]) -> Result<Node, SchemaError> {
        let root = xml::parse_document(document)?;
        decode::Decoder::new(self).decode_root(&root)
    }
}

impl RecordDecoder for XmlSchema {
    fn decode(&self, document: &[u8]) -> Result<Node, SchemaError> {
        self.to_record(document)
    }
}

/// Reads `xs:` declarations into an [`XmlSchema`]
struct SchemaLoader {
    /// Prefixes bound to the XSD namespace on the schema element
    xsd_prefixes: Vec<String>,
    /// True when the XSD namespace is the default namespace
    xsd_default: bool,
}

impl SchemaLoader {
    fn new(root: &XmlElement) -> Result<Self, SchemaError> {
        if root.local_name() != "schema" {
            return Err(SchemaError::InvalidSchema(format!(
                "root element is '{}', expected 'schema'",
                root.name
            )));
        }

        let mut xsd_prefixes = Vec::new();
        let mut xsd_default = false;
        for (name, value) in &root.attributes {
            if value != XSD_NAMESPACE {
                continue;
            }
            match name.strip_prefix("xmlns:") {
                Some(p) => xsd_prefixes.push(p.to_string()),
                None if name == "xmlns" => xsd_default = true,
                None => {}
            }
        }

        Ok(Self {
            xsd_prefixes,
            xsd_default,
        })
    }

    fn load(&self, root: &XmlElement) -> Result<XmlSchema, SchemaError> {
        let mut schema = XmlSchema {
            target_namespace: root.attribute("targetNamespace").map(str::to_string),
            ..Default::default()
        };

        for child in &root.children {
            match child.local_name() {
                "element" => {
                    let decl = self.element(child)?;
                    schema.elements.insert(decl.name.clone(), decl);
                }
                "complexType" => {
                    let name = required_attr(child, "name")?;
                    schema
                        .complex_types
                        .insert(name.to_string(), self.complex_type(child)?);
                }
                "simpleType" => {
                    let name = required_attr(child, "name")?;
                    schema
                        .simple_types
                        .insert(name.to_string(), self.simple_type(child)?);
                }
                "import" | "include" | "redefine" => {
                    warn!(
                        "Ignoring schema {} of '{}'",
                        child.local_name(),
                        child.attribute("schemaLocation").unwrap_or("?")
                    );
                }
                _ => {}
            }
        }

        debug!(
            "Schema has {} global elements, {} complex types, {} simple types",
            schema.elements.len(),
            schema.complex_types.len(),
            schema.simple_types.len()
        );
        Ok(schema)
    }

    fn type_ref(&self, qualified: &str) -> TypeRef {
        let in_xsd = match prefix(qualified) {
            Some(p) => self.xsd_prefixes.iter().any(|x| x == p),
            None => self.xsd_default,
        };
        let local = local_name(qualified);
        if in_xsd {
            if let Some(builtin) = BuiltinType::from_local_name(local) {
                return TypeRef::Builtin(builtin);
            }
        }
        TypeRef::Named(local.to_string())
    }

    fn element(&self, el: &XmlElement) -> Result<ElementDecl, SchemaError> {
        let (min_occurs, max_occurs) = occurs(el)?;

        if let Some(reference) = el.attribute("ref") {
            let name = local_name(reference).to_string();
            return Ok(ElementDecl {
                name: name.clone(),
                kind: ElementKind::Ref(name),
                min_occurs,
                max_occurs,
            });
        }

        let name = required_attr(el, "name")?.to_string();
        let kind = if let Some(type_name) = el.attribute("type") {
            ElementKind::Type(self.type_ref(type_name))
        } else if let Some(complex) = el.child_named("complexType") {
            ElementKind::Complex(self.complex_type(complex)?)
        } else if let Some(simple) = el.child_named("simpleType") {
            ElementKind::Simple(self.simple_type(simple)?)
        } else {
            ElementKind::Type(TypeRef::Builtin(BuiltinType::Any))
        };

        Ok(ElementDecl {
            name,
            kind,
            min_occurs,
            max_occurs,
        })
    }

    fn complex_type(&self, el: &XmlElement) -> Result<ComplexType, SchemaError> {
        let mut complex = ComplexType::empty();
        self.complex_body(el, &mut complex)?;
        Ok(complex)
    }

    /// Shared by `complexType` and the `extension` element of complex content
    fn complex_body(&self, el: &XmlElement, complex: &mut ComplexType) -> Result<(), SchemaError> {
        for child in &el.children {
            match child.local_name() {
                "sequence" | "all" | "choice" => {
                    let mut particles = Vec::new();
                    let open = self.group(child, 1, MaxOccurs::Bounded(1), &mut particles)?;
                    complex.content = ContentModel::Elements { particles, open };
                }
                "attribute" => complex.attributes.push(self.attribute(child)?),
                "anyAttribute" => complex.any_attribute = true,
                "simpleContent" => {
                    let derivation = derivation(child)?;
                    let base = required_attr(derivation, "base")?;
                    complex.content = ContentModel::Simple(self.type_ref(base));
                    for attr in derivation.children_named("attribute") {
                        complex.attributes.push(self.attribute(attr)?);
                    }
                    complex.any_attribute |= derivation.child_named("anyAttribute").is_some();
                }
                "complexContent" => {
                    let derivation = derivation(child)?;
                    let base = required_attr(derivation, "base")?;
                    if derivation.local_name() == "extension" {
                        complex.base = match self.type_ref(base) {
                            TypeRef::Named(name) => Some(name),
                            TypeRef::Builtin(_) => None,
                        };
                    }
                    self.complex_body(derivation, complex)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Collect element particles of a model group, folding the group's own
    /// occurrence bounds into each particle. Returns true if the group
    /// admits `xs:any`.
    fn group(
        &self,
        el: &XmlElement,
        outer_min: u32,
        outer_max: MaxOccurs,
        particles: &mut Vec<ElementDecl>,
    ) -> Result<bool, SchemaError> {
        let (min, max) = occurs(el)?;
        // a choice cannot require any one branch
        let min = if el.local_name() == "choice" { 0 } else { min * outer_min };
        let max = max.times(outer_max);
        let mut open = false;

        for child in &el.children {
            match child.local_name() {
                "element" => {
                    let mut decl = self.element(child)?;
                    decl.min_occurs = decl.min_occurs.saturating_mul(min);
                    decl.max_occurs = decl.max_occurs.times(max);
                    particles.push(decl);
                }
                "sequence" | "all" | "choice" => {
                    open |= self.group(child, min, max, particles)?;
                }
                "any" => open = true,
                _ => {}
            }
        }
        Ok(open)
    }

    fn attribute(&self, el: &XmlElement) -> Result<AttributeDecl, SchemaError> {
        let name = match el.attribute("ref") {
            Some(reference) => reference.to_string(),
            None => required_attr(el, "name")?.to_string(),
        };
        let type_ref = match el.attribute("type") {
            Some(type_name) => self.type_ref(type_name),
            None => match el.child_named("simpleType") {
                // enumerations on attributes are not enforced
                Some(simple) => self.simple_type(simple)?.base,
                None => TypeRef::Builtin(BuiltinType::String),
            },
        };

        Ok(AttributeDecl {
            name,
            type_ref,
            required: el.attribute("use") == Some("required"),
        })
    }

    fn simple_type(&self, el: &XmlElement) -> Result<SimpleType, SchemaError> {
        if let Some(restriction) = el.child_named("restriction") {
            let base = match restriction.attribute("base") {
                Some(base) => self.type_ref(base),
                None => match restriction.child_named("simpleType") {
                    Some(inner) => self.simple_type(inner)?.base,
                    None => TypeRef::Builtin(BuiltinType::String),
                },
            };
            let enumeration = restriction
                .children_named("enumeration")
                .filter_map(|e| e.attribute("value"))
                .map(str::to_string)
                .collect();
            return Ok(SimpleType { base, enumeration });
        }

        // xs:list and xs:union keep their lexical form
        Ok(SimpleType {
            base: TypeRef::Builtin(BuiltinType::String),
            enumeration: Vec::new(),
        })
    }
}

fn required_attr<'a>(el: &'a XmlElement, name: &str) -> Result<&'a str, SchemaError> {
    el.attribute(name).ok_or_else(|| {
        SchemaError::InvalidSchema(format!("'{}' is missing its '{}' attribute", el.name, name))
    })
}

fn derivation(el: &XmlElement) -> Result<&XmlElement, SchemaError> {
    el.child_named("extension")
        .or_else(|| el.child_named("restriction"))
        .ok_or_else(|| {
            SchemaError::InvalidSchema(format!("'{}' has no extension or restriction", el.name))
        })
}

fn occurs(el: &XmlElement) -> Result<(u32, MaxOccurs), SchemaError> {
    let min = match el.attribute("minOccurs") {
        Some(value) => value.parse::<u32>().map_err(|_| {
            SchemaError::InvalidSchema(format!("invalid minOccurs '{}' on '{}'", value, el.name))
        })?,
        None => 1,
    };
    let max = match el.attribute("maxOccurs") {
        Some("unbounded") => MaxOccurs::Unbounded,
        Some(value) => MaxOccurs::Bounded(value.parse::<u32>().map_err(|_| {
            SchemaError::InvalidSchema(format!("invalid maxOccurs '{}' on '{}'", value, el.name))
        })?),
        None => MaxOccurs::Bounded(1),
    };
    Ok((min, max))
}
