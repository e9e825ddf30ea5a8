use log::trace;
use std::borrow::Cow;

use crate::model::{Mapping, Node, Scalar};
use crate::schema::xml::{is_reserved_attribute, local_name, XmlElement};
use crate::schema::{
    BuiltinType, ComplexType, ContentModel, ElementKind, SchemaError, SimpleType, TypeRef,
    XmlSchema,
};

/// Key prefix of decoded attributes
pub const ATTRIBUTE_PREFIX: &str = "@";
/// Key holding the text of an element that also carries attributes
pub const TEXT_KEY: &str = "$";

/// Guards against circular type references in a schema
const MAX_TYPE_DEPTH: usize = 32;

enum Resolved<'a> {
    Simple(ResolvedSimple),
    Complex(Cow<'a, ComplexType>),
    Any,
}

#[derive(Debug, Clone)]
struct ResolvedSimple {
    builtin: BuiltinType,
    enumeration: Vec<String>,
}

impl ResolvedSimple {
    fn builtin(builtin: BuiltinType) -> Self {
        Self {
            builtin,
            enumeration: Vec::new(),
        }
    }
}

/// Validates a parsed document against a schema while building its record
pub struct Decoder<'s> {
    schema: &'s XmlSchema,
}

impl<'s> Decoder<'s> {
    pub fn new(schema: &'s XmlSchema) -> Self {
        Self { schema }
    }

    /// Decode a document root; the root's content becomes the record
    pub fn decode_root(&self, root: &XmlElement) -> Result<Node, SchemaError> {
        let name = root.local_name();
        let decl = self
            .schema
            .element(name)
            .ok_or_else(|| SchemaError::UnknownRoot(name.to_string()))?;

        trace!("Decoding document rooted at '{}'", name);
        self.decode_element(root, &decl.kind, &format!("/{}", name))
    }

    fn decode_element(
        &self,
        el: &XmlElement,
        kind: &ElementKind,
        location: &str,
    ) -> Result<Node, SchemaError> {
        match self.resolve_kind(kind, 0)? {
            Resolved::Simple(simple) => self.decode_simple(el, &simple, location),
            Resolved::Complex(complex) => self.decode_complex(el, &complex, location),
            Resolved::Any => Ok(decode_any(el)),
        }
    }

    fn decode_simple(
        &self,
        el: &XmlElement,
        simple: &ResolvedSimple,
        location: &str,
    ) -> Result<Node, SchemaError> {
        reject_children(el, location)?;

        let mut attributes = Mapping::new();
        for (name, value) in &el.attributes {
            if !is_reserved_attribute(name) {
                return Err(SchemaError::UnexpectedAttribute {
                    location: location.to_string(),
                    name: name.clone(),
                });
            }
            attributes.insert(attribute_key(name), Node::from(value.as_str()));
        }

        let value = coerce(&el.text, simple, location)?;
        Ok(with_attributes(attributes, Node::Scalar(value)))
    }

    fn decode_complex(
        &self,
        el: &XmlElement,
        complex: &ComplexType,
        location: &str,
    ) -> Result<Node, SchemaError> {
        let mut mapping = self.decode_attributes(el, complex, location)?;

        match &complex.content {
            ContentModel::Empty => {
                reject_children(el, location)?;
                Ok(Node::Mapping(mapping))
            }
            ContentModel::Simple(type_ref) => {
                reject_children(el, location)?;
                let simple = self.resolve_simple_ref(type_ref, 0)?;
                let value = coerce(&el.text, &simple, location)?;
                Ok(with_attributes(mapping, Node::Scalar(value)))
            }
            ContentModel::Elements { particles, open } => {
                for (name, group) in group_children(el) {
                    let child_location = format!("{}/{}", location, name);
                    let Some(particle) = particles.iter().find(|p| p.name == name) else {
                        if *open {
                            mapping.insert(name, decode_any_group(&group));
                            continue;
                        }
                        return Err(SchemaError::UnexpectedElement {
                            location: location.to_string(),
                            name,
                        });
                    };

                    if !particle.max_occurs.allows(group.len()) {
                        return Err(SchemaError::TooManyOccurrences {
                            location: location.to_string(),
                            count: group.len(),
                            max: particle.max_occurs.limit(),
                            name,
                        });
                    }

                    let mut values = Vec::with_capacity(group.len());
                    for child in &group {
                        values.push(self.decode_element(child, &particle.kind, &child_location)?);
                    }

                    let node = if particle.max_occurs.is_repeated() || values.len() != 1 {
                        Node::Sequence(values)
                    } else {
                        values.remove(0)
                    };
                    mapping.insert(name, node);
                }

                for particle in particles {
                    if particle.min_occurs > 0 && !mapping.contains_key(&particle.name) {
                        return Err(SchemaError::MissingElement {
                            location: location.to_string(),
                            name: particle.name.clone(),
                        });
                    }
                }

                Ok(Node::Mapping(mapping))
            }
        }
    }

    fn decode_attributes(
        &self,
        el: &XmlElement,
        complex: &ComplexType,
        location: &str,
    ) -> Result<Mapping, SchemaError> {
        let mut mapping = Mapping::new();

        for (name, value) in &el.attributes {
            let key = attribute_key(name);
            if is_reserved_attribute(name) {
                mapping.insert(key, Node::from(value.as_str()));
                continue;
            }

            let decl = complex
                .attribute(name)
                .or_else(|| complex.attribute(local_name(name)));
            match decl {
                Some(decl) => {
                    let simple = self.resolve_simple_ref(&decl.type_ref, 0)?;
                    let attr_location = format!("{}/@{}", location, name);
                    mapping.insert(key, Node::Scalar(coerce(value, &simple, &attr_location)?));
                }
                None if complex.any_attribute => mapping.insert(key, Node::from(value.as_str())),
                None => {
                    return Err(SchemaError::UnexpectedAttribute {
                        location: location.to_string(),
                        name: name.clone(),
                    })
                }
            }
        }

        for decl in complex.attributes.iter().filter(|a| a.required) {
            let present = el
                .attributes
                .iter()
                .any(|(n, _)| *n == decl.name || local_name(n) == decl.name);
            if !present {
                return Err(SchemaError::MissingAttribute {
                    location: location.to_string(),
                    name: decl.name.clone(),
                });
            }
        }

        Ok(mapping)
    }

    fn resolve_kind<'a>(&'a self, kind: &'a ElementKind, depth: usize) -> Result<Resolved<'a>, SchemaError> {
        check_depth(depth)?;
        match kind {
            ElementKind::Type(type_ref) => self.resolve_type(type_ref, depth),
            ElementKind::Simple(simple) => Ok(Resolved::Simple(self.resolve_simple(simple, depth)?)),
            ElementKind::Complex(complex) => Ok(Resolved::Complex(self.resolve_complex(complex, depth)?)),
            ElementKind::Ref(name) => {
                let decl = self
                    .schema
                    .element(name)
                    .ok_or_else(|| SchemaError::UnknownType(name.clone()))?;
                self.resolve_kind(&decl.kind, depth + 1)
            }
        }
    }

    fn resolve_type<'a>(&'a self, type_ref: &TypeRef, depth: usize) -> Result<Resolved<'a>, SchemaError> {
        match type_ref {
            TypeRef::Builtin(BuiltinType::Any) => Ok(Resolved::Any),
            TypeRef::Builtin(builtin) => Ok(Resolved::Simple(ResolvedSimple::builtin(*builtin))),
            TypeRef::Named(name) => {
                if let Some(complex) = self.schema.complex_type(name) {
                    Ok(Resolved::Complex(self.resolve_complex(complex, depth + 1)?))
                } else if let Some(simple) = self.schema.simple_type(name) {
                    Ok(Resolved::Simple(self.resolve_simple(simple, depth + 1)?))
                } else {
                    Err(SchemaError::UnknownType(name.clone()))
                }
            }
        }
    }

    /// Apply `complexContent` extensions down to a self-contained type
    fn resolve_complex<'a>(
        &'a self,
        complex: &'a ComplexType,
        depth: usize,
    ) -> Result<Cow<'a, ComplexType>, SchemaError> {
        check_depth(depth)?;
        let Some(base_name) = &complex.base else {
            return Ok(Cow::Borrowed(complex));
        };

        let base = self
            .schema
            .complex_type(base_name)
            .ok_or_else(|| SchemaError::UnknownType(base_name.clone()))?;
        let base = self.resolve_complex(base, depth + 1)?;
        Ok(Cow::Owned(complex.extending(&base)))
    }

    fn resolve_simple(&self, simple: &SimpleType, depth: usize) -> Result<ResolvedSimple, SchemaError> {
        let mut resolved = self.resolve_simple_ref(&simple.base, depth + 1)?;
        if !simple.enumeration.is_empty() {
            resolved.enumeration = simple.enumeration.clone();
        }
        Ok(resolved)
    }

    fn resolve_simple_ref(&self, type_ref: &TypeRef, depth: usize) -> Result<ResolvedSimple, SchemaError> {
        check_depth(depth)?;
        match type_ref {
            TypeRef::Builtin(BuiltinType::Any) => Ok(ResolvedSimple::builtin(BuiltinType::String)),
            TypeRef::Builtin(builtin) => Ok(ResolvedSimple::builtin(*builtin)),
            TypeRef::Named(name) => {
                if let Some(simple) = self.schema.simple_type(name) {
                    return self.resolve_simple(simple, depth + 1);
                }
                match self.schema.complex_type(name).map(|c| &c.content) {
                    Some(ContentModel::Simple(inner)) => self.resolve_simple_ref(inner, depth + 1),
                    Some(_) => Err(SchemaError::InvalidSchema(format!(
                        "'{}' is used as a simple type but has element content",
                        name
                    ))),
                    None => Err(SchemaError::UnknownType(name.clone())),
                }
            }
        }
    }
}

fn check_depth(depth: usize) -> Result<(), SchemaError> {
    if depth > MAX_TYPE_DEPTH {
        return Err(SchemaError::InvalidSchema(
            "type definitions are circular or nested too deeply".to_string(),
        ));
    }
    Ok(())
}

fn attribute_key(name: &str) -> String {
    format!("{}{}", ATTRIBUTE_PREFIX, name)
}

fn with_attributes(mut attributes: Mapping, value: Node) -> Node {
    if attributes.is_empty() {
        return value;
    }
    attributes.insert(TEXT_KEY, value);
    Node::Mapping(attributes)
}

fn reject_children(el: &XmlElement, location: &str) -> Result<(), SchemaError> {
    match el.children.first() {
        Some(child) => Err(SchemaError::UnexpectedElement {
            location: location.to_string(),
            name: child.local_name().to_string(),
        }),
        None => Ok(()),
    }
}

/// Children grouped by local name, in order of first appearance
fn group_children(el: &XmlElement) -> Vec<(String, Vec<&XmlElement>)> {
    let mut groups: Vec<(String, Vec<&XmlElement>)> = Vec::new();
    for child in &el.children {
        let name = child.local_name();
        match groups.iter_mut().find(|(n, _)| n == name) {
            Some((_, members)) => members.push(child),
            None => groups.push((name.to_string(), vec![child])),
        }
    }
    groups
}

/// Structural decoding for `xs:anyType` content; all values stay strings
fn decode_any(el: &XmlElement) -> Node {
    let mut mapping = Mapping::new();
    for (name, value) in &el.attributes {
        mapping.insert(attribute_key(name), Node::from(value.as_str()));
    }

    if el.children.is_empty() {
        if el.text.trim().is_empty() {
            return Node::Mapping(mapping);
        }
        return with_attributes(mapping, Node::from(el.text.as_str()));
    }

    for (name, group) in group_children(el) {
        mapping.insert(name, decode_any_group(&group));
    }
    Node::Mapping(mapping)
}

fn decode_any_group(group: &[&XmlElement]) -> Node {
    match group {
        [single] => decode_any(single),
        _ => Node::Sequence(group.iter().map(|el| decode_any(el)).collect()),
    }
}

fn coerce(text: &str, simple: &ResolvedSimple, location: &str) -> Result<Scalar, SchemaError> {
    let trimmed = text.trim();
    if !simple.enumeration.is_empty() && !simple.enumeration.iter().any(|v| v == trimmed) {
        return Err(SchemaError::NotInEnumeration {
            location: location.to_string(),
            value: trimmed.to_string(),
        });
    }

    let invalid = || SchemaError::InvalidValue {
        location: location.to_string(),
        value: trimmed.to_string(),
        expected: simple.builtin.description(),
    };

    match simple.builtin {
        BuiltinType::String | BuiltinType::Any => Ok(Scalar::String(text.to_string())),
        BuiltinType::Integer => trimmed.parse::<i64>().map(Scalar::Integer).map_err(|_| invalid()),
        BuiltinType::Float => parse_float(trimmed).map(Scalar::Float).ok_or_else(invalid),
        BuiltinType::Boolean => match trimmed {
            "true" | "1" => Ok(Scalar::Boolean(true)),
            "false" | "0" => Ok(Scalar::Boolean(false)),
            _ => Err(invalid()),
        },
    }
}

fn parse_float(text: &str) -> Option<f64> {
    match text {
        "INF" | "+INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => text.parse::<f64>().ok(),
    }
}
