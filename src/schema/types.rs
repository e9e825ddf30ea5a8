/// XSD built-in types, collapsed to the value kinds a decoded record can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinType {
    String,
    Integer,
    Float,
    Boolean,
    /// `xs:anyType`: any content, decoded structurally
    Any,
}

impl BuiltinType {
    pub fn from_local_name(name: &str) -> Option<Self> {
        let builtin = match name {
            "anyType" => BuiltinType::Any,
            "boolean" => BuiltinType::Boolean,
            "float" | "double" | "decimal" => BuiltinType::Float,
            "integer" | "int" | "long" | "short" | "byte" | "nonNegativeInteger"
            | "positiveInteger" | "negativeInteger" | "nonPositiveInteger" | "unsignedInt"
            | "unsignedLong" | "unsignedShort" | "unsignedByte" => BuiltinType::Integer,
            "string" | "normalizedString" | "token" | "anySimpleType" | "anyURI" | "QName"
            | "NOTATION" | "Name" | "NCName" | "NMTOKEN" | "NMTOKENS" | "ID" | "IDREF"
            | "IDREFS" | "ENTITY" | "ENTITIES" | "language" | "date" | "dateTime" | "time"
            | "duration" | "gYear" | "gYearMonth" | "gMonth" | "gMonthDay" | "gDay"
            | "base64Binary" | "hexBinary" => BuiltinType::String,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn description(&self) -> &'static str {
        match self {
            BuiltinType::String => "string",
            BuiltinType::Integer => "integer",
            BuiltinType::Float => "number",
            BuiltinType::Boolean => "boolean",
            BuiltinType::Any => "value",
        }
    }
}

/// Reference to a type, either built in or defined by the schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Builtin(BuiltinType),
    Named(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxOccurs {
    Bounded(u32),
    Unbounded,
}

impl MaxOccurs {
    pub fn allows(&self, count: usize) -> bool {
        match self {
            MaxOccurs::Bounded(max) => count <= *max as usize,
            MaxOccurs::Unbounded => true,
        }
    }

    /// Elements that may repeat always decode to a sequence
    pub fn is_repeated(&self) -> bool {
        !matches!(self, MaxOccurs::Bounded(0 | 1))
    }

    pub fn times(self, other: MaxOccurs) -> MaxOccurs {
        match (self, other) {
            (MaxOccurs::Bounded(a), MaxOccurs::Bounded(b)) => MaxOccurs::Bounded(a.saturating_mul(b)),
            _ => MaxOccurs::Unbounded,
        }
    }

    pub fn limit(&self) -> u32 {
        match self {
            MaxOccurs::Bounded(max) => *max,
            MaxOccurs::Unbounded => u32::MAX,
        }
    }
}

/// `xs:simpleType`: a base type narrowed by an optional enumeration
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleType {
    pub base: TypeRef,
    pub enumeration: Vec<String>,
}

/// What an element may contain
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Type(TypeRef),
    Simple(SimpleType),
    Complex(ComplexType),
    /// `ref="..."` to a global element
    Ref(String),
}

/// Element particle, local or global
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDecl {
    pub name: String,
    pub kind: ElementKind,
    pub min_occurs: u32,
    pub max_occurs: MaxOccurs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDecl {
    pub name: String,
    pub type_ref: TypeRef,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentModel {
    Empty,
    /// Element-only content; `open` when the model contains `xs:any`
    Elements {
        particles: Vec<ElementDecl>,
        open: bool,
    },
    Simple(TypeRef),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComplexType {
    pub content: ContentModel,
    pub attributes: Vec<AttributeDecl>,
    pub any_attribute: bool,
    /// Named complex type this one extends
    pub base: Option<String>,
}

impl ComplexType {
    pub fn empty() -> Self {
        Self {
            content: ContentModel::Empty,
            attributes: Vec::new(),
            any_attribute: false,
            base: None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDecl> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn particle(&self, name: &str) -> Option<&ElementDecl> {
        match &self.content {
            ContentModel::Elements { particles, .. } => particles.iter().find(|p| p.name == name),
            _ => None,
        }
    }

    /// Merge `self` as an extension of `base`: base particles and attributes first
    pub fn extending(&self, base: &ComplexType) -> ComplexType {
        let content = match (&base.content, &self.content) {
            (ContentModel::Elements { particles: b, open: bo }, ContentModel::Elements { particles: d, open: dopen }) => {
                ContentModel::Elements {
                    particles: b.iter().chain(d.iter()).cloned().collect(),
                    open: *bo || *dopen,
                }
            }
            (_, ContentModel::Empty) => base.content.clone(),
            (_, derived) => derived.clone(),
        };

        let mut attributes = base.attributes.clone();
        for attr in &self.attributes {
            if base.attribute(&attr.name).is_none() {
                attributes.push(attr.clone());
            }
        }

        ComplexType {
            content,
            attributes,
            any_attribute: base.any_attribute || self.any_attribute,
            base: base.base.clone(),
        }
    }
}
