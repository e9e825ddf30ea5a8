use serde::{Serialize, Serializer};

use crate::model::Segment;

/// Terminal value of a decoded interfile header
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl Scalar {
    /// Render the value the way XNAT expects it in a query string
    pub fn to_query_value(&self) -> String {
        match self {
            Scalar::String(s) => s.clone(),
            Scalar::Integer(i) => i.to_string(),
            Scalar::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 => {
                format!("{:.1}", f)
            }
            Scalar::Float(f) => f.to_string(),
            // XNAT parses Python-style booleans
            Scalar::Boolean(true) => "True".to_string(),
            Scalar::Boolean(false) => "False".to_string(),
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Scalar::String(s) => write!(f, "{}", s),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::String(s) => serializer.serialize_str(s),
            Scalar::Integer(i) => serializer.serialize_i64(*i),
            Scalar::Float(f) => serializer.serialize_f64(*f),
            Scalar::Boolean(b) => serializer.serialize_bool(*b),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Integer(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Boolean(value)
    }
}

/// Key/value children of a mapping node, kept in document order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    entries: Vec<(String, Node)>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Insert or replace; a replaced key keeps its original position
    pub fn insert(&mut self, key: impl Into<String>, value: Node) {
        let key = key.into();
        match self.get_mut(&key) {
            Some(existing) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Node)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (K, Node)>>(iter: I) -> Self {
        let mut mapping = Mapping::new();
        for (key, value) in iter {
            mapping.insert(key, value);
        }
        mapping
    }
}

/// A node of the nested record decoded from an interfile header
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Mapping(Mapping),
    Sequence(Vec<Node>),
    Scalar(Scalar),
}

impl Node {
    /// Follow a path from this node. Index segments only match sequences,
    /// key segments only match mappings.
    pub fn resolve(&self, path: &[Segment]) -> Option<&Node> {
        let mut current = self;
        for segment in path {
            current = match (current, segment) {
                (Node::Mapping(map), Segment::Key(key)) => map.get(key)?,
                (Node::Sequence(items), Segment::Index(idx)) => items.get(*idx)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Node::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Node::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, Node::Mapping(_))
    }
}

macro_rules! scalar_node_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Node {
                fn from(value: $ty) -> Self {
                    Node::Scalar(Scalar::from(value))
                }
            }
        )*
    };
}

scalar_node_from!(&str, String, i64, f64, bool);

impl From<Scalar> for Node {
    fn from(value: Scalar) -> Self {
        Node::Scalar(value)
    }
}

impl From<Mapping> for Node {
    fn from(value: Mapping) -> Self {
        Node::Mapping(value)
    }
}

impl From<Vec<Node>> for Node {
    fn from(value: Vec<Node>) -> Self {
        Node::Sequence(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Node {
        let frames = Node::Sequence(vec![
            Node::Mapping([("start", Node::from(0i64))].into_iter().collect()),
            Node::Mapping([("start", Node::from(10i64))].into_iter().collect()),
        ]);
        Node::Mapping(
            [
                ("frames", frames),
                (
                    "scannerInformation",
                    Node::Mapping([("name", Node::from("GE"))].into_iter().collect()),
                ),
            ]
            .into_iter()
            .collect(),
        )
    }

    #[test]
    fn test_resolve_through_sequence() {
        let root = sample();
        let path = vec![
            Segment::Key("frames".to_string()),
            Segment::Index(1),
            Segment::Key("start".to_string()),
        ];
        assert_eq!(root.resolve(&path), Some(&Node::from(10i64)));
    }

    #[test]
    fn test_resolve_mismatched_segment() {
        let root = sample();
        let path = vec![
            Segment::Key("scannerInformation".to_string()),
            Segment::Index(0),
        ];
        assert!(root.resolve(&path).is_none());
        assert!(root.resolve(&[Segment::Key("missing".to_string())]).is_none());
    }

    #[test]
    fn test_mapping_keeps_insertion_order() {
        let mut map = Mapping::new();
        map.insert("b", Node::from(1i64));
        map.insert("a", Node::from(2i64));
        map.insert("b", Node::from(3i64));

        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(map.get("b"), Some(&Node::from(3i64)));
    }

    #[test]
    fn test_query_value_rendering() {
        assert_eq!(Scalar::Float(511.0).to_query_value(), "511.0");
        assert_eq!(Scalar::Float(1.5).to_query_value(), "1.5");
        assert_eq!(Scalar::Boolean(true).to_query_value(), "True");
        assert_eq!(Scalar::Integer(-3).to_query_value(), "-3");
    }
}
