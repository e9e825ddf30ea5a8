use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::model::{Node, Scalar};

/// Key under which the flattened record names its XNAT data type
pub const RECORD_TYPE_KEY: &str = "scans";

/// Value of one XNAT field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Single(Scalar),
    /// A non-empty sequence of scalars left whole by the expansion fixed
    /// point. Sent as a repeated query parameter.
    Multiple(Vec<Scalar>),
}

impl FieldValue {
    /// Convert a resolved node into a field value. Nested structure and empty
    /// sequences have no field representation, since neither yields a query
    /// parameter.
    pub fn from_node(node: &Node) -> Option<Self> {
        match node {
            Node::Scalar(scalar) => Some(FieldValue::Single(scalar.clone())),
            Node::Sequence(items) if items.is_empty() => None,
            Node::Sequence(items) => items
                .iter()
                .map(|item| item.as_scalar().cloned())
                .collect::<Option<Vec<_>>>()
                .map(FieldValue::Multiple),
            Node::Mapping(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            FieldValue::Single(scalar) => Some(scalar),
            FieldValue::Multiple(_) => None,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Single(scalar) => scalar.serialize(serializer),
            FieldValue::Multiple(items) => items.serialize(serializer),
        }
    }
}

impl From<Scalar> for FieldValue {
    fn from(value: Scalar) -> Self {
        FieldValue::Single(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Single(Scalar::from(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Single(Scalar::Integer(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Single(Scalar::Float(value))
    }
}

/// Flat XNAT field map produced from one interfile header.
///
/// Fields keep insertion order: the record type entry first, then fields in
/// discovery order. Overwriting a key keeps its original position.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FlattenedRecord {
    fields: IndexMap<String, FieldValue>,
}

impl FlattenedRecord {
    /// Create a record seeded with the record type entry
    pub fn new(namespace: &str) -> Self {
        let mut fields = IndexMap::new();
        fields.insert(
            RECORD_TYPE_KEY.to_string(),
            FieldValue::Single(Scalar::String(namespace.to_string())),
        );
        Self { fields }
    }

    /// Insert a field, returning the value it overwrote
    pub fn insert(&mut self, key: String, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(key, value)
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Query parameters for the scan PUT, one pair per scalar
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.fields.len());
        for (key, value) in &self.fields {
            match value {
                FieldValue::Single(scalar) => pairs.push((key.clone(), scalar.to_query_value())),
                FieldValue::Multiple(items) => {
                    pairs.extend(items.iter().map(|s| (key.clone(), s.to_query_value())))
                }
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Mapping;

    #[test]
    fn test_new_record_is_seeded() {
        let record = FlattenedRecord::new("interfile:petLmScanData");
        assert_eq!(record.len(), 1);
        assert_eq!(
            record.get(RECORD_TYPE_KEY),
            Some(&FieldValue::from("interfile:petLmScanData"))
        );
    }

    #[test]
    fn test_field_value_from_node() {
        let seq = Node::Sequence(vec![Node::from(1i64), Node::from(2i64)]);
        assert_eq!(
            FieldValue::from_node(&seq),
            Some(FieldValue::Multiple(vec![Scalar::Integer(1), Scalar::Integer(2)]))
        );

        assert_eq!(FieldValue::from_node(&Node::Sequence(Vec::new())), None);

        let nested = Node::Sequence(vec![Node::Mapping(Mapping::new())]);
        assert_eq!(FieldValue::from_node(&nested), None);
        assert_eq!(FieldValue::from_node(&Node::Mapping(Mapping::new())), None);
    }

    #[test]
    fn test_query_pairs_repeat_multiple_values() {
        let mut record = FlattenedRecord::new("ns");
        record.insert(
            "ns/a".to_string(),
            FieldValue::Multiple(vec![Scalar::from("x"), Scalar::from("y")]),
        );
        record.insert("ns/b".to_string(), FieldValue::from(2.5));

        let pairs = record.to_query_pairs();
        assert_eq!(
            pairs,
            vec![
                ("scans".to_string(), "ns".to_string()),
                ("ns/a".to_string(), "x".to_string()),
                ("ns/a".to_string(), "y".to_string()),
                ("ns/b".to_string(), "2.5".to_string()),
            ]
        );
    }

    #[test]
    fn test_overwrite_keeps_first_position() {
        let mut record = FlattenedRecord::new("ns");
        record.insert("ns/start".to_string(), FieldValue::from(0i64));
        record.insert("ns/end".to_string(), FieldValue::from(5i64));
        let previous = record.insert("ns/start".to_string(), FieldValue::from(10i64));

        assert_eq!(previous, Some(FieldValue::from(0i64)));
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["scans", "ns/start", "ns/end"]);
        assert_eq!(record.get("ns/start"), Some(&FieldValue::from(10i64)));
    }

    #[test]
    fn test_serializes_as_flat_json_object() {
        let mut record = FlattenedRecord::new("ns");
        record.insert("ns/energy".to_string(), FieldValue::from(511.0));

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"scans":"ns","ns/energy":511.0}"#);
    }
}
