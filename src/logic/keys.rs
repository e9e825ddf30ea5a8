use itertools::Itertools;
use log::{debug, trace};

use crate::model::{FieldValue, FlattenedRecord, Node, Path};

/// XNAT data type the interfile fields belong to
pub const RECORD_TYPE_NAMESPACE: &str = "interfile:petLmScanData";
pub const KEY_SEPARATOR: &str = "/";

/// Key fragment whose full field name exceeds the XNAT field name limit
const LONG_FIELD_CONTEXT: &str = "parallelImaging/accelerationFactor/kspace_encoding_step";
const LONG_FIELD_NAME: &str = "kspace_encoding_step";
const SHORT_FIELD_NAME: &str = "kspace_enc_step";

pub struct KeyBuilder;

impl KeyBuilder {
    /// Flat field key for a path; index segments do not appear in the key
    pub fn flat_key(namespace: &str, path: &Path) -> String {
        let key = std::iter::once(namespace)
            .chain(path.iter().filter_map(|segment| segment.as_key()))
            .join(KEY_SEPARATOR);

        if key.contains(LONG_FIELD_CONTEXT) {
            key.replace(LONG_FIELD_NAME, SHORT_FIELD_NAME)
        } else {
            key
        }
    }

    /// Build the flattened record. Later paths win when two keys collide.
    pub fn build(namespace: &str, paths: &[Path], record: &Node) -> FlattenedRecord {
        let mut flattened = FlattenedRecord::new(namespace);

        for path in paths {
            let key = Self::flat_key(namespace, path);
            let Some(value) = record.resolve(path).and_then(FieldValue::from_node) else {
                debug!("Skipping '{}': value is not a scalar", key);
                continue;
            };

            if let Some(previous) = flattened.insert(key.clone(), value) {
                trace!("Field '{}' overwrote previous value {:?}", key, previous);
            }
        }

        flattened
    }
}
