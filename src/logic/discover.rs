use crate::model::{Node, Path, Segment};

/// Marker of attribute-style keys in a decoded header
pub const ATTRIBUTE_MARKER: &str = "@";
/// Root groups holding free-form user parameters; these have no XNAT field
pub const USER_PARAMETER_KEY: &str = "userParameter";

pub struct PathDiscovery;

impl PathDiscovery {
    /// One single-segment path per root parameter group, in document order
    pub fn main_parameter_groups(record: &Node) -> Vec<Path> {
        let Some(root) = record.as_mapping() else {
            return Vec::new();
        };

        root.keys()
            .filter(|key| Self::is_parameter_group(key))
            .map(|key| vec![Segment::Key(key.to_string())])
            .collect()
    }

    fn is_parameter_group(key: &str) -> bool {
        !key.contains(ATTRIBUTE_MARKER) && !key.contains(USER_PARAMETER_KEY)
    }
}
