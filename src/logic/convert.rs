use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logic::{KeyBuilder, PathDiscovery, PathExpander, MAX_EXPANSION_PASSES, RECORD_TYPE_NAMESPACE};
use crate::model::{FlattenedRecord, Node};
use crate::schema::{RecordDecoder, SchemaError};

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("header does not validate against the schema: {0}")]
    Schema(#[from] SchemaError),
}

/// Knobs of the flattening procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenOptions {
    pub namespace: String,
    pub max_passes: usize,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            namespace: RECORD_TYPE_NAMESPACE.to_string(),
            max_passes: MAX_EXPANSION_PASSES,
        }
    }
}

/// Validate and decode an interfile list-mode header, then flatten it into
/// XNAT scan fields
pub fn interfile_listmode_to_xnat(
    header: &[u8],
    decoder: &dyn RecordDecoder,
    options: &FlattenOptions,
) -> Result<FlattenedRecord, ConvertError> {
    let record = decoder.decode(header)?;
    Ok(flatten_record(&record, options))
}

/// Flatten an already decoded record. Never fails: unreachable structure is
/// dropped and nesting past the pass cap is left out.
pub fn flatten_record(record: &Node, options: &FlattenOptions) -> FlattenedRecord {
    let groups = PathDiscovery::main_parameter_groups(record);
    debug!("Discovered {} parameter groups", groups.len());

    let expansion = PathExpander::expand_with_limit(groups, record, options.max_passes);
    if !expansion.converged {
        warn!(
            "Path expansion stopped after {} passes; deeper structure is not flattened",
            expansion.passes
        );
    }

    let flattened = KeyBuilder::build(&options.namespace, &expansion.paths, record);
    info!(
        "Flattened header into {} fields from {} paths",
        flattened.len(),
        expansion.paths.len()
    );
    flattened
}
