pub mod client;
pub mod config;
pub mod logic;
pub mod model;
pub mod schema;
pub mod upload;

// Export client types
pub use client::{InMemoryXnat, RestXnatClient, UploadError, XnatClient};

// Export flattening entry points
pub use logic::{
    flatten_record, interfile_listmode_to_xnat, ConvertError, FlattenOptions, KeyBuilder,
    PathDiscovery, PathExpander, MAX_EXPANSION_PASSES, RECORD_TYPE_NAMESPACE,
};

// Export all model types
pub use model::*;

pub use schema::{RecordDecoder, SchemaError, XmlSchema};
pub use upload::{LogReporter, UploadReporter, UploadRequest, UploadSettings, Uploader};

/// Initialise `env_logger`: `info` unless `RUST_LOG` says otherwise, with the
/// HTTP stack capped at `warn`
pub fn init_logging() {
    use log::LevelFilter;

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("reqwest", LevelFilter::Warn)
        .filter_module("hyper", LevelFilter::Warn)
        .try_init();
}
