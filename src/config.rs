use serde::{Deserialize, Serialize};

use crate::logic::{FlattenOptions, MAX_EXPANSION_PASSES, RECORD_TYPE_NAMESPACE};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub xnat: XnatConfig,
    pub flatten: FlattenConfig,
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XnatConfig {
    pub url: String,
    pub user: String,
    pub password: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlattenConfig {
    pub namespace: String,
    pub max_passes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub resource_label: String,
    pub experiment_xsi_type: String,
    pub default_scan: String,
    pub schema_path: String,
}

impl Default for XnatConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost".to_string(),
            user: "admin".to_string(),
            password: "admin".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self {
            namespace: RECORD_TYPE_NAMESPACE.to_string(),
            max_passes: MAX_EXPANSION_PASSES,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            resource_label: "PET_RAW".to_string(),
            experiment_xsi_type: "xnat:petSessionData".to_string(),
            default_scan: "pet_listmode_scan".to_string(),
            schema_path: "interfile.xsd".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, an optional `config` file and
    /// `INTERFILE_*` environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        config = config.add_source(config::File::with_name("config").required(false));

        // e.g. INTERFILE_XNAT__URL, INTERFILE_UPLOAD__RESOURCE_LABEL
        config = config.add_source(
            config::Environment::with_prefix("INTERFILE")
                .separator("__")
                .prefix_separator("_"),
        );

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }
}

impl FlattenConfig {
    pub fn options(&self) -> FlattenOptions {
        FlattenOptions {
            namespace: self.namespace.clone(),
            max_passes: self.max_passes,
        }
    }
}
