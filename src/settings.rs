use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use encoding_rs::Encoding;
use serde::Deserialize;

use crate::decode;

pub const DEFAULT_DB_PATH: &str = "data/surgery.sqlite";
pub const DEFAULT_DEPARTMENT: &str = "二病区";
/// Looked up in the working directory with any extension `config` understands.
pub const CONFIG_FILE: &str = "surgery_extract";
pub const ENV_PREFIX: &str = "SURGERY";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: String,
    /// WHATWG label of the export encoding.
    pub encoding: String,
    pub department: String,
    pub creator: String,
}

impl Settings {
    /// Defaults, then `surgery_extract.toml` if present, then `SURGERY_*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        defaults()?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()
    }

    pub fn encoding(&self) -> &'static Encoding {
        decode::resolve(&self.encoding)
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("db_path", DEFAULT_DB_PATH)?
        .set_default("encoding", decode::DEFAULT_LABEL)?
        .set_default("department", DEFAULT_DEPARTMENT)?
        .set_default("creator", "")
}
