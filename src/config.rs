use std::{env, fmt::Debug, net::SocketAddr};

use anyhow::Result;
use blob_store::BlobStorageConfig;
use figment::{
    providers::{Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::validation::ValidationStrategy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_state_store_path")]
    pub state_store_path: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub blob_storage: BlobStorageConfig,
    #[serde(default)]
    pub validation: ValidationStrategy,
    #[serde(default = "default_uploaded_by")]
    pub default_uploaded_by: String,
    #[serde(default = "default_max_upload_size_bytes")]
    pub max_upload_size_bytes: usize,
    #[serde(default)]
    pub structured_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            state_store_path: default_state_store_path(),
            listen_addr: default_listen_addr(),
            blob_storage: Default::default(),
            validation: Default::default(),
            default_uploaded_by: default_uploaded_by(),
            max_upload_size_bytes: default_max_upload_size_bytes(),
            structured_logging: false,
        }
    }
}

fn default_state_store_path() -> String {
    env::current_dir()
        .expect("unable to get current directory")
        .join("schemahub_storage/state")
        .to_str()
        .expect("unable to get path as string")
        .to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0:8900".to_string()
}

fn default_uploaded_by() -> String {
    "cli".to_string()
}

fn default_max_upload_size_bytes() -> usize {
    16 * 1024 * 1024
}

impl ServerConfig {
    pub fn from_path(path: &str) -> Result<ServerConfig> {
        let config_str = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&config_str)
    }

    fn from_yaml_str(config_str: &str) -> Result<ServerConfig> {
        let config: ServerConfig = Figment::new().merge(Yaml::string(config_str)).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(anyhow::anyhow!(
                "invalid listen address: {}",
                self.listen_addr
            ));
        }
        match &self.blob_storage.path {
            Some(path) => {
                if path.parse::<Url>().is_err() {
                    return Err(anyhow::anyhow!("invalid blob storage path: {}", path));
                }
            }
            None => {
                return Err(anyhow::anyhow!("blob storage path is not configured"));
            }
        }
        if self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("max_upload_size_bytes must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{config::ServerConfig, validation::ValidationStrategy};

    #[test]
    fn should_parse_sample_config() {
        let config_yaml = include_str!("../sample_config.yaml");
        let config = ServerConfig::from_yaml_str(config_yaml).expect("unable to parse from yaml");

        assert_eq!("0.0.0.0:8900", config.listen_addr);
        assert_eq!(ValidationStrategy::Structural, config.validation);
        assert_eq!("ci-pipeline", config.default_uploaded_by);
    }

    #[test]
    fn defaults_are_valid() {
        let config = ServerConfig::default();
        config.validate().expect("default config must validate");
        assert_eq!(ValidationStrategy::Lenient, config.validation);
        assert_eq!("cli", config.default_uploaded_by);
        assert_eq!(16 * 1024 * 1024, config.max_upload_size_bytes);
        assert!(!config.structured_logging);
    }

    #[test]
    fn rejects_bad_listen_addr() {
        let config = ServerConfig {
            listen_addr: "not-an-addr".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_missing_blob_storage_path() {
        let config = ServerConfig {
            blob_storage: blob_store::BlobStorageConfig { path: None },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
