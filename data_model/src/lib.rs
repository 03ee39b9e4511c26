pub mod test_objects;

use std::fmt::{self, Display};

use anyhow::{anyhow, Result};
use derive_builder::Builder;
use schemahub_utils::get_epoch_time_in_ms;
use serde::{Deserialize, Serialize};

/// Key and path segment standing in for "no service" when a schema belongs
/// to the application as a whole. Not a legal service name.
pub const APP_SCOPE_MARKER: &str = "_app";

const MAX_ENTITY_NAME_LEN: usize = 256;

/// Application and service names become key segments and directory names,
/// so the characters used as delimiters there are rejected up front.
pub fn validate_entity_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("name cannot be empty");
    }
    if name.len() > MAX_ENTITY_NAME_LEN {
        return Err("name cannot exceed 256 characters");
    }
    if name.contains('|') {
        return Err("name cannot contain '|'");
    }
    if name.contains('/') || name.contains('\\') {
        return Err("name cannot contain path separators");
    }
    if name.starts_with('.') {
        return Err("name cannot start with '.'");
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Application {
    pub name: String,
    pub created_at: u64,
}

impl Application {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            created_at: get_epoch_time_in_ms(),
        }
    }

    pub fn key(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub application: String,
    pub name: String,
    pub created_at: u64,
}

impl Service {
    pub fn new(application: &str, name: &str) -> Self {
        Self {
            application: application.to_string(),
            name: name.to_string(),
            created_at: get_epoch_time_in_ms(),
        }
    }

    pub fn key(&self) -> String {
        Service::key_from(&self.application, &self.name)
    }

    pub fn key_from(application: &str, name: &str) -> String {
        format!("{}|{}", application, name)
    }
}

/// The (application, service-or-null) pair that version numbers are
/// allocated and active flags are tracked within.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SchemaScope {
    pub application: String,
    pub service: Option<String>,
}

impl SchemaScope {
    pub fn new(application: &str, service: Option<&str>) -> Self {
        Self {
            application: application.to_string(),
            service: service.map(|s| s.to_string()),
        }
    }

    pub fn service_segment(&self) -> &str {
        self.service.as_deref().unwrap_or(APP_SCOPE_MARKER)
    }

    pub fn key(&self) -> String {
        format!("{}|{}", self.application, self.service_segment())
    }

    /// Prefix shared by every SchemaVersion key in this scope.
    pub fn version_key_prefix(&self) -> String {
        format!("{}|{}|", self.application, self.service_segment())
    }

    /// Object key for a version's raw bytes:
    /// `{application}/{service-or-_app}/v{version}__{filename}`.
    pub fn blob_object_key(&self, version: u64, filename: &str) -> String {
        format!(
            "{}/{}/v{}__{}",
            self.application,
            self.service_segment(),
            version,
            filename
        )
    }
}

impl Display for SchemaScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.application, self.service_segment())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaType {
    Json,
    Yaml,
}

impl MediaType {
    pub fn content_type(&self) -> &'static str {
        match self {
            MediaType::Json => "application/json",
            MediaType::Yaml => "application/yaml",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Builder)]
#[builder(build_fn(skip))]
pub struct SchemaVersion {
    pub application: String,
    pub service: Option<String>,
    pub version: u64,
    pub filename: String,
    pub path: String,
    pub size: u64,
    pub sha256_hash: String,
    pub media_type: MediaType,
    pub uploaded_by: Option<String>,
    pub created_at: u64,
    pub active: bool,
}

impl SchemaVersion {
    pub fn scope(&self) -> SchemaScope {
        SchemaScope {
            application: self.application.clone(),
            service: self.service.clone(),
        }
    }

    pub fn key(&self) -> String {
        SchemaVersion::key_from(&self.scope(), self.version)
    }

    /// Versions are zero padded so that lexicographic key order equals
    /// numeric version order and one prefix scan yields them ascending.
    pub fn key_from(scope: &SchemaScope, version: u64) -> String {
        format!("{}|{:020}", scope.key(), version)
    }
}

impl SchemaVersionBuilder {
    pub fn build(&mut self) -> Result<SchemaVersion> {
        let application = self
            .application
            .clone()
            .ok_or(anyhow!("application is required"))?;
        let service = self.service.clone().flatten();
        let version = self.version.ok_or(anyhow!("version is required"))?;
        if version == 0 {
            return Err(anyhow!("version numbers start at 1"));
        }
        let filename = self
            .filename
            .clone()
            .ok_or(anyhow!("filename is required"))?;
        let path = self.path.clone().ok_or(anyhow!("path is required"))?;
        let size = self.size.ok_or(anyhow!("size is required"))?;
        let sha256_hash = self
            .sha256_hash
            .clone()
            .ok_or(anyhow!("sha256_hash is required"))?;
        let media_type = self
            .media_type
            .ok_or(anyhow!("media_type is required"))?;
        let uploaded_by = self.uploaded_by.clone().flatten();
        let created_at: u64 = get_epoch_time_in_ms();
        let active = self.active.unwrap_or(true);
        Ok(SchemaVersion {
            application,
            service,
            version,
            filename,
            path,
            size,
            sha256_hash,
            media_type,
            uploaded_by,
            created_at,
            active,
        })
    }
}
