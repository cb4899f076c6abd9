//! Configuration loading and management.
//!
//! Starts from the embedded config.toml, layers any config files found on disk
//! on top of it, then applies environment variable overrides.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Embedded configuration file content.
const CONFIG_TOML: &str = include_str!("../config.toml");

/// Placeholder client ID shipped in the embedded config.
const PLACEHOLDER_CLIENT_ID: &str = "YOUR_CLIENT_ID_HERE";

/// Files in the working directory, lowest precedence first.
const LOCAL_CONFIG_FILES: &[&str] = &["config.toml", "config.dev.toml"];

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub azure: AzureConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,

    /// Files that were layered over the embedded defaults, in load order.
    #[serde(skip)]
    pub sources: Vec<PathBuf>,
}

/// App registration settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureConfig {
    pub client_id: String,
    pub tenant_id: String,
    /// Space-separated list of delegated Graph scopes.
    pub graph_user_scopes: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub graph_base_url: String,
    pub authority_host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// A partial config file. Every key is optional so a layer only needs to
/// carry what it overrides.
#[derive(Debug, Default, Deserialize)]
struct ConfigLayer {
    #[serde(default)]
    azure: AzureLayer,
    #[serde(default)]
    api: ApiLayer,
    #[serde(default)]
    logging: LoggingLayer,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzureLayer {
    client_id: Option<String>,
    tenant_id: Option<String>,
    graph_user_scopes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiLayer {
    graph_base_url: Option<String>,
    authority_host: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingLayer {
    level: Option<String>,
}

impl Config {
    /// Load configuration from the embedded defaults, config files and environment.
    pub fn load() -> Result<Self> {
        let mut config = Self::embedded()?;

        for path in config_search_paths() {
            if path.is_file() {
                config.apply_file(&path)?;
            }
        }

        config.apply_env();
        config.validate()?;

        Ok(config)
    }

    /// Parse the embedded config.toml without any overrides.
    fn embedded() -> Result<Self> {
        toml::from_str(CONFIG_TOML).context("Failed to parse embedded config.toml")
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        self.apply_layer(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        self.sources.push(path.to_path_buf());
        Ok(())
    }

    /// Overlay the keys present in `content` onto this configuration.
    fn apply_layer(&mut self, content: &str) -> Result<()> {
        let layer: ConfigLayer = toml::from_str(content)?;

        if let Some(client_id) = layer.azure.client_id {
            self.azure.client_id = client_id;
        }
        if let Some(tenant_id) = layer.azure.tenant_id {
            self.azure.tenant_id = tenant_id;
        }
        if let Some(scopes) = layer.azure.graph_user_scopes {
            self.azure.graph_user_scopes = scopes;
        }
        if let Some(url) = layer.api.graph_base_url {
            self.api.graph_base_url = url;
        }
        if let Some(host) = layer.api.authority_host {
            self.api.authority_host = host;
        }
        if let Some(level) = layer.logging.level {
            self.logging.level = level;
        }

        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(client_id) = env::var("AZURE_CLIENT_ID") {
            self.azure.client_id = client_id;
        }

        if let Ok(tenant_id) = env::var("AZURE_TENANT_ID") {
            self.azure.tenant_id = tenant_id;
        }

        if let Ok(scopes) = env::var("GRAPH_USER_SCOPES") {
            self.azure.graph_user_scopes = scopes;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            self.logging.level = log_level;
        }
    }

    /// Validate that required configuration is present.
    fn validate(&self) -> Result<()> {
        if self.azure.client_id.is_empty() || self.azure.client_id == PLACEHOLDER_CLIENT_ID {
            anyhow::bail!(
                "clientId not configured. Set AZURE_CLIENT_ID or add it to the [azure] \
                 section of config.toml / config.dev.toml"
            );
        }

        if self.azure.tenant_id.is_empty() {
            anyhow::bail!(
                "tenantId not configured. Set AZURE_TENANT_ID or add it to the [azure] \
                 section of config.toml / config.dev.toml"
            );
        }

        if self.scopes().is_empty() {
            anyhow::bail!("graphUserScopes must name at least one scope");
        }

        Ok(())
    }

    /// The configured Graph scopes, split on whitespace.
    pub fn scopes(&self) -> Vec<String> {
        self.azure
            .graph_user_scopes
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Get the device authorization endpoint.
    pub fn device_code_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/devicecode",
            self.api.authority_host.trim_end_matches('/'),
            self.azure.tenant_id
        )
    }

    /// Get the token endpoint.
    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.api.authority_host.trim_end_matches('/'),
            self.azure.tenant_id
        )
    }

    /// Configuration pointing both the identity and Graph endpoints at a local server.
    #[cfg(test)]
    pub fn for_server(server_uri: &str) -> Self {
        Self {
            azure: AzureConfig {
                client_id: "test-client".into(),
                tenant_id: "test-tenant".into(),
                graph_user_scopes: "user.read mail.read mail.send".into(),
            },
            api: ApiConfig {
                graph_base_url: format!("{}/v1.0", server_uri),
                authority_host: server_uri.to_string(),
            },
            logging: LoggingConfig {
                level: "warn".into(),
            },
            sources: Vec::new(),
        }
    }
}

/// Config files to layer, lowest precedence first.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(dirs) = ProjectDirs::from("com", "example", "graph-tutorial") {
        paths.push(dirs.config_dir().join("config.toml"));
    }

    paths.extend(LOCAL_CONFIG_FILES.iter().map(PathBuf::from));
    paths
}
