use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::upload::{UploadOptions, DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT};

pub const DEFAULT_ENDPOINT: &str = "https://clippingkk-api.annatarhe.com/api/v2/graphql";
const CONFIG_FILE_NAME: &str = ".ck-cli.toml";
const ENV_PREFIX: &str = "CK";
const AUTHORIZATION: &str = "Authorization";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("cannot locate home directory for {0}")]
    NoHomeDir(&'static str),
    #[error("chunk size must be a positive integer")]
    ZeroChunkSize,
    #[error("concurrency must be a positive integer")]
    ZeroConcurrency,
    #[error("request timeout must be at least one second")]
    ZeroTimeout,
    #[error("invalid endpoint '{0}': expected an http(s) URL")]
    InvalidEndpoint(String),
    #[error("no authentication token found; pass --token or set http.headers.Authorization")]
    MissingToken,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub http: HttpSettings,
    pub upload: UploadSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpSettings {
    pub endpoint: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadSettings {
    pub chunk_size: usize,
    pub concurrency: usize,
    pub timeout_secs: u64,
}

/// Values given on the command line; they win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub chunk_size: Option<usize>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
}

impl Settings {
    /// Defaults, then the TOML file, then `CK_*` environment variables.
    /// An explicitly named file must exist; the default one is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (default_path()?, false),
        };
        Self::load_layers(&path, required, environment())
    }

    fn load_layers(
        path: &Path,
        required: bool,
        env: ::config::Environment,
    ) -> Result<Self, ConfigError> {
        let settings = ::config::Config::builder()
            .set_default("http.endpoint", DEFAULT_ENDPOINT)?
            .set_default("upload.chunk_size", DEFAULT_CHUNK_SIZE as i64)?
            .set_default("upload.concurrency", DEFAULT_CONCURRENCY as i64)?
            .set_default("upload.timeout_secs", DEFAULT_TIMEOUT.as_secs() as i64)?
            .add_source(
                ::config::File::new(&path.to_string_lossy(), ::config::FileFormat::Toml)
                    .required(required),
            )
            .add_source(env)
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(endpoint) = overrides.endpoint {
            self.http.endpoint = endpoint;
        }
        if let Some(token) = overrides.token {
            self.http
                .headers
                .retain(|k, _| !k.eq_ignore_ascii_case(AUTHORIZATION));
            self.http
                .headers
                .insert(AUTHORIZATION.to_string(), format!("X-CLI {}", token));
        }
        if let Some(n) = overrides.chunk_size {
            self.upload.chunk_size = n;
        }
        if let Some(n) = overrides.concurrency {
            self.upload.concurrency = n;
        }
        if let Some(n) = overrides.timeout_secs {
            self.upload.timeout_secs = n;
        }
    }

    /// Everything an upload needs, checked before any request goes out.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upload.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.upload.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.upload.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        let endpoint = self.http.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ConfigError::InvalidEndpoint(self.http.endpoint.clone()));
        }
        match self.authorization() {
            Some(v) if !v.trim().is_empty() => Ok(()),
            _ => Err(ConfigError::MissingToken),
        }
    }

    pub fn authorization(&self) -> Option<&str> {
        self.http
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(AUTHORIZATION))
            .map(|(_, v)| v.as_str())
    }

    pub fn upload_options(&self) -> UploadOptions {
        UploadOptions {
            max_concurrency: self.upload.concurrency,
            timeout: Duration::from_secs(self.upload.timeout_secs),
        }
    }
}

/// `CK_UPLOAD__CHUNK_SIZE=5` sets `upload.chunk_size`.
fn environment() -> ::config::Environment {
    ::config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn default_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir(CONFIG_FILE_NAME))?;
    Ok(home.join(CONFIG_FILE_NAME))
}
