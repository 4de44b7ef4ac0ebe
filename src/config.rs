//! TOML configuration parsing and validation.
//!
//! ```toml
//! [db]
//! path = "./data/cmisx.sqlite"
//!
//! [http]
//! timeout_secs = 30
//! user_agent = "cmisx/0.1"
//!
//! [tasks]
//! max_workers = 4
//!
//! [servers.demo]
//! name = "Demo repository"
//! url = "http://localhost:8080/cmis/atom"
//! username = "admin"
//! password_env = "CMIS_DEMO_PASSWORD"
//! ```
//!
//! Each `[servers.<id>]` table becomes a [`Server`]; the table key is the
//! server id that favorites and sessions are keyed by.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use url::Url;

use cmis_explorer_core::models::{CredentialsRef, Server};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub tasks: TasksConfig,
    #[serde(default)]
    pub servers: BTreeMap<String, ServerConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    format!("cmisx/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Deserialize, Clone)]
pub struct TasksConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
        }
    }
}

fn default_max_workers() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Display name; defaults to the table key.
    #[serde(default)]
    pub name: Option<String>,
    /// AtomPub service document URL.
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_env: Option<String>,
}

impl Config {
    /// All configured servers, ordered by id.
    pub fn servers(&self) -> Vec<Server> {
        self.servers
            .iter()
            .map(|(id, cfg)| to_server(id, cfg))
            .collect()
    }

    /// Look up one server by id.
    pub fn server(&self, id: &str) -> Result<Server> {
        match self.servers.get(id) {
            Some(cfg) => Ok(to_server(id, cfg)),
            None => {
                let known: Vec<&str> = self.servers.keys().map(String::as_str).collect();
                bail!(
                    "Unknown server '{}'. Configured servers: {}",
                    id,
                    if known.is_empty() {
                        "(none)".to_string()
                    } else {
                        known.join(", ")
                    }
                )
            }
        }
    }
}

fn to_server(id: &str, cfg: &ServerConfig) -> Server {
    Server {
        id: id.to_string(),
        name: cfg.name.clone().unwrap_or_else(|| id.to_string()),
        url: cfg.url.clone(),
        credentials: cfg.username.as_ref().map(|username| CredentialsRef {
            username: username.clone(),
            password: cfg.password.clone(),
            password_env: cfg.password_env.clone(),
        }),
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.http.timeout_secs == 0 {
        bail!("http.timeout_secs must be > 0");
    }

    if config.tasks.max_workers == 0 {
        bail!("tasks.max_workers must be >= 1");
    }

    for (id, server) in &config.servers {
        let url = Url::parse(&server.url)
            .with_context(|| format!("servers.{}.url is not a valid URL", id))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!(
                "servers.{}.url must use http or https, got '{}'",
                id,
                url.scheme()
            );
        }
        if server.password.is_some() && server.password_env.is_some() {
            bail!("servers.{}: set either password or password_env, not both", id);
        }
        if server.username.is_none() && (server.password.is_some() || server.password_env.is_some())
        {
            bail!("servers.{}: a password requires a username", id);
        }
    }

    Ok(())
}
