//! The application handle.
//!
//! [`App`] owns everything a front end needs for one interactive session:
//! the configuration, the favorite store, the repository client and the task
//! orchestrator together with its [`Mailbox`]. It is constructed explicitly
//! with [`App::open`] and torn down with [`App::close`]; there is no global
//! state.
//!
//! Repository operations go through the orchestrator under the app's own
//! screen, so identical requests coalesce and closing the app cancels
//! whatever is still in flight.

use std::future::Future;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

use cmis_explorer_core::error::{CmisError, ErrorKind, StoreError};
use cmis_explorer_core::models::{FolderPage, ItemDetail, Server, ServerInfo};
use cmis_explorer_core::store::FavoriteStore;

use crate::config::Config;
use crate::repository::RepositoryClient;
use crate::session::SessionManager;
use crate::sqlite_store::SqliteFavoriteStore;
use crate::tasks::{Mailbox, ScreenId, Shared, Submitted, TaskKey, TaskOrchestrator};
use crate::transport::{HttpTransport, Transport};
use crate::{db, migrate};

pub struct App {
    config: Config,
    pool: SqlitePool,
    favorites: SqliteFavoriteStore,
    client: Arc<RepositoryClient>,
    tasks: TaskOrchestrator,
    mailbox: Mailbox,
    screen: ScreenId,
}

impl App {
    /// Open the favorites database (migrating it if needed) and wire up the
    /// HTTP transport.
    pub async fn open(config: Config) -> Result<Self> {
        let transport = HttpTransport::new(&config.http).context("Failed to build HTTP client")?;
        Self::with_transport(config, Arc::new(transport)).await
    }

    /// Like [`open`](Self::open), with a caller-supplied transport.
    pub async fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let pool = db::connect(&config)
            .await
            .with_context(|| format!("Failed to open database {}", config.db.path.display()))?;
        migrate::apply(&pool).await?;

        let sessions = Arc::new(SessionManager::new(transport));
        let client = Arc::new(RepositoryClient::new(sessions));
        let (tasks, mailbox) = TaskOrchestrator::new(config.tasks.max_workers);
        let screen = tasks.open_screen();

        Ok(Self {
            favorites: SqliteFavoriteStore::new(pool.clone()),
            config,
            pool,
            client,
            tasks,
            mailbox,
            screen,
        })
    }

    /// Cancel outstanding work and close the database.
    pub async fn close(self) {
        self.tasks.close_screen(self.screen);
        self.tasks.shutdown();
        self.pool.close().await;
        debug!("app closed");
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn server(&self, id: &str) -> Result<Server> {
        self.config.server(id)
    }

    pub fn favorites(&self) -> &dyn FavoriteStore {
        &self.favorites
    }

    pub fn client(&self) -> &Arc<RepositoryClient> {
        &self.client
    }

    pub fn tasks(&self) -> &TaskOrchestrator {
        &self.tasks
    }

    /// List a folder, or the repository root when `folder` is `None`.
    pub async fn list(
        &mut self,
        server: &Server,
        folder: Option<&str>,
        cursor: Option<&str>,
    ) -> Result<Shared<FolderPage>> {
        let target = cursor.or(folder).unwrap_or("root");
        let key = TaskKey::listing(&server.id, target);
        let client = self.client.clone();
        let server = server.clone();
        let folder = folder.map(str::to_string);
        let cursor = cursor.map(str::to_string);
        self.run(key, move || async move {
            match folder {
                Some(folder) => {
                    client
                        .list_folder(&server, &folder, cursor.as_deref())
                        .await
                }
                None => client.list_root(&server, cursor.as_deref()).await,
            }
        })
        .await
    }

    pub async fn detail(&mut self, server: &Server, url: &str) -> Result<Shared<ItemDetail>> {
        let key = TaskKey::detail(&server.id, url);
        let client = self.client.clone();
        let server = server.clone();
        let url = url.to_string();
        self.run(key, move || async move { client.get_item_detail(&server, &url).await })
            .await
    }

    pub async fn capabilities(&mut self, server: &Server) -> Result<Shared<ServerInfo>> {
        let key = TaskKey::capabilities(&server.id);
        let client = self.client.clone();
        let server = server.clone();
        self.run(key, move || async move { client.get_capabilities(&server).await })
            .await
    }

    /// Submit `work` under `key` and drain the mailbox until its result
    /// has been delivered.
    pub async fn run<T, F, Fut>(&mut self, key: TaskKey, work: F) -> Result<Shared<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, CmisError>> + Send + 'static,
    {
        let slot: Arc<Mutex<Option<Shared<T>>>> = Arc::new(Mutex::new(None));
        let sink = slot.clone();
        let submitted = self.tasks.submit(self.screen, key.clone(), work, move |result| {
            if let Ok(mut slot) = sink.lock() {
                *slot = Some(result);
            }
        });
        if submitted == Submitted::Ignored {
            bail!("app is closed");
        }

        loop {
            if let Some(result) = slot.lock().ok().and_then(|mut s| s.take()) {
                return Ok(result);
            }
            if self.mailbox.dispatch_next().await.is_none() {
                bail!("task {} finished without a result", key);
            }
        }
    }
}

/// One-line, user-facing explanation of a repository failure.
pub fn describe_error(err: &CmisError) -> String {
    match err.kind() {
        ErrorKind::AuthFailure => {
            "The server rejected the credentials. Check the username and password.".to_string()
        }
        ErrorKind::Unreachable => format!("The server could not be reached ({}).", err),
        ErrorKind::Timeout => "The server took too long to answer.".to_string(),
        ErrorKind::NotFound => "The item no longer exists on the server.".to_string(),
        ErrorKind::CapabilityMismatch => {
            format!("The repository is not supported: {}.", err)
        }
        ErrorKind::MalformedFeed | ErrorKind::UnsupportedKind => {
            format!("The server sent a response that could not be read: {}.", err)
        }
        ErrorKind::UnexpectedStatus => format!("The server answered with an error: {}.", err),
        ErrorKind::InvalidServer => format!("The server entry is misconfigured: {}.", err),
        ErrorKind::StorageFailure => format!("Favorites could not be accessed: {}.", err),
        ErrorKind::Interrupted => format!("The operation stopped unexpectedly: {}.", err),
    }
}

/// Turn a favorite store result into an `anyhow` error carrying the
/// user-facing message.
pub fn from_store<T>(result: Result<T, StoreError>) -> Result<T> {
    result.map_err(|e| anyhow!("{}", describe_error(&CmisError::from(e))))
}

/// Turn a shared repository result into an `anyhow` error carrying the
/// user-facing message.
pub fn into_result<T>(shared: &Shared<T>) -> Result<&T> {
    match shared.as_ref() {
        Ok(value) => Ok(value),
        Err(err) => bail!("{}", describe_error(err)),
    }
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
