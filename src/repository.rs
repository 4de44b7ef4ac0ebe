//! Repository operations on top of the session layer.
//!
//! | Operation | Fetches | Parsed as |
//! |-----------|---------|-----------|
//! | [`list_root`](RepositoryClient::list_root) | root collection or cursor | feed |
//! | [`list_folder`](RepositoryClient::list_folder) | folder children or cursor | feed |
//! | [`get_item_detail`](RepositoryClient::get_item_detail) | item self link | entry |
//! | [`get_capabilities`](RepositoryClient::get_capabilities) | service document | service |
//!
//! Every operation runs against the server's current session. When the
//! server answers with an authentication failure, whether during the
//! handshake or the fetch itself, the session is invalidated and the
//! operation is retried exactly once. All other failures surface as they
//! are. Relative hrefs in the returned documents are resolved against the
//! URL they were fetched from.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

use cmis_explorer_core::error::CmisError;
use cmis_explorer_core::feed::{parse_entry, parse_feed};
use cmis_explorer_core::models::{FolderPage, ItemDetail, Server, ServerInfo};

use crate::session::{fetch_service, Session, SessionManager};
use crate::transport::{classify_status, classify_transport};

pub struct RepositoryClient {
    sessions: Arc<SessionManager>,
}

impl RepositoryClient {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// List the repository's root folder, or the page behind `cursor`.
    pub async fn list_root(
        &self,
        server: &Server,
        cursor: Option<&str>,
    ) -> Result<FolderPage, CmisError> {
        self.with_session(server, |session| async move {
            let url = cursor.unwrap_or(session.root_url()).to_string();
            self.fetch_page(&session, &url).await
        })
        .await
    }

    /// List a folder's children. `cursor`, when given, is the `next` link of
    /// a previous page and replaces `folder_url`.
    pub async fn list_folder(
        &self,
        server: &Server,
        folder_url: &str,
        cursor: Option<&str>,
    ) -> Result<FolderPage, CmisError> {
        let url = cursor.unwrap_or(folder_url);
        self.with_session(server, |session| async move {
            self.fetch_page(&session, url).await
        })
        .await
    }

    /// Fetch one item's entry with its full property set.
    pub async fn get_item_detail(
        &self,
        server: &Server,
        url: &str,
    ) -> Result<ItemDetail, CmisError> {
        self.with_session(server, |session| async move {
            let (base, body) = self.fetch(&session, url).await?;
            let mut detail = parse_entry(&body)?;
            detail.item.resolve_links(&base);
            Ok(detail)
        })
        .await
    }

    /// Refetch the service document and return the server's general info and
    /// capabilities. The live session picks up the refreshed info.
    pub async fn get_capabilities(&self, server: &Server) -> Result<ServerInfo, CmisError> {
        self.with_session(server, |session| async move {
            let info = fetch_service(
                self.sessions.transport().as_ref(),
                &session.server_id,
                &session.service_url,
                &session.auth,
            )
            .await?;
            let refreshed = self.sessions.refresh_info(&session, info);
            Ok(refreshed.info.to_server_info())
        })
        .await
    }

    /// Run `op` with a live session, retrying once after an auth failure.
    async fn with_session<T, F, Fut>(&self, server: &Server, op: F) -> Result<T, CmisError>
    where
        F: Fn(Arc<Session>) -> Fut,
        Fut: Future<Output = Result<T, CmisError>>,
    {
        let mut retried = false;
        loop {
            let attempt = match self.sessions.ensure(server).await {
                Ok(session) => match op(session.clone()).await {
                    Err(e) if e.is_auth_failure() => {
                        self.sessions.invalidate_session(&session);
                        Err(e)
                    }
                    other => other,
                },
                Err(e) => Err(e),
            };

            match attempt {
                Err(e) if e.is_auth_failure() && !retried => {
                    warn!(server = %server.id, "authentication rejected, renegotiating once");
                    retried = true;
                }
                other => return other,
            }
        }
    }

    async fn fetch_page(&self, session: &Session, url: &str) -> Result<FolderPage, CmisError> {
        let (base, body) = self.fetch(session, url).await?;
        let mut page = parse_feed(&body)?;
        page.resolve_links(&base);
        debug!(url, items = page.items.len(), has_next = page.next.is_some(), "folder page");
        Ok(page)
    }

    /// GET `url`, which may be relative to the session's service document.
    async fn fetch(&self, session: &Session, url: &str) -> Result<(Url, String), CmisError> {
        let base = Url::parse(&session.service_url)
            .and_then(|service| service.join(url))
            .map_err(|e| CmisError::InvalidServer(format!("bad URL '{}': {}", url, e)))?;
        let url = base.as_str();
        let resp = self
            .sessions
            .transport()
            .get(&session.request(url))
            .await
            .map_err(|e| classify_transport(e, url))?;
        classify_status(resp.status, url, &session.server_id)?;
        Ok((base, resp.body))
    }
}
