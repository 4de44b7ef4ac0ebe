//! Authenticated sessions, one per configured server.
//!
//! A session is the outcome of a successful handshake: the service document
//! was fetched with the server's credentials, parsed, and found to speak a
//! supported CMIS version. Sessions are cached per server id and reused by
//! every request until [`SessionManager::invalidate`] drops them.
//!
//! # Convergence
//!
//! Concurrent [`ensure`](SessionManager::ensure) calls for the same server
//! share one handshake. The first caller becomes the negotiator and parks a
//! `watch` receiver in the slot; everyone arriving later waits on it and
//! receives the same outcome, success or failure. Failures are not cached:
//! the slot is cleared and the next `ensure` negotiates again.
//!
//! Every negotiation carries a generation number. Invalidating while a
//! handshake is in flight orphans it, so its result is handed to the callers
//! already waiting on it but never installed as the cached session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use cmis_explorer_core::error::CmisError;
use cmis_explorer_core::feed::parse_service;
use cmis_explorer_core::models::{RepositoryInfo, Server};

use crate::transport::{classify_status, classify_transport, BasicAuth, FetchRequest, Transport};

/// An established, authenticated session with one server.
#[derive(Debug, Clone)]
pub struct Session {
    pub server_id: String,
    /// Service document URL; relative hrefs in it were resolved against this.
    pub service_url: String,
    pub auth: Option<BasicAuth>,
    pub info: RepositoryInfo,
    pub established_at: DateTime<Utc>,
    generation: u64,
}

impl Session {
    /// Href of the repository's root folder collection.
    pub fn root_url(&self) -> &str {
        // Presence is checked during the handshake.
        self.info.root_collection_url.as_deref().unwrap_or_default()
    }

    pub fn request(&self, url: &str) -> FetchRequest {
        FetchRequest {
            url: url.to_string(),
            auth: self.auth.clone(),
        }
    }
}

type Outcome = Result<Arc<Session>, CmisError>;

enum Slot {
    Live(Arc<Session>),
    Negotiating {
        generation: u64,
        outcome: watch::Receiver<Option<Outcome>>,
    },
}

enum Next {
    Negotiate(u64, watch::Sender<Option<Outcome>>),
    Wait(u64, watch::Receiver<Option<Outcome>>),
}

/// Caches one session per server and converges concurrent handshakes.
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    slots: Mutex<HashMap<String, Slot>>,
    generations: AtomicU64,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            slots: Mutex::new(HashMap::new()),
            generations: AtomicU64::new(1),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the live session for `server`, negotiating one if needed.
    ///
    /// # Errors
    ///
    /// - `AuthFailure` when the server rejects the credentials.
    /// - `Unreachable` / `Timeout` when the service document can't be fetched.
    /// - `CapabilityMismatch` when the repository speaks an unsupported CMIS
    ///   version or advertises no root collection.
    /// - `InvalidServer` when the server entry itself is unusable.
    pub async fn ensure(&self, server: &Server) -> Result<Arc<Session>, CmisError> {
        loop {
            let next = {
                let mut slots = self.slots();
                match slots.get(&server.id) {
                    Some(Slot::Live(session)) => return Ok(session.clone()),
                    Some(Slot::Negotiating {
                        generation,
                        outcome,
                    }) => Next::Wait(*generation, outcome.clone()),
                    None => {
                        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
                        let (tx, rx) = watch::channel(None);
                        slots.insert(
                            server.id.clone(),
                            Slot::Negotiating {
                                generation,
                                outcome: rx,
                            },
                        );
                        Next::Negotiate(generation, tx)
                    }
                }
            };

            match next {
                Next::Negotiate(generation, tx) => {
                    let outcome = self.negotiate(server, generation).await.map(Arc::new);
                    {
                        let mut slots = self.slots();
                        if self.is_current(&slots, &server.id, generation) {
                            match &outcome {
                                Ok(session) => {
                                    slots.insert(server.id.clone(), Slot::Live(session.clone()));
                                }
                                Err(_) => {
                                    slots.remove(&server.id);
                                }
                            }
                        } else {
                            debug!(server = %server.id, generation, "handshake orphaned by invalidation");
                        }
                    }
                    // No receivers left is fine.
                    let _ = tx.send(Some(outcome.clone()));
                    return outcome;
                }
                Next::Wait(generation, mut rx) => {
                    let published = match rx.wait_for(Option::is_some).await {
                        Ok(value) => value.clone(),
                        Err(_) => None,
                    };
                    if let Some(outcome) = published {
                        return outcome;
                    }
                    // The negotiator went away without publishing.
                    let mut slots = self.slots();
                    if self.is_current(&slots, &server.id, generation) {
                        slots.remove(&server.id);
                    }
                }
            }
        }
    }

    fn is_current(
        &self,
        slots: &HashMap<String, Slot>,
        server_id: &str,
        generation: u64,
    ) -> bool {
        match slots.get(server_id) {
            Some(Slot::Negotiating { generation: g, .. }) => *g == generation,
            _ => false,
        }
    }

    /// Drop whatever session (live or in negotiation) is held for `server_id`.
    pub fn invalidate(&self, server_id: &str) {
        if self.slots().remove(server_id).is_some() {
            info!(server = server_id, "session invalidated");
        }
    }

    /// Drop `session` if it is still the cached one for its server.
    ///
    /// A newer session negotiated by someone else in the meantime is kept.
    pub fn invalidate_session(&self, session: &Session) {
        let mut slots = self.slots();
        let stale = matches!(
            slots.get(&session.server_id),
            Some(Slot::Live(live)) if live.generation == session.generation
        );
        if stale {
            slots.remove(&session.server_id);
            info!(server = %session.server_id, "session invalidated");
        }
    }

    /// The live session for `server_id`, if one is cached.
    pub fn session(&self, server_id: &str) -> Option<Arc<Session>> {
        match self.slots().get(server_id) {
            Some(Slot::Live(session)) => Some(session.clone()),
            _ => None,
        }
    }

    /// Replace the repository info of a live session, e.g. after the
    /// capabilities were refetched. Returns the updated session.
    pub fn refresh_info(&self, session: &Session, info: RepositoryInfo) -> Arc<Session> {
        let refreshed = Arc::new(Session {
            info,
            ..session.clone()
        });
        let mut slots = self.slots();
        let current = matches!(
            slots.get(&session.server_id),
            Some(Slot::Live(live)) if live.generation == session.generation
        );
        if current {
            slots.insert(session.server_id.clone(), Slot::Live(refreshed.clone()));
        }
        refreshed
    }

    async fn negotiate(&self, server: &Server, generation: u64) -> Result<Session, CmisError> {
        debug!(server = %server.id, url = %server.url, generation, "negotiating session");

        let auth = resolve_auth(server)?;
        let info = fetch_service(self.transport.as_ref(), &server.id, &server.url, &auth).await?;
        check_supported(&server.id, &info)?;

        info!(
            server = %server.id,
            repository = %info.name,
            version = info.cmis_version.as_deref().unwrap_or("unspecified"),
            "session established"
        );
        Ok(Session {
            server_id: server.id.clone(),
            service_url: server.url.clone(),
            auth,
            info,
            established_at: Utc::now(),
            generation,
        })
    }
}

/// Resolve a server's credential reference into basic-auth credentials.
pub fn resolve_auth(server: &Server) -> Result<Option<BasicAuth>, CmisError> {
    let Some(creds) = &server.credentials else {
        return Ok(None);
    };
    let password = match (&creds.password, &creds.password_env) {
        (Some(password), _) => Some(password.clone()),
        (None, Some(var)) => Some(std::env::var(var).map_err(|_| {
            CmisError::InvalidServer(format!(
                "server '{}': environment variable {} is not set",
                server.id, var
            ))
        })?),
        (None, None) => None,
    };
    Ok(Some(BasicAuth {
        username: creds.username.clone(),
        password,
    }))
}

/// Fetch and decode a service document, resolving its hrefs against `url`.
pub async fn fetch_service(
    transport: &dyn Transport,
    server_id: &str,
    url: &str,
    auth: &Option<BasicAuth>,
) -> Result<RepositoryInfo, CmisError> {
    let base = Url::parse(url).map_err(|e| {
        CmisError::InvalidServer(format!("server '{}': bad url {}: {}", server_id, url, e))
    })?;

    let resp = transport
        .get(&FetchRequest {
            url: url.to_string(),
            auth: auth.clone(),
        })
        .await
        .map_err(|e| classify_transport(e, url))?;
    classify_status(resp.status, url, server_id)?;

    let mut info = parse_service(&resp.body)?;
    info.resolve_links(&base);
    Ok(info)
}

fn check_supported(server_id: &str, info: &RepositoryInfo) -> Result<(), CmisError> {
    match info.cmis_version.as_deref().map(str::trim) {
        None => {
            warn!(server = server_id, "no cmisVersionSupported advertised, assuming 1.0");
        }
        Some(v) if v == "1" || v.starts_with("1.") => {}
        Some(v) => {
            return Err(CmisError::CapabilityMismatch(format!(
                "server '{}' speaks CMIS {}, only 1.x is supported",
                server_id, v
            )));
        }
    }
    if info.root_collection_url.is_none() {
        return Err(CmisError::CapabilityMismatch(format!(
            "server '{}' advertises no root collection",
            server_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{self as fx, ROOT_URL, SERVICE_URL};
    use crate::transport::testing::{ok, ScriptedTransport};
    use crate::transport::TransportError;
    use cmis_explorer_core::error::ErrorKind;
    use cmis_explorer_core::models::CredentialsRef;
    use std::time::Duration;

    fn manager(transport: &Arc<ScriptedTransport>) -> SessionManager {
        SessionManager::new(transport.clone())
    }

    #[tokio::test]
    async fn test_ensure_establishes_and_reuses() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(SERVICE_URL, ok(200, &fx::service_doc(Some("1.1"))));
        let sessions = manager(&transport);

        let first = sessions.ensure(&fx::server()).await.unwrap();
        assert_eq!(first.info.id, "demo-repo");
        assert_eq!(first.root_url(), ROOT_URL);
        assert_eq!(first.auth.as_ref().unwrap().username, "admin");

        let second = sessions.ensure(&fx::server()).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(transport.calls(SERVICE_URL), 1);
        assert!(sessions.session("demo").is_some());
    }

    #[tokio::test]
    async fn test_concurrent_ensure_shares_one_handshake() {
        let transport = Arc::new(ScriptedTransport::with_delay(Duration::from_millis(50)));
        transport.respond(SERVICE_URL, ok(200, &fx::service_doc(Some("1.0"))));
        let sessions = manager(&transport);
        let server = fx::server();

        let (a, b, c) = tokio::join!(
            sessions.ensure(&server),
            sessions.ensure(&server),
            sessions.ensure(&server)
        );
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
        assert_eq!(transport.calls(SERVICE_URL), 1);
    }

    #[tokio::test]
    async fn test_concurrent_failure_is_shared_but_not_cached() {
        let transport = Arc::new(ScriptedTransport::with_delay(Duration::from_millis(30)));
        transport.respond(SERVICE_URL, ok(401, "denied"));
        let sessions = manager(&transport);
        let server = fx::server();

        let (a, b) = tokio::join!(sessions.ensure(&server), sessions.ensure(&server));
        assert_eq!(a.unwrap_err().kind(), ErrorKind::AuthFailure);
        assert_eq!(b.unwrap_err().kind(), ErrorKind::AuthFailure);
        assert_eq!(transport.calls(SERVICE_URL), 1);
        assert!(sessions.session("demo").is_none());

        transport.respond(SERVICE_URL, ok(200, &fx::service_doc(Some("1.0"))));
        sessions.ensure(&server).await.unwrap();
        assert_eq!(transport.calls(SERVICE_URL), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_new_handshake() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(SERVICE_URL, ok(200, &fx::service_doc(Some("1.0"))));
        let sessions = manager(&transport);

        let first = sessions.ensure(&fx::server()).await.unwrap();
        sessions.invalidate("demo");
        assert!(sessions.session("demo").is_none());

        let second = sessions.ensure(&fx::server()).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(transport.calls(SERVICE_URL), 2);
    }

    #[tokio::test]
    async fn test_invalidate_session_keeps_newer_session() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(SERVICE_URL, ok(200, &fx::service_doc(Some("1.0"))));
        let sessions = manager(&transport);

        let stale = sessions.ensure(&fx::server()).await.unwrap();
        sessions.invalidate("demo");
        let fresh = sessions.ensure(&fx::server()).await.unwrap();

        sessions.invalidate_session(&stale);
        let cached = sessions.session("demo").unwrap();
        assert!(Arc::ptr_eq(&cached, &fresh));

        sessions.invalidate_session(&fresh);
        assert!(sessions.session("demo").is_none());
    }

    #[tokio::test]
    async fn test_unsupported_version_is_capability_mismatch() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(SERVICE_URL, ok(200, &fx::service_doc(Some("2.0"))));
        let sessions = manager(&transport);

        let err = sessions.ensure(&fx::server()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapabilityMismatch);
        assert!(sessions.session("demo").is_none());
    }

    #[tokio::test]
    async fn test_missing_version_is_accepted() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(SERVICE_URL, ok(200, &fx::service_doc(None)));
        let sessions = manager(&transport);
        let session = sessions.ensure(&fx::server()).await.unwrap();
        assert_eq!(session.info.cmis_version, None);
    }

    #[tokio::test]
    async fn test_unreachable_and_timeout_classification() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            SERVICE_URL,
            Err(TransportError::Connect("connection refused".into())),
        );
        let sessions = manager(&transport);
        let err = sessions.ensure(&fx::server()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unreachable);

        transport.respond(SERVICE_URL, Err(TransportError::Timeout("30s".into())));
        let err = sessions.ensure(&fx::server()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_missing_password_env_is_invalid_server() {
        let transport = Arc::new(ScriptedTransport::new());
        let sessions = manager(&transport);
        let mut server = fx::server();
        server.credentials = Some(CredentialsRef {
            username: "admin".into(),
            password: None,
            password_env: Some("CMISX_TEST_PASSWORD_THAT_IS_NEVER_SET".into()),
        });

        let err = sessions.ensure(&server).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidServer);
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_info_replaces_cached_session() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(SERVICE_URL, ok(200, &fx::service_doc(Some("1.0"))));
        let sessions = manager(&transport);

        let session = sessions.ensure(&fx::server()).await.unwrap();
        let mut info = session.info.clone();
        info.capabilities.insert("ACL".into(), "manage".into());

        let refreshed = sessions.refresh_info(&session, info);
        assert_eq!(refreshed.info.capabilities["ACL"], "manage");
        let cached = sessions.session("demo").unwrap();
        assert!(Arc::ptr_eq(&cached, &refreshed));
        // The refreshed session still counts as the current one.
        sessions.invalidate_session(&session);
        assert!(sessions.session("demo").is_none());
    }
}
