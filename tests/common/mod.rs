//! In-process CMIS AtomPub mock server shared by the integration tests.
//!
//! Repository layout:
//!
//! ```text
//! root/
//! ├── Projects/        (f1)
//! │   └── plan.md      (d3)
//! ├── report.pdf       (d1)
//! └── notes.txt        (d2)
//! ```
//!
//! Listings are paged two entries at a time. Every request must carry
//! `admin:secret` basic auth.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "secret";
const AUTHORIZATION: &str = "Basic YWRtaW46c2VjcmV0";
const PAGE_SIZE: usize = 2;

const NS: &str = r#"xmlns="http://www.w3.org/2005/Atom" xmlns:app="http://www.w3.org/2007/app" xmlns:cmis="http://docs.oasis-open.org/ns/cmis/core/200908/" xmlns:cmisra="http://docs.oasis-open.org/ns/cmis/restatom/200908/""#;

struct Node {
    id: &'static str,
    name: &'static str,
    parent: Option<&'static str>,
    /// `None` for folders.
    mimetype: Option<&'static str>,
}

const NODES: &[Node] = &[
    Node { id: "root", name: "Company Home", parent: None, mimetype: None },
    Node { id: "f1", name: "Projects", parent: Some("root"), mimetype: None },
    Node { id: "d1", name: "report.pdf", parent: Some("root"), mimetype: Some("application/pdf") },
    Node { id: "d2", name: "notes.txt", parent: Some("root"), mimetype: Some("text/plain") },
    Node { id: "d3", name: "plan.md", parent: Some("f1"), mimetype: Some("text/markdown") },
];

#[derive(Default)]
pub struct MockState {
    pub service_hits: AtomicUsize,
    pub fetch_hits: AtomicUsize,
    /// Number of upcoming non-service requests to answer with 401.
    pub reject_next: AtomicUsize,
}

pub struct MockServer {
    pub base: String,
    pub state: Arc<MockState>,
}

impl MockServer {
    /// Start the server on an ephemeral port, on its own runtime thread.
    pub fn start() -> Self {
        let state = Arc::new(MockState::default());
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();

        let router = router(state.clone());
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                axum::serve(listener, router).await.unwrap();
            });
        });

        Self {
            base: format!("http://{}", addr),
            state,
        }
    }

    pub fn service_url(&self) -> String {
        format!("{}/cmis/atom", self.base)
    }

    pub fn entry_url(&self, id: &str) -> String {
        format!("{}/cmis/entry/{}", self.base, id)
    }

    pub fn children_url(&self, id: &str) -> String {
        format!("{}/cmis/children/{}", self.base, id)
    }

    pub fn service_hits(&self) -> usize {
        self.state.service_hits.load(Ordering::SeqCst)
    }

    pub fn reject_next(&self, n: usize) {
        self.state.reject_next.store(n, Ordering::SeqCst);
    }
}

fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/cmis/atom", get(service))
        .route("/cmis/children/{id}", get(children))
        .route("/cmis/entry/{id}", get(entry))
        .with_state(state)
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(AUTHORIZATION)
}

fn rejected(state: &MockState, headers: &HeaderMap) -> bool {
    if !authorized(headers) {
        return true;
    }
    state
        .reject_next
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn atom(content_type: &'static str, body: String) -> Response {
    (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], body).into_response()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"cmis\"")],
        "unauthorized",
    )
        .into_response()
}

async fn service(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.service_hits.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return unauthorized();
    }
    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<app:service {NS}>
  <app:workspace>
    <title>Mock</title>
    <cmisra:repositoryInfo>
      <cmis:repositoryId>mock</cmis:repositoryId>
      <cmis:repositoryName>Mock Repository</cmis:repositoryName>
      <cmis:repositoryDescription>In-process test repository</cmis:repositoryDescription>
      <cmis:vendorName>Test</cmis:vendorName>
      <cmis:productName>MockCMIS</cmis:productName>
      <cmis:productVersion>1.0</cmis:productVersion>
      <cmis:rootFolderId>root</cmis:rootFolderId>
      <cmis:capabilities>
        <cmis:capabilityACL>none</cmis:capabilityACL>
        <cmis:capabilityGetDescendants>false</cmis:capabilityGetDescendants>
        <cmis:capabilityQuery>metadataonly</cmis:capabilityQuery>
      </cmis:capabilities>
      <cmis:cmisVersionSupported>1.0</cmis:cmisVersionSupported>
    </cmisra:repositoryInfo>
    <app:collection href="/cmis/children/root">
      <title>Root Collection</title>
      <cmisra:collectionType>root</cmisra:collectionType>
    </app:collection>
  </app:workspace>
</app:service>"#
    );
    atom("application/atomsvc+xml", body)
}

async fn children(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.fetch_hits.fetch_add(1, Ordering::SeqCst);
    if rejected(&state, &headers) {
        return unauthorized();
    }
    let Some(folder) = NODES.iter().find(|n| n.id == id && n.mimetype.is_none()) else {
        return (StatusCode::NOT_FOUND, "no such folder").into_response();
    };

    let kids: Vec<&Node> = NODES.iter().filter(|n| n.parent == Some(folder.id)).collect();
    let skip: usize = query.get("skip").and_then(|s| s.parse().ok()).unwrap_or(0);
    let page: Vec<&Node> = kids.iter().skip(skip).take(PAGE_SIZE).copied().collect();

    let mut body = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<feed {NS}>\n  <title>{}</title>\n  <link rel=\"self\" href=\"/cmis/children/{}\"/>\n  <cmisra:numItems>{}</cmisra:numItems>\n",
        folder.name,
        folder.id,
        kids.len()
    );
    if skip + PAGE_SIZE < kids.len() {
        let _ = writeln!(
            body,
            "  <link rel=\"next\" href=\"/cmis/children/{}?skip={}&amp;maxItems={}\"/>",
            folder.id,
            skip + PAGE_SIZE,
            PAGE_SIZE
        );
    }
    for node in page {
        body.push_str(&entry_xml(node, ""));
    }
    body.push_str("</feed>\n");
    atom("application/atom+xml;type=feed", body)
}

async fn entry(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    state.fetch_hits.fetch_add(1, Ordering::SeqCst);
    if rejected(&state, &headers) {
        return unauthorized();
    }
    match NODES.iter().find(|n| n.id == id) {
        Some(node) => atom(
            "application/atom+xml;type=entry",
            format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}",
                entry_xml(node, &format!(" {NS}"))
            ),
        ),
        None => (StatusCode::NOT_FOUND, "no such object").into_response(),
    }
}

fn entry_xml(node: &Node, ns: &str) -> String {
    let mut xml = format!(
        "<entry{ns}>\n  <id>urn:mock:{id}</id>\n  <title>{name}</title>\n  <author><name>admin</name></author>\n  <updated>2024-05-01T10:00:00Z</updated>\n  <link rel=\"self\" href=\"/cmis/entry/{id}\"/>\n",
        ns = ns,
        id = node.id,
        name = node.name
    );
    if let Some(parent) = node.parent {
        let _ = writeln!(xml, "  <link rel=\"up\" href=\"/cmis/entry/{}\"/>", parent);
    }
    let base_type = match node.mimetype {
        None => {
            let _ = writeln!(
                xml,
                "  <link rel=\"down\" type=\"application/atom+xml;type=feed\" href=\"/cmis/children/{}\"/>",
                node.id
            );
            "cmis:folder"
        }
        Some(mimetype) => {
            let _ = writeln!(
                xml,
                "  <content type=\"{}\" src=\"/cmis/content/{}\"/>",
                mimetype, node.id
            );
            "cmis:document"
        }
    };

    xml.push_str("  <cmisra:object>\n    <cmis:properties>\n");
    let _ = writeln!(
        xml,
        "      <cmis:propertyId propertyDefinitionId=\"cmis:objectId\" displayName=\"Object Id\"><cmis:value>{}</cmis:value></cmis:propertyId>",
        node.id
    );
    let _ = writeln!(
        xml,
        "      <cmis:propertyId propertyDefinitionId=\"cmis:baseTypeId\" displayName=\"Base Type Id\"><cmis:value>{}</cmis:value></cmis:propertyId>",
        base_type
    );
    let _ = writeln!(
        xml,
        "      <cmis:propertyString propertyDefinitionId=\"cmis:name\" displayName=\"Name\"><cmis:value>{}</cmis:value></cmis:propertyString>",
        node.name
    );
    if let Some(mimetype) = node.mimetype {
        let _ = writeln!(
            xml,
            "      <cmis:propertyString propertyDefinitionId=\"cmis:contentStreamMimeType\" displayName=\"Mime Type\"><cmis:value>{}</cmis:value></cmis:propertyString>",
            mimetype
        );
        xml.push_str("      <cmis:propertyInteger propertyDefinitionId=\"cmis:contentStreamLength\" displayName=\"Length\"><cmis:value>2048</cmis:value></cmis:propertyInteger>\n");
    }
    xml.push_str("    </cmis:properties>\n  </cmisra:object>\n</entry>\n");
    xml
}

/// Config TOML pointing server `demo` at `mock`, with the database under
/// `dir`.
pub fn config_toml(dir: &std::path::Path, mock: &MockServer) -> String {
    format!(
        r#"[db]
path = "{}/data/cmisx.sqlite"

[http]
timeout_secs = 5

[servers.demo]
name = "Mock"
url = "{}"
username = "{}"
password = "{}"
"#,
        dir.display(),
        mock.service_url(),
        USERNAME,
        PASSWORD
    )
}
