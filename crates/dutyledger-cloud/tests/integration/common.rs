//! Shared test helpers for the Drive and identity-provider mocks

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use dutyledger_cloud::{client::DriveClient, store::DriveVersionStore};
use dutyledger_core::domain::AccessToken;

pub const PREFIX: &str = "dutyledger_sync_";

pub fn token() -> AccessToken {
    AccessToken::new("test-access-token")
}

/// Starts a mock server and returns a store whose API and upload bases
/// both point at it (uploads live under `/upload`).
pub async fn setup_drive_mock() -> (MockServer, DriveVersionStore) {
    let server = MockServer::start().await;
    let client = DriveClient::with_base_urls(server.uri(), format!("{}/upload", server.uri()));
    let store = DriveVersionStore::new(client, PREFIX, 100);
    (server, store)
}

/// A Drive file resource as `files.list` returns it
pub fn drive_file(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "modifiedTime": "2026-01-15T10:00:00.000Z",
        "size": "512"
    })
}

/// Mounts a single-page listing
pub async fn mount_list(server: &MockServer, files: Value) {
    Mock::given(method("GET"))
        .and(path("/files"))
        .and(query_param("spaces", "appDataFolder"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": files })))
        .mount(server)
        .await;
}

/// Identity-provider authorize endpoint that immediately redirects back
/// to the request's `redirect_uri` with a token fragment echoing `state`.
pub struct ImplicitRedirect {
    pub access_token: &'static str,
    pub expires_in: i64,
}

impl Respond for ImplicitRedirect {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let param = |key: &str| {
            request
                .url
                .query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
                .unwrap_or_default()
        };
        let location = format!(
            "{}#access_token={}&token_type=Bearer&expires_in={}&state={}",
            param("redirect_uri"),
            self.access_token,
            self.expires_in,
            param("state"),
        );
        ResponseTemplate::new(302).insert_header("Location", location.as_str())
    }
}
