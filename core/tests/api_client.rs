use axum::Router;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use browsey_core::navigation::LoadState;
use browsey_core::{
	ApiClient, ApiError, ClientConfig, EntryKind, FileContent, FileViewerSession, NavigationSession,
	RemoteFs, ServerDescriptor,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

type Params = Query<HashMap<String, String>>;

async fn list(Query(params): Params) -> Response {
	match params.get("path").map(String::as_str) {
		Some("/") => axum::Json(json!({
			"path": "/",
			"items": [{
				"name": "notes.txt", "type": "file", "size": 120,
				"modified": 1_700_000_000_000i64, "extension": "txt",
				"absolutePath": "/notes.txt"
			}]
		}))
		.into_response(),
		Some("/broken") => "this is not json".into_response(),
		_ => (StatusCode::NOT_FOUND, "no such directory").into_response(),
	}
}

async fn view(Query(params): Params) -> Response {
	match params.get("path").map(String::as_str) {
		Some("/notes.txt") => {
			axum::Json(json!({"type": "text", "content": "hi", "language": null})).into_response()
		}
		_ => (StatusCode::NOT_FOUND, "no such file").into_response(),
	}
}

async fn stat(Query(params): Params) -> Response {
	match params.get("path").map(String::as_str) {
		Some("/notes.txt") => axum::Json(json!({
			"name": "notes.txt", "type": "Plain Text", "size": 2,
			"modified": 1_700_000_000_000i64, "created": null, "absolutePath": "/notes.txt"
		}))
		.into_response(),
		_ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
	}
}

async fn file(Query(params): Params) -> Response {
	match params.get("path").map(String::as_str) {
		Some("/notes.txt") => "hi".into_response(),
		_ => StatusCode::FORBIDDEN.into_response(),
	}
}

async fn slow() -> &'static str {
	tokio::time::sleep(Duration::from_secs(5)).await;
	"late"
}

async fn spawn_server(router: Router) -> ServerDescriptor {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		axum::serve(listener, router).await.unwrap();
	});
	ServerDescriptor::new("test", addr.ip().to_string(), addr.port())
}

async fn browsey_server() -> ServerDescriptor {
	spawn_server(
		Router::new()
			.route("/api/list", get(list))
			.route("/api/view", get(view))
			.route("/api/stat", get(stat))
			.route("/api/file", get(file)),
	)
	.await
}

fn client() -> ApiClient {
	let config = ClientConfig {
		request_timeout: Duration::from_secs(2),
		resource_timeout: Duration::from_secs(3),
		probe_timeout: Duration::from_millis(300),
		..ClientConfig::default()
	};
	ApiClient::new(&config).unwrap()
}

#[tokio::test]
async fn lists_views_stats_and_downloads() {
	let server = browsey_server().await;
	let client = client();

	let entries = client.list_directory(&server, "/").await.unwrap();
	assert_eq!(entries.len(), 1);
	assert_eq!(entries[0].kind, EntryKind::File);
	assert_eq!(entries[0].modified_at.timestamp_millis(), 1_700_000_000_000);

	let content = client.view_file(&server, "/notes.txt").await.unwrap();
	assert_eq!(content.body(), Some("hi"));

	let meta = client.stat_file(&server, "/notes.txt").await.unwrap();
	assert_eq!(meta.size_bytes, 2);
	assert!(meta.created_at.is_none());

	let bytes = client.download_file(&server, "/notes.txt").await.unwrap();
	assert_eq!(bytes, b"hi");
}

#[tokio::test]
async fn classifies_failures() {
	let server = browsey_server().await;
	let client = client();

	let err = client.list_directory(&server, "/missing").await.unwrap_err();
	assert_eq!(err, ApiError::Status(404));

	let err = client.list_directory(&server, "/broken").await.unwrap_err();
	assert!(matches!(err, ApiError::Decode(_)));

	let err = client.download_file(&server, "/secret").await.unwrap_err();
	assert_eq!(err.status_code(), Some(403));

	let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let port = closed.local_addr().unwrap().port();
	drop(closed);
	let offline = ServerDescriptor::new("", "127.0.0.1", port);
	let err = client.list_directory(&offline, "/").await.unwrap_err();
	assert!(matches!(err, ApiError::Network(_)));
}

#[tokio::test]
async fn stalled_response_hits_request_timeout() {
	let config = ClientConfig {
		request_timeout: Duration::from_millis(300),
		resource_timeout: Duration::from_secs(10),
		..ClientConfig::default()
	};
	let client = ApiClient::new(&config).unwrap();
	let stalled = spawn_server(Router::new().route("/api/list", get(slow))).await;

	let started = std::time::Instant::now();
	let err = client.list_directory(&stalled, "/").await.unwrap_err();
	assert!(matches!(err, ApiError::Network(_)));
	assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn probe_never_fails() {
	let client = client();

	let online = browsey_server().await;
	assert!(client.probe(&online).await);

	let erroring = spawn_server(Router::new().route(
		"/api/list",
		get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
	))
	.await;
	assert!(!client.probe(&erroring).await);

	let hanging = spawn_server(Router::new().route("/api/list", get(slow))).await;
	assert!(!client.probe(&hanging).await);

	let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let port = closed.local_addr().unwrap().port();
	drop(closed);
	assert!(!client.probe(&ServerDescriptor::new("", "127.0.0.1", port)).await);

	assert!(!client.probe(&ServerDescriptor::new("", "not a host", 8080)).await);
}

#[tokio::test]
async fn browse_then_view_end_to_end() {
	let server = browsey_server().await;
	let client: Arc<dyn RemoteFs> = Arc::new(client());

	let session = NavigationSession::new(server.clone(), client.clone());
	session.refresh().await.unwrap();
	let entries = session.sorted_entries();
	assert_eq!(session.snapshot().state, LoadState::Loaded);
	assert_eq!(entries[0].absolute_path, "/notes.txt");

	let viewer = FileViewerSession::new(server, entries[0].clone(), client);
	viewer.load().await;
	let snap = viewer.snapshot();
	assert_eq!(snap.state, LoadState::Loaded);
	match snap.content {
		Some(FileContent::Text { content, language }) => {
			assert_eq!(content, "hi");
			assert!(language.is_none());
		}
		other => panic!("unexpected content {other:?}"),
	}
	assert_eq!(snap.metadata.map(|meta| meta.name), Some("notes.txt".to_string()));
}
