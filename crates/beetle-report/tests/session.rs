// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! End-to-end issue filing against a stubbed GitHub.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use beetle_github_app::{ErrorKind, GithubAppClient, GithubAppConfig, KeySource};
use beetle_report::{IssueFilingSession, ReportError, Selection, SessionParams, SessionState};
use chrono::{Duration, Utc};
use image::{ImageFormat, Rgba, RgbaImage};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BLOB_URL: &str =
	"https://github.com/acme/widgets/blob/main/.beetle/screenshots/screenshot.png";
/// Private-repository raw URL; its token expires.
const DOWNLOAD_URL: &str =
	"https://raw.githubusercontent.com/acme/widgets/main/.beetle/screenshots/screenshot.png?token=AAAAEXPIRING";

fn private_key_pem() -> String {
	static PEM: OnceLock<String> = OnceLock::new();
	PEM.get_or_init(|| {
		let mut rng = rand::thread_rng();
		RsaPrivateKey::new(&mut rng, 2048)
			.expect("Failed to generate RSA key")
			.to_pkcs8_pem(LineEnding::LF)
			.expect("Failed to encode PKCS#8 PEM")
			.to_string()
	})
	.clone()
}

/// A solid-colour `width` x `height` PNG.
fn png(width: u32, height: u32) -> Vec<u8> {
	let image = RgbaImage::from_pixel(width, height, Rgba([0xd7, 0x3a, 0x4a, 0xff]));
	let mut bytes = Cursor::new(Vec::new());
	image.write_to(&mut bytes, ImageFormat::Png).unwrap();
	bytes.into_inner()
}

struct Fixture {
	server: MockServer,
	dir: TempDir,
	screenshot: PathBuf,
}

impl Fixture {
	async fn new() -> Self {
		let dir = TempDir::new().unwrap();
		let screenshot = dir.path().join("bitmap_1700000000000.png");
		std::fs::write(&screenshot, png(200, 400)).unwrap();

		Self {
			server: MockServer::start().await,
			dir,
			screenshot,
		}
	}

	fn session(&self) -> IssueFilingSession {
		self.session_with(self.server.uri(), &self.screenshot)
	}

	fn session_with(&self, base_url: String, screenshot: &Path) -> IssueFilingSession {
		let config = GithubAppConfig::new(4242, KeySource::Pem(private_key_pem().into()))
			.with_base_url(base_url);
		let client = GithubAppClient::new(config).unwrap();
		IssueFilingSession::new(
			client,
			SessionParams::new("acme", "widgets").with_screenshot(screenshot),
		)
	}

	async fn mount_installation(&self) {
		Mock::given(method("GET"))
			.and(path("/repos/acme/widgets/installation"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"id": 99,
				"account": {"login": "acme", "type": "Organization"}
			})))
			.mount(&self.server)
			.await;

		Mock::given(method("POST"))
			.and(path("/app/installations/99/access_tokens"))
			.and(body_json(json!({"repositories": ["widgets"]})))
			.respond_with(ResponseTemplate::new(201).set_body_json(json!({
				"token": "ghs_session",
				"expires_at": (Utc::now() + Duration::hours(1)).to_rfc3339()
			})))
			.mount(&self.server)
			.await;
	}

	async fn mount_metadata(&self, collaborators: Value, labels: Value) {
		Mock::given(method("GET"))
			.and(path("/repos/acme/widgets/collaborators"))
			.respond_with(ResponseTemplate::new(200).set_body_json(collaborators))
			.mount(&self.server)
			.await;

		Mock::given(method("GET"))
			.and(path("/repos/acme/widgets/labels"))
			.respond_with(ResponseTemplate::new(200).set_body_json(labels))
			.mount(&self.server)
			.await;
	}

	async fn mount_upload(&self) {
		Mock::given(method("PUT"))
			.and(path_regex(
				r"^/repos/acme/widgets/contents/\.beetle/screenshots/screenshot_[0-9]+_[0-9a-f]{8}\.png$",
			))
			.respond_with(ResponseTemplate::new(201).set_body_json(json!({
				"content": {
					"path": ".beetle/screenshots/screenshot.png",
					"html_url": BLOB_URL,
					"download_url": DOWNLOAD_URL
				}
			})))
			.mount(&self.server)
			.await;
	}

	async fn issue_requests(&self) -> Vec<Value> {
		self.server
			.received_requests()
			.await
			.unwrap_or_default()
			.into_iter()
			.filter(|r| r.method.as_str() == "POST" && r.url.path() == "/repos/acme/widgets/issues")
			.map(|r| serde_json::from_slice(&r.body).unwrap())
			.collect()
	}
}

fn created_issue() -> ResponseTemplate {
	ResponseTemplate::new(201).set_body_json(json!({
		"id": 1_296_269,
		"number": 1347,
		"html_url": "https://github.com/acme/widgets/issues/1347"
	}))
}

#[tokio::test]
async fn test_files_issue_end_to_end() {
	let fixture = Fixture::new().await;
	fixture.mount_installation().await;
	fixture
		.mount_metadata(
			json!([{"login": "alice", "id": 1}, {"login": "bob", "id": 2}]),
			json!([{"id": 10, "name": "bug", "color": "d73a4a"}, {"id": 11, "name": "ui"}]),
		)
		.await;
	fixture.mount_upload().await;

	Mock::given(method("POST"))
		.and(path("/repos/acme/widgets/issues"))
		.and(body_json(json!({
			"title": "Crash on launch",
			"body": format!("App crashes immediately\n\n![screenshot]({BLOB_URL}?raw=true)"),
			"assignees": ["alice"],
			"labels": ["bug"]
		})))
		.respond_with(created_issue())
		.expect(1)
		.mount(&fixture.server)
		.await;

	let mut session = fixture.session();
	let states = session.subscribe();

	let snapshot = session.open().await.unwrap();
	assert_eq!(snapshot.collaborators().len(), 2);
	assert_eq!(snapshot.labels().len(), 2);
	assert_eq!(*states.borrow(), SessionState::AwaitingDraft);

	let mut selection = Selection::new();
	selection.select_assignee("alice");
	selection.select_label("bug");

	let draft = snapshot.draft(
		&selection,
		"Crash on launch",
		"App crashes immediately",
		&fixture.screenshot,
	);
	let screenshot = draft.validate().await.unwrap();
	assert_eq!((screenshot.width(), screenshot.height()), (200, 400));

	let issue = session.submit(draft).await.unwrap();
	assert_eq!(issue.number, 1347);
	assert!(!issue.reference("acme", "widgets").is_empty());
	assert!(matches!(session.state(), SessionState::Done(ref done) if done.number == 1347));
	assert!(states.borrow().is_terminal());
}

#[tokio::test]
async fn test_missing_installation_fails_without_creating_issue() {
	let fixture = Fixture::new().await;

	Mock::given(method("GET"))
		.and(path("/repos/acme/widgets/installation"))
		.respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
		.expect(1)
		.mount(&fixture.server)
		.await;

	Mock::given(method("POST"))
		.and(path("/repos/acme/widgets/issues"))
		.respond_with(created_issue())
		.expect(0)
		.mount(&fixture.server)
		.await;

	let mut session = fixture.session();
	let err = session.open().await.unwrap_err();

	assert_eq!(err.kind(), ErrorKind::NotFound);
	assert_eq!(session.state(), SessionState::Failed(ErrorKind::NotFound));

	let draft = beetle_report::IssueDraft::new("Crash on launch", "App crashes immediately", &fixture.screenshot);
	let err = session.submit(draft).await.unwrap_err();
	assert!(matches!(err, ReportError::OutOfOrder { .. }));
	assert_eq!(session.state(), SessionState::Failed(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_rate_limited_issue_creation_is_not_retried() {
	let fixture = Fixture::new().await;
	fixture.mount_installation().await;
	fixture
		.mount_metadata(json!([{"login": "alice"}]), json!([{"name": "bug"}]))
		.await;
	fixture.mount_upload().await;

	Mock::given(method("POST"))
		.and(path("/repos/acme/widgets/issues"))
		.respond_with(
			ResponseTemplate::new(429)
				.insert_header("retry-after", "60")
				.set_body_json(json!({"message": "You have exceeded a secondary rate limit"})),
		)
		.expect(1)
		.mount(&fixture.server)
		.await;

	let mut session = fixture.session();
	let snapshot = session.open().await.unwrap();

	let mut selection = Selection::new();
	selection.select_assignee("alice");
	let draft = snapshot.draft(
		&selection,
		"Crash on launch",
		"App crashes immediately",
		&fixture.screenshot,
	);

	let err = session.submit(draft).await.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::RateLimit);
	assert_eq!(session.state(), SessionState::Failed(ErrorKind::RateLimit));
	assert_eq!(fixture.issue_requests().await.len(), 1);
}

#[tokio::test]
async fn test_only_selected_collaborators_are_assigned() {
	let fixture = Fixture::new().await;
	fixture.mount_installation().await;

	let collaborators: Vec<Value> = (0..12)
		.map(|i| json!({"login": format!("dev{i:02}"), "id": i}))
		.collect();
	fixture
		.mount_metadata(Value::Array(collaborators), json!([{"name": "bug"}]))
		.await;
	fixture.mount_upload().await;

	Mock::given(method("POST"))
		.and(path("/repos/acme/widgets/issues"))
		.respond_with(created_issue())
		.expect(1)
		.mount(&fixture.server)
		.await;

	let mut session = fixture.session();
	let snapshot = session.open().await.unwrap();
	assert_eq!(snapshot.collaborators().len(), 12);

	let mut selection = Selection::new();
	for login in ["dev07", "dev02", "dev11"] {
		selection.select_assignee(login);
	}
	let draft = snapshot.draft(&selection, "Crash", "Boom", &fixture.screenshot);
	session.submit(draft).await.unwrap();

	let requests = fixture.issue_requests().await;
	assert_eq!(requests.len(), 1);
	assert_eq!(requests[0]["assignees"], json!(["dev02", "dev07", "dev11"]));
	assert!(requests[0].get("labels").is_none());
}

#[tokio::test]
async fn test_invalid_screenshot_fails_session_before_upload() {
	let fixture = Fixture::new().await;
	fixture.mount_installation().await;
	fixture
		.mount_metadata(json!([{"login": "alice"}]), json!([{"name": "bug"}]))
		.await;

	Mock::given(method("PUT"))
		.respond_with(ResponseTemplate::new(201))
		.expect(0)
		.mount(&fixture.server)
		.await;

	let not_png = fixture.dir.path().join("notes.txt");
	std::fs::write(&not_png, b"not an image").unwrap();

	let mut session = fixture.session_with(fixture.server.uri(), &not_png);
	session.open().await.unwrap();

	let draft = beetle_report::IssueDraft::new("Crash", "Boom", &not_png);
	let err = session.submit(draft).await.unwrap_err();
	assert!(matches!(err, ReportError::Screenshot(_)));
	assert_eq!(session.state(), SessionState::Failed(ErrorKind::Io));
}

#[tokio::test]
async fn test_draft_for_other_screenshot_is_rejected_without_upload() {
	let fixture = Fixture::new().await;
	fixture.mount_installation().await;
	fixture
		.mount_metadata(json!([{"login": "alice"}]), json!([{"name": "bug"}]))
		.await;

	Mock::given(method("PUT"))
		.respond_with(ResponseTemplate::new(201))
		.expect(0)
		.mount(&fixture.server)
		.await;

	let other = fixture.dir.path().join("bitmap_1800000000000.png");
	std::fs::write(&other, png(20, 20)).unwrap();

	let mut session = fixture.session();
	session.open().await.unwrap();

	let draft = beetle_report::IssueDraft::new("Crash", "Boom", &other);
	let err = session.submit(draft).await.unwrap_err();
	assert!(matches!(err, ReportError::InvalidDraft(_)));
	assert_eq!(session.state(), SessionState::AwaitingDraft);
}

#[tokio::test]
async fn test_unreachable_github_fails_session_with_network_kind() {
	let fixture = Fixture::new().await;
	let mut session = fixture.session_with("http://127.0.0.1:1".to_string(), &fixture.screenshot);
	let states = session.subscribe();

	let err = session.open().await.unwrap_err();

	assert_eq!(err.kind(), ErrorKind::Network);
	assert_eq!(session.state(), SessionState::Failed(ErrorKind::Network));
	assert!(states.borrow().is_terminal());
	assert!(fixture.server.received_requests().await.unwrap_or_default().is_empty());
}
