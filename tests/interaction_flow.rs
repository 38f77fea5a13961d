//! End-to-end tests for the release workflow over HTTP.
//!
//! Drives the full axum router with in-memory providers: chat commands in,
//! button presses through the interaction callback, and the background
//! release job out to the mock source host.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use releasebot::api::providers::chat::{Control, Message};
use releasebot::api::providers::repo::ComparedCommit;
use releasebot::api::{ApiError, MockChatPoster, MockSourceHost};
use releasebot::config::Config;
use releasebot::rest::{build_router, AppState};
use releasebot::workflow::WorkflowToken;

const SECRET: &str = "secret";
const MANIFEST: &str = r#"{"version": "1.2.3", "build": "40"}"#;

// ─── Test Context ─────────────────────────────────────────────────────────────

struct Harness {
    _snapshots: TempDir,
    state: AppState,
    source: MockSourceHost,
    chat: MockChatPoster,
}

impl Harness {
    fn new() -> Self {
        let snapshots = TempDir::new().expect("Failed to create temp dir");

        let mut config = Config::default();
        config.slack.verification_token = SECRET.to_string();
        config.slack.bot_id = "UBOT".to_string();
        config.manifest.path = "version.json".to_string();
        config.manifest.version_key = "version".to_string();
        config.manifest.build_key = "build".to_string();
        config.snapshots.dir = snapshots.path().to_string_lossy().to_string();

        let source = MockSourceHost::new("main");
        source.add_file("main", "version.json", MANIFEST);
        let chat = MockChatPoster::new();

        let state = AppState::new(config, Arc::new(source.clone()), Arc::new(chat.clone()));
        Self {
            _snapshots: snapshots,
            state,
            source,
            chat,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = build_router(self.state.clone())
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    /// Press a control on a release prompt
    async fn press(&self, name: &str, value: &str) -> (StatusCode, Vec<u8>) {
        self.press_with_token(SECRET, name, value).await
    }

    async fn press_with_token(&self, token: &str, name: &str, value: &str) -> (StatusCode, Vec<u8>) {
        let payload = serde_json::json!({
            "token": token,
            "callback_id": "release",
            "actions": [{"name": name, "type": "button", "value": value}],
            "user": {"id": "UALICE", "name": "alice"},
            "channel": {"id": "C1", "name": "releases"},
        });
        self.send(form_request(&payload.to_string())).await
    }

    async fn prompt(&self, name: &str, value: &str) -> Message {
        let (status, body) = self.press(name, value).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice(&body).unwrap()
    }

    /// Walk the wizard up to the confirmation prompt for 1.3.0 (43)
    async fn confirmation_value(&self) -> String {
        let versions = self.prompt("branch", "main").await;
        let builds = self
            .prompt("version", &control(&versions, "version", "1.3.0").value)
            .await;
        let select = control(&builds, "build_number", "Build number");
        let option = select.options.iter().find(|o| o.text == "43").unwrap();
        let summary = self.prompt("build_number", &option.value).await;
        assert_eq!(
            summary.attachments[0].text,
            "Branch: `main` ✔︎\nCurrent Version: `1.2.3 (40)`\nNext Version: `1.3.0 (43)` ✔︎"
        );
        control(&summary, "run:release", "OK").value.clone()
    }
}

fn form_request(payload: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/slack/interaction")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(format!("payload={}", percent_encode(payload))))
        .unwrap()
}

fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn percent_encode(raw: &str) -> String {
    raw.bytes()
        .map(|b| {
            if b.is_ascii_alphanumeric() {
                (b as char).to_string()
            } else {
                format!("%{b:02X}")
            }
        })
        .collect()
}

fn control<'a>(message: &'a Message, name: &str, text: &str) -> &'a Control {
    message
        .controls()
        .find(|c| c.name == name && c.text == text)
        .unwrap_or_else(|| panic!("no control {name}/{text}"))
}

fn compared(sha: &str, message: &str, login: Option<&str>) -> ComparedCommit {
    ComparedCommit {
        sha: sha.to_string(),
        html_url: format!("https://git.example.com/acme/app/commit/{sha}"),
        message: message.to_string(),
        committer_name: "Alice".to_string(),
        author_name: "Alice".to_string(),
        author_login: login.map(str::to_string),
        author_html_url: login.map(|l| format!("https://git.example.com/{l}")),
    }
}

// ─── Wizard ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_branch_press_offers_version_candidates() {
    let harness = Harness::new();
    let message = harness.prompt("branch", "main").await;

    let texts: Vec<&str> = message.controls().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["1.2.3", "1.2.4", "1.3.0", "2.0.0", "Cancel"]);
    assert_eq!(message.replace_original, Some(true));

    let token = WorkflowToken::decode(&control(&message, "version", "2.0.0").value);
    assert_eq!(token.current_version, "1.2.3");
    assert_eq!(token.current_build_number, "40");
    assert_eq!(token.next_build_number, "41");
    assert_eq!(token.version, "2.0.0");
}

#[tokio::test]
async fn test_cancel_names_the_user() {
    let harness = Harness::new();
    let message = harness.prompt("cancel", "cancel").await;

    assert_eq!(message.attachments[0].fields[0].title, "Operation canceled by 'alice'.");
    assert_eq!(message.controls().count(), 0);
}

#[tokio::test]
async fn test_stale_snapshot_renders_error_in_channel() {
    let harness = Harness::new();
    let value = harness.confirmation_value().await;
    let mut token = WorkflowToken::decode(&value);
    token.manifest_ref = "00000000-0000-4000-8000-000000000000".to_string();

    let message = harness.prompt("run:release", &token.encode()).await;
    let field = &message.attachments[0].fields[0];
    assert_eq!(
        field.title,
        "This release can no longer continue. Start over with `deliver`."
    );
    assert!(!harness.source.was_called("create_ref"));
}

#[tokio::test]
async fn test_upstream_failure_renders_error_in_channel() {
    let harness = Harness::new();
    harness
        .source
        .fail_with("download_file", ApiError::http("mock", 404, "Not Found"));

    let message = harness.prompt("branch", "main").await;
    let field = &message.attachments[0].fields[0];
    assert_eq!(field.title, "Error occurred.");
    assert!(field.value.contains("Not Found"));
    assert_eq!(message.attachments[0].color.as_deref(), Some("danger"));
}

// ─── Release job ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_run_opens_pull_request_with_changelog() {
    let harness = Harness::new();
    harness.source.add_tag("1.2.3", "commit0001");
    harness.source.set_comparison(
        "1.2.3",
        "main",
        vec![
            compared("aaaaaaa111", "Fix login crash\n\nDetails", Some("alice")),
            compared("bbbbbbb222", "Add dark mode", None),
        ],
    );

    let value = harness.confirmation_value().await;
    let ack = harness.prompt("run:release", &value).await;
    assert_eq!(
        ack.attachments[0].fields[0].title,
        "Releasing `1.3.0 (43)` to release ..."
    );

    let posts = harness.chat.wait_for_posts(1).await;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].channel, "C1");
    assert_eq!(
        posts[0].message.text,
        "Releasing `1.3.0 (43)`\nhttps://git.example.com/acme/app/pull/1"
    );

    let prs = harness.source.pull_requests();
    assert_eq!(prs.len(), 1);
    assert_eq!(prs[0].title, "Release 1.3.0 (43)");
    assert_eq!(prs[0].base, "main");
    assert!(prs[0].head.starts_with("release/1.3.0-43-"));

    let lines: Vec<&str> = prs[0].body.lines().collect();
    assert!(lines[0].starts_with(
        "## [1.3.0](https://git.example.com/acme/app/compare/1.2.3...main) ("
    ));
    assert_eq!(
        lines[1],
        "* Add dark mode [bbbbbbb](https://git.example.com/acme/app/commit/bbbbbbb222) (Alice)"
    );
    assert_eq!(
        lines[2],
        "* Fix login crash [aaaaaaa](https://git.example.com/acme/app/commit/aaaaaaa111) ([alice](https://git.example.com/alice))"
    );

    let head = harness.source.ref_sha(&prs[0].head).unwrap();
    let commit = harness.source.commit(&head).unwrap();
    assert!(commit.message.starts_with("Release 1.3.0 (43)\n\n## [1.3.0]"));
    let tree = harness.source.tree(&commit.tree_sha).unwrap();
    assert_eq!(tree[0].path, "version.json");
    let blob = harness.source.blob(&tree[0].blob_sha).unwrap();
    let written: serde_json::Value = serde_json::from_slice(&blob).unwrap();
    assert_eq!(written["version"], "1.3.0");
    assert_eq!(written["build"], "43");
}

#[tokio::test]
async fn test_run_without_tags_has_empty_body() {
    let harness = Harness::new();
    let value = harness.confirmation_value().await;
    harness.prompt("run:release", &value).await;

    harness.chat.wait_for_posts(1).await;
    let prs = harness.source.pull_requests();
    assert_eq!(prs.len(), 1);
    assert_eq!(prs[0].body, "");

    let head = harness.source.ref_sha(&prs[0].head).unwrap();
    assert_eq!(harness.source.commit(&head).unwrap().message, "Release 1.3.0 (43)");
}

#[tokio::test]
async fn test_concurrent_ref_move_reports_failure() {
    let harness = Harness::new();
    harness.source.interfere_before_update("commit9999");

    let value = harness.confirmation_value().await;
    harness.prompt("run:release", &value).await;

    let posts = harness.chat.wait_for_posts(1).await;
    assert!(posts[0]
        .message
        .text
        .starts_with("failed to create pull request"));
    assert!(harness.source.pull_requests().is_empty());
}

// ─── Request validation ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_bad_token_is_unauthorized() {
    let harness = Harness::new();
    let (status, _) = harness.press_with_token("wrong", "branch", "main").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(harness.source.calls().is_empty());
}

#[tokio::test]
async fn test_malformed_payload_is_internal_error() {
    let harness = Harness::new();
    let (status, _) = harness.send(form_request("{not json")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_unknown_action_is_internal_error() {
    let harness = Harness::new();
    let (status, _) = harness.press("deploy", "main").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

// ─── Events and health ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_url_verification_echoes_challenge() {
    let harness = Harness::new();
    let (status, body) = harness
        .send(json_request(
            "/slack/events",
            serde_json::json!({"type": "url_verification", "token": SECRET, "challenge": "c-123"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["challenge"], "c-123");
}

#[tokio::test]
async fn test_mention_posts_branch_prompt() {
    let harness = Harness::new();
    harness.source.add_branch("develop");

    let (status, _) = harness
        .send(json_request(
            "/slack/events",
            serde_json::json!({
                "type": "event_callback",
                "token": SECRET,
                "event": {"type": "app_mention", "channel": "C1", "user": "UALICE", "text": "<@UBOT> deliver"}
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let posts = harness.chat.wait_for_posts(1).await;
    assert_eq!(posts[0].message.attachments[0].text, "Which branch?");
}

#[tokio::test]
async fn test_event_with_bad_token_is_unauthorized() {
    let harness = Harness::new();
    let (status, _) = harness
        .send(json_request(
            "/slack/events",
            serde_json::json!({"type": "url_verification", "token": "wrong", "challenge": "c"}),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health() {
    let harness = Harness::new();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = harness.send(request).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}
