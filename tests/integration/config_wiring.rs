//! A config file on disk wired through `SessionParts::from_config` to a
//! real HTTP backend client.

use guidevoice::capture::UnsupportedRecognizer;
use guidevoice::config::AssistantConfig;
use guidevoice::session::{ProfileKind, SessionController, SessionEvent, SessionParts};
use guidevoice::tts::SpeechBackends;
use guidevoice::{LanguageCode, Sender};
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::next_matching;

fn write_config(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, body).unwrap();
    path
}

fn spawn_from(path: &std::path::Path) -> guidevoice::SessionHandle {
    let config = AssistantConfig::from_file(path).unwrap();
    let mut parts = SessionParts::from_config(config, Arc::new(UnsupportedRecognizer)).unwrap();
    // Keep the test machine quiet.
    parts.speech = SpeechBackends::default();
    SessionController::spawn(parts).0
}

#[tokio::test]
async fn file_config_drives_profile_language_and_identity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/dev/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "body": json!({"response": "Here are three roles", "sessionId": "srv-5"}).to_string()
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        &format!(
            r#"
            [profile]
            kind = "career_guide"
            title = "Career Guide"
            default_language = "te-IN"

            [backend]
            endpoint = "{}/dev/chat"
            request_timeout_secs = 10

            [identity]
            email = "learner@example.org"
            "#,
            server.uri()
        ),
    );

    let handle = spawn_from(&path);
    let mut events = handle.subscribe();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.title, "Career Guide");
    assert_eq!(snapshot.language, LanguageCode::TeIn);

    handle.send_text("Suggest roles").await.unwrap();
    next_matching(&mut events, |e| {
        matches!(e, SessionEvent::MessageAppended { message, .. } if message.sender() == Sender::Assistant)
    })
    .await;

    let received = server.received_requests().await.unwrap();
    let outer: Value = serde_json::from_slice(&received[0].body).unwrap();
    let inner: Value = serde_json::from_str(outer["body"].as_str().unwrap()).unwrap();
    assert_eq!(inner["lang"], "te-IN");
    assert_eq!(inner["email"], "learner@example.org");
    assert_eq!(inner["message"], "Suggest roles");

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.session_id.unwrap().as_str(), "srv-5");
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn configured_apology_replaces_failed_replies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        &format!(
            r#"
            [backend]
            endpoint = "{}/chat"
            apology_text = "The guide is offline. Try again soon."
            "#,
            server.uri()
        ),
    );

    let handle = spawn_from(&path);
    let mut events = handle.subscribe();
    handle.send_text("Hello").await.unwrap();
    let SessionEvent::MessageAppended { message, .. } = next_matching(&mut events, |e| {
        matches!(e, SessionEvent::MessageAppended { message, .. } if message.sender() == Sender::Assistant)
    })
    .await
    else {
        unreachable!()
    };
    assert_eq!(message.text(), "The guide is offline. Try again soon.");
    handle.shutdown().await.unwrap();
}

#[test]
fn invalid_config_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
        [tts]
        local_volume = 3.0
        "#,
    );
    let err = AssistantConfig::from_file(&path).unwrap_err();
    assert_eq!(err.code(), "CONFIG_INVALID");

    let path = write_config(&dir, "[profile]\nkind = \"tutor\"\n");
    let err = AssistantConfig::from_file(&path).unwrap_err();
    assert_eq!(err.code(), "CONFIG_INVALID");
}

#[test]
fn presets_survive_a_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("interviewer.toml");
    AssistantConfig::for_profile(ProfileKind::RoleBasedInterviewer)
        .save_to_file(&path)
        .unwrap();
    let loaded = AssistantConfig::from_file(&path).unwrap();
    assert_eq!(loaded.profile.kind, ProfileKind::RoleBasedInterviewer);
    assert!(loaded.profile.requires_camera);
    assert!(!loaded.profile.send_language);
    assert!(loaded.capture.continuous);
}
