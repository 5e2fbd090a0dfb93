//! Typed turns through the session controller: backend round trips,
//! failure handling, muting, language and conversation resets.

use crate::helpers::{FakeCamera, HarnessBuilder, RecordingVoice, ScriptedBackend, settle};
use guidevoice::config::DEFAULT_APOLOGY;
use guidevoice::session::{NoticeKind, ProfileKind, SessionEvent, SessionState};
use guidevoice::{LanguageCode, Sender, SessionId};
use std::time::Duration;

#[tokio::test]
async fn hello_round_trip_adopts_server_session_and_speaks() {
    let mut h = HarnessBuilder::new(ProfileKind::CareerGuide).spawn();
    h.backend.reply("Hi there!", Some("srv-1"));

    h.handle.send_text("  Hello ").await.unwrap();

    let SessionEvent::MessageAppended { message, .. } = h
        .expect(|e| matches!(e, SessionEvent::MessageAppended { .. }))
        .await
    else {
        unreachable!()
    };
    assert_eq!(message.sender(), Sender::User);
    assert_eq!(message.text(), "Hello");

    h.expect_state(SessionState::AwaitingResponse).await;
    let adopted = h
        .expect(|e| matches!(e, SessionEvent::SessionAdopted { .. }))
        .await;
    assert_eq!(
        adopted,
        SessionEvent::SessionAdopted {
            session_id: SessionId::from_server("srv-1")
        }
    );
    h.expect_state(SessionState::Speaking).await;
    h.expect(|e| matches!(e, SessionEvent::SpeechFinished { .. }))
        .await;
    h.expect_state(SessionState::Idle).await;

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.session_id, Some(SessionId::from_server("srv-1")));
    let texts: Vec<_> = snapshot.messages.iter().map(|m| m.text()).collect();
    assert_eq!(texts, ["Hello", "Hi there!"]);
    assert_eq!(snapshot.messages[1].sender(), Sender::Assistant);
    assert_eq!(h.voice.texts(), ["Hi there!"]);

    let requests = h.backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].message, "Hello");
    assert_eq!(requests[0].language, Some(LanguageCode::EnUs));

    h.shutdown().await;
}

#[tokio::test]
async fn follow_up_turn_uses_adopted_session_id() {
    let mut h = HarnessBuilder::new(ProfileKind::CareerGuide).spawn();
    h.backend.reply("First", Some("srv-7"));
    h.backend.reply("Second", None);

    h.handle.send_text("one").await.unwrap();
    h.expect(|e| matches!(e, SessionEvent::SpeechFinished { .. }))
        .await;
    h.expect_state(SessionState::Idle).await;
    h.handle.send_text("two").await.unwrap();
    h.expect(|e| matches!(e, SessionEvent::SpeechFinished { .. }))
        .await;

    let requests = h.backend.requests();
    assert_eq!(requests[1].session_id, SessionId::from_server("srv-7"));
    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.session_id, Some(SessionId::from_server("srv-7")));

    h.shutdown().await;
}

#[tokio::test]
async fn backend_failure_appends_apology_and_keeps_session() {
    let mut h = HarnessBuilder::new(ProfileKind::CareerGuide).spawn();
    h.backend.fail("HTTP error! status: 500");

    h.handle.send_text("Hello").await.unwrap();
    let SessionEvent::MessageAppended { session_id, .. } = h
        .expect(|e| matches!(e, SessionEvent::MessageAppended { .. }))
        .await
    else {
        unreachable!()
    };

    let SessionEvent::MessageAppended { message, .. } = h
        .expect(|e| matches!(e, SessionEvent::MessageAppended { message, .. } if message.sender() == Sender::Assistant))
        .await
    else {
        unreachable!()
    };
    assert_eq!(message.text(), DEFAULT_APOLOGY);
    h.expect_state(SessionState::Idle).await;

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.session_id, Some(session_id));
    assert_eq!(snapshot.messages.len(), 2);
    assert!(h.voice.texts().is_empty());

    // Input is usable again.
    h.handle.send_text("retry").await.unwrap();
    h.shutdown().await;
}

#[tokio::test]
async fn blank_text_is_rejected() {
    let h = HarnessBuilder::new(ProfileKind::CareerGuide).spawn();
    let err = h.handle.send_text("   \n").await.unwrap_err();
    assert_eq!(err.code(), "EMPTY_MESSAGE");
    let snapshot = h.handle.snapshot().await.unwrap();
    assert!(snapshot.session_id.is_none());
    assert!(snapshot.messages.is_empty());
    h.shutdown().await;
}

#[tokio::test]
async fn second_send_while_awaiting_is_rejected() {
    let backend = ScriptedBackend::held();
    let mut h = HarnessBuilder::new(ProfileKind::CareerGuide)
        .backend(backend)
        .spawn();

    h.handle.send_text("first").await.unwrap();
    h.expect_state(SessionState::AwaitingResponse).await;
    let err = h.handle.send_text("second").await.unwrap_err();
    assert_eq!(err.code(), "REQUEST_IN_FLIGHT");

    h.backend.release();
    h.expect_state(SessionState::Speaking).await;
    assert_eq!(h.backend.requests().len(), 1);
    h.shutdown().await;
}

#[tokio::test]
async fn muting_mid_reply_silences_and_later_replies_stay_silent() {
    let voice = RecordingVoice::new(Duration::from_secs(30));
    let mut h = HarnessBuilder::new(ProfileKind::CareerGuide)
        .voice(voice)
        .spawn();
    h.backend.reply("A long answer", None);
    h.backend.reply("Another answer", None);

    h.handle.send_text("tell me").await.unwrap();
    h.expect(|e| matches!(e, SessionEvent::SpeechStarted { .. }))
        .await;

    h.handle.set_muted(true).await.unwrap();
    h.expect(|e| matches!(e, SessionEvent::SpeechFinished { .. }))
        .await;
    assert_eq!(h.voice.stopped(), 1);
    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Idle);
    assert!(snapshot.muted);

    h.handle.send_text("again").await.unwrap();
    h.expect(|e| matches!(e, SessionEvent::MessageAppended { message, .. } if message.text() == "Another answer"))
        .await;
    h.expect_state(SessionState::Idle).await;
    settle().await;
    assert!(
        !h.drain()
            .iter()
            .any(|e| matches!(e, SessionEvent::SpeechStarted { .. }))
    );
    assert_eq!(h.voice.texts(), ["A long answer"]);
    h.shutdown().await;
}

#[tokio::test]
async fn typing_while_speaking_interrupts_the_reply() {
    let voice = RecordingVoice::new(Duration::from_secs(30));
    let mut h = HarnessBuilder::new(ProfileKind::CareerGuide)
        .voice(voice)
        .spawn();
    h.backend.reply("A long answer", None);

    h.handle.send_text("first").await.unwrap();
    h.expect(|e| matches!(e, SessionEvent::SpeechStarted { .. }))
        .await;

    h.handle.send_text("second").await.unwrap();
    assert_eq!(h.voice.stopped(), 1);
    h.expect(|e| matches!(e, SessionEvent::SpeechFinished { .. }))
        .await;
    h.expect(|e| matches!(e, SessionEvent::MessageAppended { message, .. } if message.text() == "ok"))
        .await;
    let sent: Vec<_> = h.backend.requests().into_iter().map(|r| r.message).collect();
    assert_eq!(sent, ["first", "second"]);
    h.shutdown().await;
}

#[tokio::test]
async fn formatted_reply_is_displayed_as_markup_and_spoken_plain() {
    let mut h = HarnessBuilder::new(ProfileKind::RoleBasedInterviewer).spawn();
    h.backend.reply("**Score:** 8/10\nGreat job", None);

    h.handle.send_text("my answer").await.unwrap();
    let SessionEvent::MessageAppended { message, .. } = h
        .expect(|e| matches!(e, SessionEvent::MessageAppended { message, .. } if message.sender() == Sender::Assistant))
        .await
    else {
        unreachable!()
    };
    assert_eq!(
        message.text(),
        "<strong>Score:</strong> 8/10<br>Great job"
    );
    h.expect(|e| matches!(e, SessionEvent::SpeechFinished { .. }))
        .await;
    assert_eq!(h.voice.texts(), ["Score: 8/10 Great job"]);
    h.shutdown().await;
}

#[tokio::test]
async fn language_travels_with_the_request_and_the_voice() {
    let mut h = HarnessBuilder::new(ProfileKind::CareerGuide)
        .config(|c| c.identity.email = "student@example.org".to_owned())
        .spawn();

    h.handle.set_language(LanguageCode::HiIn).await.unwrap();
    assert_eq!(
        h.expect(|e| matches!(e, SessionEvent::LanguageChanged { .. }))
            .await,
        SessionEvent::LanguageChanged {
            language: LanguageCode::HiIn
        }
    );
    h.handle.send_text("नमस्ते").await.unwrap();
    h.expect(|e| matches!(e, SessionEvent::SpeechFinished { .. }))
        .await;

    let request = &h.backend.requests()[0];
    assert_eq!(request.language, Some(LanguageCode::HiIn));
    assert_eq!(request.email, "student@example.org");
    assert_eq!(h.voice.utterances()[0].language, LanguageCode::HiIn);

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.language, LanguageCode::HiIn);
    assert_ne!(snapshot.greeting, "");
    h.shutdown().await;
}

#[tokio::test]
async fn interviewer_requests_omit_language() {
    let mut h = HarnessBuilder::new(ProfileKind::RoleBasedInterviewer).spawn();
    h.handle.send_text("ready").await.unwrap();
    h.expect(|e| matches!(e, SessionEvent::SpeechStarted { .. }))
        .await;
    assert_eq!(h.backend.requests()[0].language, None);
    h.shutdown().await;
}

#[tokio::test]
async fn language_is_locked_while_speaking() {
    let voice = RecordingVoice::new(Duration::from_secs(30));
    let mut h = HarnessBuilder::new(ProfileKind::CareerGuide)
        .voice(voice)
        .spawn();

    h.handle.send_text("hi").await.unwrap();
    h.expect(|e| matches!(e, SessionEvent::SpeechStarted { .. }))
        .await;
    let err = h
        .handle
        .set_language(LanguageCode::TeIn)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "LANGUAGE_LOCKED");
    assert_eq!(
        h.handle.snapshot().await.unwrap().language,
        LanguageCode::EnUs
    );
    h.shutdown().await;
}

#[tokio::test]
async fn new_conversation_from_idle_creates_a_session() {
    let mut h = HarnessBuilder::new(ProfileKind::QueryHandler).spawn();
    let id = h.handle.new_conversation().await.unwrap();
    assert_eq!(
        h.expect(|e| matches!(e, SessionEvent::ConversationReset { .. }))
            .await,
        SessionEvent::ConversationReset {
            session_id: id.clone()
        }
    );
    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.session_id, Some(id));
    assert!(snapshot.messages.is_empty());
    h.shutdown().await;
}

#[tokio::test]
async fn new_conversation_while_awaiting_ignores_the_late_reply() {
    let backend = ScriptedBackend::held();
    let mut h = HarnessBuilder::new(ProfileKind::CareerGuide)
        .backend(backend)
        .spawn();
    h.backend.reply("too late", Some("srv-old"));

    h.handle.send_text("Hello").await.unwrap();
    let SessionEvent::MessageAppended { session_id: old, .. } = h
        .expect(|e| matches!(e, SessionEvent::MessageAppended { .. }))
        .await
    else {
        unreachable!()
    };
    h.expect_state(SessionState::AwaitingResponse).await;

    let fresh = h.handle.new_conversation().await.unwrap();
    assert_ne!(fresh, old);
    assert_eq!(h.handle.snapshot().await.unwrap().state, SessionState::Idle);

    h.backend.release();
    settle().await;

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.session_id, Some(fresh));
    assert!(snapshot.messages.is_empty());
    assert_eq!(snapshot.state, SessionState::Idle);
    assert!(h.voice.texts().is_empty());
    h.shutdown().await;
}

#[tokio::test]
async fn new_conversation_while_speaking_stops_speech_and_clears_log() {
    let voice = RecordingVoice::new(Duration::from_secs(30));
    let mut h = HarnessBuilder::new(ProfileKind::CareerGuide)
        .voice(voice)
        .spawn();

    h.handle.send_text("Hello").await.unwrap();
    h.expect(|e| matches!(e, SessionEvent::SpeechStarted { .. }))
        .await;

    h.handle.new_conversation().await.unwrap();
    assert_eq!(h.voice.stopped(), 1);
    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Idle);
    assert!(snapshot.messages.is_empty());
    h.shutdown().await;
}

#[tokio::test]
async fn interviewer_holds_camera_until_shutdown() {
    let camera = FakeCamera::working();
    let h = HarnessBuilder::new(ProfileKind::RoleBasedInterviewer)
        .camera(camera.clone())
        .spawn();

    assert!(h.handle.snapshot().await.unwrap().camera_active);
    assert!(camera.is_held());

    h.shutdown().await;
    assert!(!camera.is_held());
    assert_eq!(camera.acquired(), 1);
    assert_eq!(camera.released(), 1);
}

#[tokio::test]
async fn broken_camera_is_not_fatal() {
    let camera = FakeCamera::broken();
    let mut h = HarnessBuilder::new(ProfileKind::RoleBasedInterviewer)
        .camera(camera.clone())
        .spawn();

    let snapshot = h.handle.snapshot().await.unwrap();
    assert!(!snapshot.camera_active);
    h.handle.send_text("can we start?").await.unwrap();
    h.expect(|e| matches!(e, SessionEvent::SpeechStarted { .. }))
        .await;
    h.shutdown().await;
    assert_eq!(camera.released(), 0);
}

#[tokio::test]
async fn career_guide_never_touches_the_camera() {
    let camera = FakeCamera::working();
    let h = HarnessBuilder::new(ProfileKind::CareerGuide)
        .camera(camera.clone())
        .spawn();
    assert!(!h.handle.snapshot().await.unwrap().camera_active);
    h.shutdown().await;
    assert_eq!(camera.acquired(), 0);
}

#[tokio::test]
async fn handle_reports_closed_channel_after_shutdown() {
    let h = HarnessBuilder::new(ProfileKind::CareerGuide).spawn();
    let handle = h.handle.clone();
    h.shutdown().await;
    let err = handle.send_text("anyone?").await.unwrap_err();
    assert_eq!(err.code(), "CHANNEL_CLOSED");
}

#[tokio::test]
async fn notices_use_stable_kinds() {
    let mut h = HarnessBuilder::new(ProfileKind::CareerGuide).spawn();
    h.handle.start_voice().await.unwrap();
    let SessionEvent::Notice { kind, message } = h
        .expect(|e| matches!(e, SessionEvent::Notice { .. }))
        .await
    else {
        unreachable!()
    };
    assert_eq!(kind, NoticeKind::CaptureUnsupported);
    assert!(message.contains("type"));
    h.shutdown().await;
}
