//! Headless host bridge binary for stdin/stdout JSON communication.
//!
//! A UI shell owns the screen and the platform speech recognizer. It sends
//! `CommandEnvelope` lines on stdin (forwarding recognition results through
//! `capture.feed`) and reads `ResponseEnvelope` and `EventEnvelope` lines
//! from stdout.
//!
//! All tracing/diagnostic output goes to stderr so that stdout remains a
//! clean JSON protocol channel.
//!
//! Usage: `guidevoice-host [career_guide|query_handler|role_based_interviewer]`

use guidevoice::capture::ChannelRecognizer;
use guidevoice::config::AssistantConfig;
use guidevoice::host::{HostRouter, run_stdio_bridge};
use guidevoice::session::{AssistantProfile, ProfileKind, SessionController, SessionParts};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise tracing to stderr only (stdout is reserved for the JSON
    // protocol).
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("guidevoice=info")),
        )
        .init();

    let config = load_config(std::env::args().nth(1).as_deref())?;
    tracing::info!(
        profile = %config.profile.title,
        endpoint = %config.backend.endpoint,
        "guidevoice-host starting"
    );

    let (recognizer, feed) = ChannelRecognizer::new();
    let parts = SessionParts::from_config(config, Arc::new(recognizer))?;
    let (handle, controller) = SessionController::spawn(parts);

    run_stdio_bridge(HostRouter::new(handle, Some(feed)))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "guidevoice-host exited with error");
            anyhow::anyhow!("guidevoice-host failed: {e}")
        })?;

    if let Err(e) = controller.await {
        tracing::warn!(error = %e, "session controller task ended abnormally");
    }

    tracing::info!("guidevoice-host shut down cleanly");
    Ok(())
}

/// Load the config file when present, else the preset for the named profile
/// (career guide by default). A profile named on the command line replaces
/// the file's profile section.
fn load_config(profile_arg: Option<&str>) -> anyhow::Result<AssistantConfig> {
    let requested = profile_arg.map(parse_profile).transpose()?;

    let path = AssistantConfig::default_config_path();
    if !path.exists() {
        return Ok(AssistantConfig::for_profile(
            requested.unwrap_or(ProfileKind::CareerGuide),
        ));
    }

    tracing::info!(path = %path.display(), "loading config");
    let config = AssistantConfig::from_file(&path)
        .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", path.display()))?;
    Ok(apply_profile_override(config, requested))
}

fn parse_profile(raw: &str) -> anyhow::Result<ProfileKind> {
    ProfileKind::parse(raw).ok_or_else(|| anyhow::anyhow!("unknown profile {raw:?}"))
}

fn apply_profile_override(
    mut config: AssistantConfig,
    requested: Option<ProfileKind>,
) -> AssistantConfig {
    if let Some(kind) = requested {
        if kind != config.profile.kind {
            tracing::info!(
                file = ?config.profile.kind,
                requested = ?kind,
                "command-line profile overrides config file"
            );
            config.profile = AssistantProfile::preset(kind);
        }
    }
    config
}
