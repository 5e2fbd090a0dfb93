//! Newline-delimited JSON bridge for the host command channel.
//!
//! Reads `CommandEnvelope` lines, dispatches them through a [`HostRouter`],
//! and writes `ResponseEnvelope` and `EventEnvelope` lines back.
//!
//! Stdout is exclusively reserved for the JSON protocol; all diagnostic
//! output (tracing, logs) must be routed to stderr.

use crate::error::{Result, SessionError};
use crate::host::contract::{CommandEnvelope, CommandName, EventEnvelope, ResponseEnvelope};
use crate::host::router::HostRouter;
use crate::session::SessionEvent;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

/// Run the bridge over the process's stdin and stdout until stdin closes
/// or a `runtime.stop` command is handled.
pub async fn run_stdio_bridge(router: HostRouter) -> Result<()> {
    run_bridge(
        router,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

/// Run the bridge over any line reader and writer.
///
/// Session events are forwarded by a background task that shares the
/// writer, so responses and events never interleave within a line. The
/// session is shut down when the input ends.
pub async fn run_bridge<R, W>(router: HostRouter, reader: R, writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer = Arc::new(Mutex::new(writer));

    let event_rx = router.session().subscribe();
    let forwarder_done = CancellationToken::new();
    let event_handle = tokio::spawn(forward_events(
        event_rx,
        Arc::clone(&writer),
        forwarder_done.clone(),
    ));

    let reader_result = run_reader(&router, reader, Arc::clone(&writer)).await;

    // Idempotent after runtime.stop; on EOF this is what stops the engine.
    if let Err(e) = router.session().shutdown().await {
        tracing::debug!(error = %e, "session already stopped");
    }

    // Teardown events are already queued; the forwarder writes them out
    // before it returns.
    forwarder_done.cancel();
    let _ = event_handle.await;

    reader_result
}

async fn forward_events<W>(
    mut event_rx: broadcast::Receiver<SessionEvent>,
    writer: Arc<Mutex<W>>,
    done: CancellationToken,
) where
    W: AsyncWrite + Unpin + Send,
{
    let mut seq: u64 = 0;
    loop {
        let received = tokio::select! {
            biased;
            received = event_rx.recv() => received,
            () = done.cancelled() => break,
        };
        match received {
            Ok(event) => {
                if !forward_one(&writer, &mut seq, &event).await {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(lagged = n, "event forwarder lagged; some events were dropped");
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::info!("session event channel closed; stopping event forwarder");
                return;
            }
        }
    }

    while let Ok(event) = event_rx.try_recv() {
        if !forward_one(&writer, &mut seq, &event).await {
            return;
        }
    }
}

/// Returns false once the output is unusable.
async fn forward_one<W>(writer: &Mutex<W>, seq: &mut u64, event: &SessionEvent) -> bool
where
    W: AsyncWrite + Unpin + Send,
{
    *seq += 1;
    let json = match EventEnvelope::from_session_event(*seq, event)
        .and_then(|env| serde_json::to_string(&env))
    {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize event envelope; skipping");
            return true;
        }
    };
    let mut w = writer.lock().await;
    if let Err(e) = write_line(&mut *w, &json).await {
        tracing::warn!(error = %e, "failed to write event envelope; stopping event forwarder");
        return false;
    }
    true
}

/// Read line-by-line, dispatch each command, and write responses.
async fn run_reader<R, W>(router: &HostRouter, mut reader: R, writer: Arc<Mutex<W>>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send,
{
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| SessionError::Channel(format!("failed to read command line: {e}")))?;

        if bytes_read == 0 {
            tracing::info!("input closed (EOF); shutting down host bridge");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let envelope: CommandEnvelope = match serde_json::from_str(trimmed) {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(error = %e, raw_line = %trimmed, "failed to parse command envelope");
                let error_response = ResponseEnvelope::error(
                    "parse-error",
                    format!("failed to parse command envelope: {e}"),
                );
                send_response(&writer, &error_response).await?;
                continue;
            }
        };

        let is_stop = envelope.command == CommandName::RuntimeStop;
        let response = router.dispatch(&envelope).await;
        send_response(&writer, &response).await?;

        if is_stop && response.ok {
            tracing::info!("runtime.stop received; shutting down host bridge");
            break;
        }
    }

    Ok(())
}

async fn send_response<W>(writer: &Mutex<W>, response: &ResponseEnvelope) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let json = serde_json::to_string(response)
        .map_err(|e| SessionError::Channel(format!("failed to serialize response envelope: {e}")))?;
    let mut w = writer.lock().await;
    write_line(&mut *w, &json).await
}

/// Write a single JSON line and flush.
async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, json: &str) -> Result<()> {
    writer
        .write_all(json.as_bytes())
        .await
        .map_err(|e| SessionError::Channel(format!("failed to write output: {e}")))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| SessionError::Channel(format!("failed to write newline: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| SessionError::Channel(format!("failed to flush output: {e}")))?;
    Ok(())
}
