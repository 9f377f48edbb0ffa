use anyhow::{bail, Result};
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tracing::{error, info, warn};

use crate::capture::camera::Camera;
use crate::core::error::Rejection;
use crate::pipeline::verifier::VerificationPipeline;
use crate::stores::kv_store::KvStore;

/// Consecutive read failures tolerated before the transport is considered gone
const MAX_CONSECUTIVE_READ_ERRORS: u32 = 16;

/// Longest line buffered; a valid message is 65 bytes plus the terminator
pub const MAX_LINE_LEN: usize = 256;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub messages: u64,
    pub accepted: u64,
}

/// Feed newline-delimited messages to the pipeline, strictly one at a time
///
/// Returns when the transport reaches end of stream or `shutdown` completes
/// while waiting for the next line. A message already being verified always
/// runs to completion.
pub async fn run_session<R, S, C, F>(
    mut reader: R,
    pipeline: &mut VerificationPipeline<S, C>,
    shutdown: F,
) -> Result<SessionSummary>
where
    R: AsyncBufRead + Unpin,
    S: KvStore,
    C: Camera,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let mut summary = SessionSummary::default();
    let mut buf = Vec::with_capacity(128);
    let mut read_errors = 0u32;
    // Inside an overlong line, dropping bytes up to the next newline
    let mut discarding = false;

    loop {
        buf.clear();
        let mut limited = (&mut reader).take(MAX_LINE_LEN as u64);

        let read = tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, leaving session loop");
                break;
            }
            read = limited.read_until(b'\n', &mut buf) => read,
        };

        match read {
            Ok(0) => {
                info!("Transport reached end of stream");
                break;
            }
            Ok(_) => {
                read_errors = 0;
                let terminated = buf.last() == Some(&b'\n');

                if discarding {
                    discarding = !terminated;
                    continue;
                }

                if !terminated && buf.len() >= MAX_LINE_LEN {
                    warn!(limit = MAX_LINE_LEN, "Message exceeds line limit, discarding");
                    discarding = true;
                    summary.messages += 1;
                    pipeline.reject(Rejection::MalformedMessage);
                    continue;
                }

                // Invalid UTF-8 cannot be valid hex; let the parser reject it
                let line = String::from_utf8_lossy(&buf);
                if line.trim().is_empty() {
                    continue;
                }

                summary.messages += 1;
                if pipeline.handle_line(&line).is_accepted() {
                    summary.accepted += 1;
                }
            }
            Err(e) => {
                read_errors += 1;
                error!(error = %e, consecutive = read_errors, "Failed to read message");
                if read_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                    bail!("Transport failed {} times in a row: {}", read_errors, e);
                }
            }
        }
    }

    Ok(summary)
}
