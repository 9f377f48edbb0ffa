use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::capture::camera::{discard_frame, Camera};
use crate::core::error::Rejection;
use crate::metrics::collector::Metrics;
use crate::models::message::IncomingMessage;
use crate::models::user::{UserRecord, ID_LEN};
use crate::pipeline::binary_stage::check_code;
use crate::pipeline::hash_stage::verify_user;
use crate::security::keyed_hash::KeyedHashVerifier;
use crate::stores::kv_store::KvStore;
use crate::stores::user_registry::UserRegistry;
use crate::utils::hex::bytes_to_hex;
use crate::vision::extractor::BinaryExtractor;

/// Where a verification currently is; logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    ParsingMessage,
    HashStage,
    AwaitCapture,
    VisionStage,
    Accepted,
    Rejected,
}

#[derive(Debug)]
pub enum Verdict {
    Accepted { id: [u8; ID_LEN] },
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted { .. })
    }
}

/// Two-factor decision for one message at a time
///
/// Owns the registry handle, the shared secret and the camera for the life
/// of the process. Nothing carries over from one message to the next.
pub struct VerificationPipeline<S, C> {
    registry: UserRegistry<S>,
    verifier: KeyedHashVerifier,
    extractor: BinaryExtractor,
    camera: C,
    capture_path: PathBuf,
    metrics: Metrics,
    stage: Stage,
}

impl<S: KvStore, C: Camera> VerificationPipeline<S, C> {
    pub fn new(
        registry: UserRegistry<S>,
        verifier: KeyedHashVerifier,
        extractor: BinaryExtractor,
        camera: C,
        capture_path: PathBuf,
    ) -> Self {
        Self {
            registry,
            verifier,
            extractor,
            camera,
            capture_path,
            metrics: Metrics::new(),
            stage: Stage::Idle,
        }
    }

    pub fn registry(&self) -> &UserRegistry<S> {
        &self.registry
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Run one received line through both stages
    #[instrument(skip(self, line))]
    pub fn handle_line(&mut self, line: &str) -> Verdict {
        match self.run(line) {
            Ok(user) => {
                self.enter(Stage::Accepted);
                info!(wid = %bytes_to_hex(&user.id), "Valid user");
                self.metrics.record_accepted();
                self.enter(Stage::Idle);
                Verdict::Accepted { id: user.id }
            }
            Err(rejection) => self.reject(rejection),
        }
    }

    /// Record a rejection decided before or during a run
    pub fn reject(&mut self, rejection: Rejection) -> Verdict {
        self.enter(Stage::Rejected);
        match &rejection {
            Rejection::CorruptRecord(_) | Rejection::RegistryUnavailable(_) => {
                error!(reason = rejection.kind(), error = %rejection, "Invalid user")
            }
            _ => warn!(reason = rejection.kind(), error = %rejection, "Invalid user"),
        }
        self.metrics.record_rejected(rejection.kind());
        self.enter(Stage::Idle);
        Verdict::Rejected(rejection)
    }

    fn run(&mut self, line: &str) -> Result<UserRecord, Rejection> {
        self.enter(Stage::ParsingMessage);
        let message = IncomingMessage::parse(line).ok_or(Rejection::MalformedMessage)?;
        debug!(wid = %message.hex_id, hash = %message.hex_hash, "Message received");

        self.enter(Stage::HashStage);
        let hash_start = Instant::now();
        let user = verify_user(&self.verifier, &self.registry, &message)?;
        debug!(elapsed_us = hash_start.elapsed().as_micros() as u64, "Hash stage passed");

        self.enter(Stage::AwaitCapture);
        let image_start = Instant::now();
        discard_frame(&self.capture_path).map_err(Rejection::CaptureFailed)?;
        self.camera
            .capture(&self.capture_path)
            .map_err(Rejection::CaptureFailed)?;

        self.enter(Stage::VisionStage);
        let extraction = self
            .extractor
            .extract(&self.capture_path)
            .map_err(Rejection::Vision)?;
        debug!(binary = %extraction.bits, "Binary extracted");

        check_code(&user.code, &extraction.bits)?;
        debug!(
            elapsed_ms = image_start.elapsed().as_millis() as u64,
            "Image stage passed"
        );

        Ok(user)
    }

    fn enter(&mut self, next: Stage) {
        debug!(from = ?self.stage, to = ?next, "Stage transition");
        self.stage = next;
    }
}
