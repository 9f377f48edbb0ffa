// Centralized error handling for the gate

use thiserror::Error;

/// Errors produced while encoding or decoding fixed-width values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Malformed record: expected {expected} bytes, got {actual}")]
    MalformedRecord { expected: usize, actual: usize },

    #[error("Invalid binary format: {0}")]
    InvalidBinaryFormat(String),

    #[error("Binary code too long: {bytes} bytes > {max} bytes")]
    CodeTooLong { bytes: usize, max: usize },

    #[error("Binary code length mismatch: expected {expected} bytes, got {actual}")]
    CodeLengthMismatch { expected: usize, actual: usize },

    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("Field too long: {actual} bytes > {max} bytes")]
    FieldTooLong { actual: usize, max: usize },
}

/// Errors from the durable key-value store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to write to log: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("User not found")]
    UserNotFound,

    #[error("Stored record is corrupt: {0}")]
    Malformed(#[source] CodecError),

    #[error("Storage failure: {0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Failed to load image '{path}': {reason}")]
    ImageLoad { path: String, reason: String },

    #[error("Region of interest {x},{y} {width}x{height} exceeds image {image_width}x{image_height}")]
    RoiOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error("Grid {rows}x{cols} is too fine for a {width}x{height} region")]
    GridTooFine {
        rows: u32,
        cols: u32,
        width: u32,
        height: u32,
    },

    #[error("Failed to save annotated image '{path}': {reason}")]
    AnnotationSave { path: String, reason: String },
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture command failed to start: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Capture command exited with {0}")]
    ExitStatus(std::process::ExitStatus),

    #[error("Captured image missing at '{0}'")]
    Missing(String),

    #[error("Captured image is empty at '{0}'")]
    Empty(String),

    #[error("Failed to discard previous frame at '{path}': {source}")]
    Discard {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why a single verification was rejected
///
/// Every variant is recoverable: the session loop logs it and moves on to the
/// next message.
#[derive(Error, Debug)]
pub enum Rejection {
    #[error("Malformed message")]
    MalformedMessage,

    #[error("Invalid message field: {0}")]
    InvalidField(#[source] CodecError),

    /// Covers both the keyed-hash self check and the registry hash check
    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("User not found")]
    UserNotFound,

    #[error("Stored record is corrupt: {0}")]
    CorruptRecord(String),

    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(#[source] CaptureError),

    #[error("Failed to extract binary from captured image: {0}")]
    Vision(#[source] VisionError),

    #[error("Invalid extracted binary: {0}")]
    InvalidBinary(#[source] CodecError),

    #[error("Binary length mismatch: expected {expected} bytes, got {actual}")]
    CodeLengthMismatch { expected: usize, actual: usize },

    #[error("Binary values did not match")]
    CodeMismatch,
}

impl Rejection {
    /// Stable short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::MalformedMessage => "malformed_message",
            Rejection::InvalidField(_) => "invalid_field",
            Rejection::AuthenticationFailed => "authentication_failed",
            Rejection::UserNotFound => "user_not_found",
            Rejection::CorruptRecord(_) => "corrupt_record",
            Rejection::RegistryUnavailable(_) => "registry_unavailable",
            Rejection::CaptureFailed(_) => "capture_failed",
            Rejection::Vision(_) => "vision_failed",
            Rejection::InvalidBinary(_) => "invalid_binary",
            Rejection::CodeLengthMismatch { .. } => "code_length_mismatch",
            Rejection::CodeMismatch => "code_mismatch",
        }
    }
}

impl From<RegistryError> for Rejection {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UserNotFound => Rejection::UserNotFound,
            RegistryError::Malformed(e) => Rejection::CorruptRecord(e.to_string()),
            RegistryError::Store(e) => Rejection::RegistryUnavailable(e.to_string()),
        }
    }
}
