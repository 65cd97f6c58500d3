use std::collections::TryReserveError;
use std::io;

/// Non-OK outcomes of the demuxer's read and link-skip operations.
#[derive(thiserror::Error, Debug)]
pub enum DemuxError {
    #[error("Lost synchronisation with the Ogg page stream")]
    LostSync,

    #[error("Logical stream does not carry the Ogg FLAC mapping")]
    NotFlac,

    #[error("Unsupported Ogg FLAC mapping version {major}.{minor}")]
    UnsupportedMappingVersion { major: u8, minor: u8 },

    #[error("Read aborted by host")]
    Aborted,

    #[error("Host I/O failed: {0}")]
    HostFailure(#[source] HostError),

    #[error("No link boundary fits between byte {left} and byte {right}")]
    BisectionExhausted { left: u64, right: u64 },

    #[error("Page with unknown serial number {0:#010X} reached while reading forward")]
    UnknownSerialNumber(u32),

    #[error("End of stream reached before the end of the current link")]
    UnexpectedEndOfStream,

    #[error("Memory allocation failed")]
    MemoryAllocation,

    #[error("Host does not provide seek, tell and length")]
    CallbacksNonfunctional,

    #[error("Sync buffer error: {0}")]
    Sync(#[from] SyncError),
}

impl From<TryReserveError> for DemuxError {
    fn from(_: TryReserveError) -> Self {
        DemuxError::MemoryAllocation
    }
}

impl From<HostError> for DemuxError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::Unsupported => DemuxError::CallbacksNonfunctional,
            HostError::Aborted => DemuxError::Aborted,
            err => DemuxError::HostFailure(err),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("Host wrote {written} bytes into a {available} byte sync buffer window")]
    Overrun { written: usize, available: usize },

    #[error("Sync buffer could not grow by {0} bytes")]
    Allocation(usize),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum StreamError {
    #[error("Page serial number {found:#010X} does not match stream {expected:#010X}")]
    SerialMismatch { found: u32, expected: u32 },

    #[error("Unsupported Ogg page version {0}")]
    UnsupportedVersion(u8),
}

#[derive(thiserror::Error, Debug)]
pub enum HostError {
    #[error("Operation not supported by host")]
    Unsupported,

    #[error("Aborted by host")]
    Aborted,

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum StreamInfoError {
    #[error("Missing fLaC signature, read {0:02X?}")]
    InvalidSignature([u8; 4]),

    #[error("First metadata block must be STREAMINFO, got type {0}")]
    NotStreamInfo(u8),

    #[error("STREAMINFO block length must be 34, got {0}")]
    InvalidLength(u32),

    #[error("Sample rate must not be 0")]
    InvalidSampleRate,
}
