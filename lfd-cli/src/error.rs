use thiserror::Error;

/// Fatal setup-time errors, matching the teacher's flat `ProxyError` shape
/// (`huginn-proxy-lib/src/error.rs`) split across the two ambient concerns
/// `spec.md` §7 names: config and trace ingestion.
#[derive(Error, Debug)]
pub enum LfdError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("trace error: {0}")]
    Trace(#[from] TraceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("capacity exceeded: {0}")]
    Capacity(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(std::io::Error),

    #[error("failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("failed to read trace file {path}: {source}")]
    Read { path: String, source: std::io::Error },

    #[error("timestamp sidecar file has {have} entries, need at least {need}")]
    SidecarTooShort { have: usize, need: usize },

    #[error("malformed pcap global header")]
    MalformedPcapHeader,

    #[error("malformed pcap record header at offset {offset}")]
    MalformedPcapRecord { offset: usize },

    #[error("malformed text trace line {line}: {reason}")]
    MalformedTextLine { line: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, LfdError>;
