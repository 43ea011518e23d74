use alloc::string::String;

/// Errors from the crate's fallible edges: the OS mapping query and the
/// report writer.
///
/// The scanner core itself has no error channel; its preconditions are
/// programming errors and assert, and untagged capabilities are simply
/// skipped.
#[derive(Debug, onlyerror::Error)]
pub enum Error {
    /// The OS virtual-memory query failed.
    #[error("virtual memory query failed: {0}")]
    VmQuery(#[from] std::io::Error),
    /// An OS mapping entry could not be parsed.
    #[error("malformed vm map entry: {0}")]
    VmParse(String),
    /// Report serialization failed.
    #[error("report serialization failed: {0}")]
    Report(#[from] serde_json::Error),
}
