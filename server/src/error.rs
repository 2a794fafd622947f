//! Error types for the server's fallible setup paths.

/// Errors that can occur while standing the server up. In-match and
/// in-session failures are reported as logged `&str`/`String` reasons
/// instead (see [`crate::session::ReadError`]) since nothing branches on
/// them programmatically.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind listener on {0}: {1}")]
    Bind(String, std::io::Error),
}
