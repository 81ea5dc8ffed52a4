//! Result and Error types for the crate.
use thiserror::Error;

/// Result containing an error variant from this module.
pub type Result<T> = std::result::Result<T, Error>;

/// Networking error variants.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error, this wraps a [`std::io::Error`].
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A route datagram exceeded the `[N: uint8][N bytes]` length it
    /// declared, or declared more bytes than the datagram actually held.
    #[error("route datagram length mismatch: header said {declared}, got {actual}")]
    RouteDatagramLength { declared: usize, actual: usize },
}
