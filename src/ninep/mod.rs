//! Minimal 9P2000 client.
//!
//! wmii exports its entire control surface as a 9P file server reached over
//! a Unix socket, so this module implements just enough of the protocol to
//! read, write, and create files in that namespace: version negotiation,
//! attach, walk, open, create, read, write, and clunk.  Requests are issued
//! strictly one at a time over a single connection; there is no tag
//! multiplexing.
//!
//! [`proto`] holds the wire format, [`client`] the blocking RPC layer.
//! Nothing outside this module should touch 9P framing directly: the rest
//! of the crate goes through [`client::Fsys`].

pub mod client;
pub mod proto;

#[cfg(test)]
pub(crate) mod testserver;

/// Errors produced by the 9P layer.
#[derive(Debug, thiserror::Error)]
pub enum NinepError {
    /// The underlying socket failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The server answered a request with `Rerror`.
    #[error("{0}")]
    Server(String),

    /// The server offered a protocol version we do not speak.
    #[error("unsupported protocol version {0:?}")]
    Version(String),

    /// A frame could not be decoded.
    #[error("malformed 9p message: {0}")]
    Malformed(&'static str),

    /// The server replied with the wrong message type.
    #[error("unexpected 9p reply: want {want}, got {got}")]
    Unexpected {
        want: &'static str,
        got: &'static str,
    },

    /// A walk stopped before reaching the requested file.
    #[error("file not found: {0}")]
    NotFound(String),

    /// The server accepted fewer bytes than were sent.
    #[error("short write")]
    ShortWrite,
}
