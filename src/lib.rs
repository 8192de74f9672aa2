//! An authenticating SOCKS5 CONNECT proxy
//!
//! ## SOCKS5 Implementation
//!
//! - Features:
//!     - CONNECT
//!     - Username/Password Authentication (mandatory)
//!     - Async using tokio, one task per client connection
//!     - Configuration from a JSON file and environment variables
//! - [SOCKS5 (RFC 1928)](https://datatracker.ietf.org/doc/html/rfc1928)
//! - [Username/Password Authentication (RFC 1929)](https://datatracker.ietf.org/doc/html/rfc1929)
//!
//! # Example
//! ```no_run
//! use socksgate::{Socks5Server, UserPass};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let creds = UserPass {
//!         username: "proxyuser".to_string(),
//!         password: "proxypass".to_string(),
//!     };
//!     let mut server = Socks5Server::new("127.0.0.1:1080", creds);
//!     server.run().await
//! }
//! ```

pub mod address;
pub mod auth;
pub mod config;
pub mod error;
pub mod handshake;
pub mod protocol;
pub mod reader;
pub mod relay;
pub mod server;

// Re-export main types at crate root for convenience
pub use address::{AddressSpec, Target};
pub use auth::UserPass;
pub use config::ProxyConfig;
pub use error::{HandshakeError, ProtocolError, SessionError, StreamError};
pub use handshake::{HandshakeResult, negotiate};
pub use protocol::{AuthMethod, Command, ReplyCode, Version};
pub use reader::ExactReader;
pub use relay::RelaySession;
pub use server::Socks5Server;
