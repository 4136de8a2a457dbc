//! Client-side SSH transport layer (RFC 4253): the binary packet protocol and the
//! Diffie-Hellman key exchange that bootstraps its keys.
//!
//! The crate does not own the connection: the embedder connects the socket, exchanges the
//! version banners, then drives a [`Stream`] with [`key_exchange`] and carries its own packets
//! over the encrypted connection. User authentication and channels are out of scope.
pub use crate::codec::{PacketDecode, PacketEncode};
pub use crate::config::Config;
pub use crate::error::{AlgoNegotiateError, DisconnectError, Error, Result};
pub use crate::host::{HostKeyStore, HostKeyVerdict, HostKeyVerify, StoredHostKeys};
pub use crate::kex::{key_exchange, send_disconnect, KexParams};
pub use crate::stream::Stream;
pub use crate::util::{CryptoRngCore, Socket};

pub mod cipher;
pub mod codec;
pub mod config;
pub mod error;
pub mod host;
pub mod kex;
pub mod mac;
pub mod numbers;
pub mod pubkey;
pub mod stream;
mod util;
