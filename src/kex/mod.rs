//! Key exchange methods.
//!
//! The key exchange produces a shared secret and an exchange hash that authenticates the server
//! and seeds the keys of the packet layer. The method is negotiated during `SSH_MSG_KEXINIT`,
//! and the whole procedure is repeated on every rekey.
//!
//! # Supported algorithms
//!
//! - "diffie-hellman-group14-sha1" ([`DIFFIE_HELLMAN_GROUP14_SHA1`])
//! - "diffie-hellman-group1-sha1" ([`DIFFIE_HELLMAN_GROUP1_SHA1`])
use bytes::Bytes;
use derivative::Derivative;
use crate::error::Result;
use crate::stream::Stream;
use crate::util::{CryptoRngCore, Socket};
pub use self::dh::{DIFFIE_HELLMAN_GROUP14_SHA1, DIFFIE_HELLMAN_GROUP1_SHA1};
pub use self::negotiate::{key_exchange, send_disconnect, KexParams};

mod dh;
mod negotiate;

/// Algorithm for key exchange.
///
/// See the [module documentation][self] for details.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct KexAlgo {
    /// Name of the algorithm.
    pub name: &'static str,
    #[derivative(Debug = "ignore")]
    pub(crate) exchange:
        fn(&mut Stream, &mut dyn Socket, &mut dyn CryptoRngCore, KexInput<'_>) -> Result<KexOutput>,
    #[derivative(Debug = "ignore")]
    pub(crate) compute_hash: fn(&[u8]) -> Vec<u8>,
}

/// Connection-level inputs to the exchange hash.
#[derive(Debug)]
pub(crate) struct KexInput<'a> {
    pub client_ident: &'a [u8],
    pub server_ident: &'a [u8],
    pub client_kex_init: &'a [u8],
    pub server_kex_init: &'a [u8],
}

/// What a completed key exchange hands back to the caller.
///
/// The caller verifies the signature over `exchange_hash`, checks the server identity and
/// installs the derived keys on the stream; the key exchange itself never touches stream keys.
pub(crate) struct KexOutput {
    pub shared_secret_be: Vec<u8>,
    pub exchange_hash: Vec<u8>,
    pub server_pubkey: Bytes,
    pub server_exchange_hash_sign: Bytes,
}
