//! Encryption and decryption algorithms.
//!
//! The SSH protocol encrypts packets with a symmetric cipher negotiated during the key exchange.
//! The client and the server exchange lists of supported algorithms, and the first algorithm on
//! the client's list that is also supported by the server is used for the connection. Each
//! direction of the connection uses its own cipher instance and keys.
//!
//! # Supported algorithms
//!
//! - "aes128-ctr" ([`AES128_CTR`])
//! - "aes128-cbc" ([`AES128_CBC`])
//! - "none" ([`NONE`])
use derivative::Derivative;
pub use self::block::AES128_CBC;
pub use self::none::NONE;
pub use self::stream::AES128_CTR;
pub(crate) use self::none::Identity;

mod block;
mod none;
mod stream;

/// Algorithm for encrypting and decrypting packets.
///
/// See the [module documentation][self] for details.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct CipherAlgo {
    /// Name of the algorithm.
    pub name: &'static str,
    /// Length of the cipher block in bytes.
    pub block_len: usize,
    /// Length of the cipher key in bytes.
    pub key_len: usize,
    /// Length of the initialization vector in bytes.
    pub iv_len: usize,
    #[derivative(Debug = "ignore")]
    pub(crate) make_encrypt: fn(key: &[u8], iv: &[u8]) -> Box<dyn Encrypt + Send>,
    #[derivative(Debug = "ignore")]
    pub(crate) make_decrypt: fn(key: &[u8], iv: &[u8]) -> Box<dyn Decrypt + Send>,
}

pub(crate) trait Encrypt {
    fn encrypt(&mut self, data: &mut [u8]);
}

pub(crate) trait Decrypt {
    fn decrypt(&mut self, data: &mut [u8]);
}
