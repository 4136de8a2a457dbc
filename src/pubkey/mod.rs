//! Public key algorithms for authenticating the server.
//!
//! During the key exchange, the server proves its identity by signing the exchange hash with its
//! host key. The signature algorithm is negotiated from the lists that the two sides exchange in
//! `SSH_MSG_KEXINIT`.
//!
//! # Supported algorithms
//!
//! - "rsa-sha2-512" ([`RSA_SHA2_512`])
//! - "rsa-sha2-256" ([`RSA_SHA2_256`])
//! - "ssh-rsa" ([`SSH_RSA_SHA1`])
use bytes::Bytes;
use derivative::Derivative;
use std::fmt;
use crate::codec::{PacketDecode, PacketEncode};
use crate::error::{Result, Error};
pub use self::rsa::{SSH_RSA_SHA1, RSA_SHA2_256, RSA_SHA2_512, RsaPubkey};

mod rsa;

/// Algorithm for verifying the server host key signature.
///
/// See the [module documentation][self] for details.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct PubkeyAlgo {
    /// Name of the algorithm.
    pub name: &'static str,
    #[derivative(Debug = "ignore")]
    pub(crate) verify: fn(pubkey: &Pubkey, message: &[u8], signature: Bytes) -> Result<SignatureVerified>,
}

/// Public key in one of the supported formats.
///
/// This enum is marked as `#[non_exhaustive]`, so we might add new variants without breaking
/// backwards compatibility.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Pubkey {
    /// RSA public key.
    Rsa(RsaPubkey),
}

impl Pubkey {
    /// Decode a public key from the SSH wire encoding.
    pub fn decode(blob: Bytes) -> Result<Self> {
        let mut blob = PacketDecode::new(blob);
        let format = blob.get_string()?;
        match format.as_str() {
            "ssh-rsa" => rsa::decode(&mut blob).map(Pubkey::Rsa),
            _ => {
                log::debug!("unknown pubkey format {:?}", format);
                Err(Error::Decode("unknown public key format"))
            },
        }
    }

    /// Encode the public key into the SSH wire encoding.
    pub fn encode(&self) -> Result<Bytes> {
        let mut blob = PacketEncode::new();
        match self {
            Pubkey::Rsa(pubkey) => rsa::encode(&mut blob, pubkey)?,
        }
        Ok(blob.finish())
    }

    /// The key format identifier (such as `"ssh-rsa"`).
    pub fn type_str(&self) -> &'static str {
        match self {
            Pubkey::Rsa(_) => "ssh-rsa",
        }
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Pubkey::Rsa(pubkey) => fmt::Display::fmt(pubkey, f),
        }
    }
}

/// Witness that the signature of a message has been verified.
#[derive(Debug)]
pub(crate) struct SignatureVerified(());

impl SignatureVerified {
    fn assertion() -> Self { Self(()) }
}
