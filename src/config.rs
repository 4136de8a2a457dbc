use crate::cipher::{self, CipherAlgo};
use crate::kex::{self, KexAlgo};
use crate::mac::{self, MacAlgo};
use crate::pubkey::{self, PubkeyAlgo};

/// Algorithm preferences and limits for a connection.
///
/// The algorithm lists are ordered by preference: during negotiation, the first entry that the
/// server also supports wins. The same cipher and MAC preferences apply to both directions of
/// the connection.
#[derive(Debug, Clone)]
pub struct Config {
    /// Key exchange methods, most preferred first.
    pub kex_algos: Vec<&'static KexAlgo>,
    /// Server host key algorithms, most preferred first.
    pub server_pubkey_algos: Vec<&'static PubkeyAlgo>,
    /// Ciphers, most preferred first.
    pub cipher_algos: Vec<&'static CipherAlgo>,
    /// MACs, most preferred first.
    pub mac_algos: Vec<&'static MacAlgo>,
    /// Upper bound for `packet_length` in both directions.
    ///
    /// Defaults to 65536 and must not exceed
    /// [`MAX_PACKET_LEN_LIMIT`][crate::stream::MAX_PACKET_LEN_LIMIT].
    pub max_packet_len: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            kex_algos: vec![
                &kex::DIFFIE_HELLMAN_GROUP14_SHA1,
                &kex::DIFFIE_HELLMAN_GROUP1_SHA1,
            ],
            server_pubkey_algos: vec![
                &pubkey::RSA_SHA2_512,
                &pubkey::RSA_SHA2_256,
                &pubkey::SSH_RSA_SHA1,
            ],
            cipher_algos: vec![
                &cipher::AES128_CTR,
                &cipher::AES128_CBC,
            ],
            mac_algos: vec![
                &mac::HMAC_SHA2_256,
                &mac::HMAC_SHA2_512,
            ],
            max_packet_len: 65536,
        }
    }
}

impl Config {
    /// Mutates the configuration in a builder-like style.
    pub fn with<F: FnOnce(&mut Self)>(mut self, f: F) -> Self {
        f(&mut self);
        self
    }
}
