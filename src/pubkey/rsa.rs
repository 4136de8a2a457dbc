use bytes::Bytes;
use rsa::{PublicKey as _, PublicKeyParts as _};
use sha1::digest;
use std::fmt;
use crate::codec::{PacketDecode, PacketEncode};
use crate::error::{Result, Error};
use super::{PubkeyAlgo, Pubkey, SignatureVerified};

/// "ssh-rsa" public key algorithm using SHA-1 from RFC 4253.
///
/// This algorithm is compatible with [`RsaPubkey`].
pub static SSH_RSA_SHA1: PubkeyAlgo = PubkeyAlgo {
    name: "ssh-rsa",
    verify: verify::<sha1::Sha1>,
};

/// "rsa-sha2-256" public key algorithm from RFC 8332.
///
/// This algorithm is compatible with [`RsaPubkey`].
pub static RSA_SHA2_256: PubkeyAlgo = PubkeyAlgo {
    name: "rsa-sha2-256",
    verify: verify::<sha2::Sha256>,
};

/// "rsa-sha2-512" public key algorithm from RFC 8332.
///
/// This algorithm is compatible with [`RsaPubkey`].
pub static RSA_SHA2_512: PubkeyAlgo = PubkeyAlgo {
    name: "rsa-sha2-512",
    verify: verify::<sha2::Sha512>,
};

/// RSA public key.
///
/// This key is compatible with [`SSH_RSA_SHA1`], [`RSA_SHA2_256`] and [`RSA_SHA2_512`]. You can
/// convert it to and from [`rsa::RsaPublicKey`] using `from()`/`into()`.
#[derive(Debug, Clone)]
pub struct RsaPubkey {
    pub(crate) pubkey: rsa::RsaPublicKey,
}

fn verify<H: RsaHash>(pubkey: &Pubkey, message: &[u8], signature_blob: Bytes) -> Result<SignatureVerified> {
    let Pubkey::Rsa(pubkey) = pubkey;

    let mut signature_blob = PacketDecode::new(signature_blob);
    if signature_blob.get_string()? != H::ALGO_NAME {
        return Err(Error::Decode("unexpected signature format"))
    }

    let signature = signature_blob.get_bytes()?;

    let mut hasher = H::new();
    hasher.update(message);
    let hashed = hasher.finalize();

    let padding = rsa::PaddingScheme::PKCS1v15Sign { hash: Some(H::HASH) };
    match pubkey.pubkey.verify(padding, hashed.as_slice(), &signature) {
        Ok(_) => Ok(SignatureVerified::assertion()),
        Err(_) => Err(Error::Signature),
    }
}

pub(super) fn encode(blob: &mut PacketEncode, pubkey: &RsaPubkey) -> Result<()> {
    blob.put_str("ssh-rsa")?;
    blob.put_biguint(pubkey.pubkey.e())?;
    blob.put_biguint(pubkey.pubkey.n())
}

pub(super) fn decode(blob: &mut PacketDecode) -> Result<RsaPubkey> {
    let e = blob.get_biguint()?;
    let n = blob.get_biguint()?;
    let pubkey = rsa::RsaPublicKey::new(n, e)
        .map_err(|_| Error::Decode("decoded ssh-rsa pubkey is invalid"))?;

    Ok(RsaPubkey { pubkey })
}

trait RsaHash: digest::Digest {
    const HASH: rsa::Hash;
    const ALGO_NAME: &'static str;
}

impl RsaHash for sha1::Sha1 {
    const HASH: rsa::Hash = rsa::Hash::SHA1;
    const ALGO_NAME: &'static str = "ssh-rsa";
}

impl RsaHash for sha2::Sha256 {
    const HASH: rsa::Hash = rsa::Hash::SHA2_256;
    const ALGO_NAME: &'static str = "rsa-sha2-256";
}

impl RsaHash for sha2::Sha512 {
    const HASH: rsa::Hash = rsa::Hash::SHA2_512;
    const ALGO_NAME: &'static str = "rsa-sha2-512";
}

impl From<rsa::RsaPublicKey> for RsaPubkey {
    fn from(pubkey: rsa::RsaPublicKey) -> Self { Self { pubkey } }
}

impl From<RsaPubkey> for rsa::RsaPublicKey {
    fn from(pubkey: RsaPubkey) -> Self { pubkey.pubkey }
}

impl fmt::Display for RsaPubkey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "rsa n {:x}, e {}", self.pubkey.n(), self.pubkey.e())
    }
}
