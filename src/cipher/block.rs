use cipher::{BlockDecryptMut as _, BlockEncryptMut as _, InnerIvInit as _, KeyInit as _};
use cipher::inout::InOutBuf;
use super::{CipherAlgo, Encrypt, Decrypt};

/// "aes128-cbc" cipher from RFC 4253.
pub static AES128_CBC: CipherAlgo = CipherAlgo {
    name: "aes128-cbc",
    block_len: 16,
    key_len: 16,
    iv_len: 16,
    make_encrypt: |key, iv| Box::new(Aes128CbcEnc::new(key, iv)),
    make_decrypt: |key, iv| Box::new(Aes128CbcDec::new(key, iv)),
};

struct Aes128CbcEnc {
    encrypt: cbc::Encryptor<aes::Aes128>,
}

struct Aes128CbcDec {
    decrypt: cbc::Decryptor<aes::Aes128>,
}

impl Aes128CbcEnc {
    fn new(key: &[u8], iv: &[u8]) -> Aes128CbcEnc {
        let cipher = aes::Aes128::new_from_slice(key).expect("invalid key length for aes128-cbc");
        let encrypt = cbc::Encryptor::inner_iv_slice_init(cipher, iv).expect("invalid iv length for cbc");
        Aes128CbcEnc { encrypt }
    }
}

impl Aes128CbcDec {
    fn new(key: &[u8], iv: &[u8]) -> Aes128CbcDec {
        let cipher = aes::Aes128::new_from_slice(key).expect("invalid key length for aes128-cbc");
        let decrypt = cbc::Decryptor::inner_iv_slice_init(cipher, iv).expect("invalid iv length for cbc");
        Aes128CbcDec { decrypt }
    }
}

impl Encrypt for Aes128CbcEnc {
    fn encrypt(&mut self, data: &mut [u8]) {
        let (blocks, tail) = InOutBuf::from(data).into_chunks();
        debug_assert!(tail.is_empty(), "plaintext is not aligned to block");
        self.encrypt.encrypt_blocks_inout_mut(blocks)
    }
}

impl Decrypt for Aes128CbcDec {
    fn decrypt(&mut self, data: &mut [u8]) {
        let (blocks, tail) = InOutBuf::from(data).into_chunks();
        debug_assert!(tail.is_empty(), "ciphertext is not aligned to block");
        self.decrypt.decrypt_blocks_inout_mut(blocks)
    }
}
