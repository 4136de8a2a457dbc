use rand::{CryptoRng, RngCore};
use std::io;

/// Blocking byte stream that carries the SSH connection, typically a TCP socket.
pub trait Socket: io::Read + io::Write {}
impl<T: io::Read + io::Write> Socket for T {}

// adapted from an unpublished version of `rand_core`
pub trait CryptoRngCore: CryptoRng + RngCore {
    fn as_rngcore(&mut self) -> &mut dyn RngCore;
}

impl<T: CryptoRng + RngCore> CryptoRngCore for T {
    fn as_rngcore(&mut self) -> &mut dyn RngCore {
        self
    }
}
