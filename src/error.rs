use std::fmt;
use crate::numbers::disconnect;

pub type Result<T> = std::result::Result<T, Error>;

/// Error while working with the SSH transport.
///
/// Every error is fatal to the connection: once an operation on a
/// [`Stream`][crate::Stream] fails, the stream is left in an undefined state and must not be used
/// again.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("cryptography error: {0}")]
    Crypto(&'static str),
    #[error("randomness error: {0}")]
    Random(&'static str),
    #[error("mac verification failed")]
    Mac,
    #[error("signature verification failed")]
    Signature,
    #[error("server host key was rejected")]
    HostKeyUntrusted,
    #[error("protocol error: {0}")]
    Protocol(&'static str),
    #[error("could not decode bytes: {0}")]
    Decode(&'static str),
    #[error("could not encode: {0}")]
    Encode(&'static str),
    #[error("invalid packet length {0}")]
    PacketLength(u32),
    #[error("bad packet padding: {0}")]
    Padding(&'static str),
    #[error("unexpected packet {0}")]
    UnexpectedPacket(u8),
    #[error("could not negotiate algorithm: {0}")]
    AlgoNegotiate(AlgoNegotiateError),
    #[error("invalid configuration: {0}")]
    Config(&'static str),
    #[error("IO error when reading")]
    ReadIo(#[source] std::io::Error),
    #[error("IO error when writing")]
    WriteIo(#[source] std::io::Error),
    #[error("connection unexpectedly closed by peer")]
    PeerClosed,
    #[error("peer disconnected: {0}")]
    PeerDisconnected(DisconnectError),
}

/// No algorithm was agreed upon during negotiation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("for {algo_name:}, our algos are {our_algos:?}, their algos are {their_algos:?}")]
pub struct AlgoNegotiateError {
    pub algo_name: String,
    pub our_algos: Vec<String>,
    pub their_algos: Vec<String>,
}

/// The peer sent `SSH_MSG_DISCONNECT` and closed the connection.
#[derive(Debug, Clone, thiserror::Error)]
pub struct DisconnectError {
    pub reason_code: u32,
    pub description: String,
    pub description_lang: String,
}

impl fmt::Display for DisconnectError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "server returned error ")?;
        if let Some(reason) = disconnect::to_str(self.reason_code) {
            write!(f, "`{}` ({})", reason, self.reason_code)?;
        } else {
            write!(f, "{}", self.reason_code)?;
        }
        if !self.description.is_empty() {
            write!(f, ": {:?}", self.description)?;
        }
        Ok(())
    }
}
