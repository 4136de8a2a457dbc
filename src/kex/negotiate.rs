use bytes::Bytes;
use crate::cipher::CipherAlgo;
use crate::codec::{PacketDecode, PacketEncode};
use crate::config::Config;
use crate::error::{AlgoNegotiateError, DisconnectError, Error, Result};
use crate::host::{HostKeyVerdict, HostKeyVerify};
use crate::mac::MacAlgo;
use crate::numbers::{disconnect, msg};
use crate::pubkey::{Pubkey, PubkeyAlgo};
use crate::stream::Stream;
use crate::util::{CryptoRngCore, Socket};
use super::{KexAlgo, KexInput, KexOutput};

/// Connection identity used during key exchange.
#[derive(Debug)]
pub struct KexParams<'a> {
    /// Our version banner, without the trailing CR LF.
    pub client_ident: &'a [u8],
    /// The server's version banner, without the trailing CR LF.
    pub server_ident: &'a [u8],
    /// Server hostname, passed to the host key hook.
    pub host: &'a str,
    /// Server port, passed to the host key hook.
    pub port: u16,
}

/// Runs one complete key exchange on `stream` (RFC 4253, sections 7 and 8).
///
/// Algorithms are negotiated from `config`, the server host key is verified against the exchange
/// hash and submitted to `verifier`, new keys are derived and installed on `stream` as
/// `SSH_MSG_NEWKEYS` is exchanged. On the first call `session_id` is set to the exchange hash;
/// later calls perform a rekey and leave it untouched.
///
/// Returns the exchange hash. On failure a best-effort `SSH_MSG_DISCONNECT` with a matching
/// reason code is sent before the error is returned, and the stream must not be used again.
pub fn key_exchange(
    stream: &mut Stream,
    sock: &mut dyn Socket,
    rng: &mut dyn CryptoRngCore,
    config: &Config,
    params: &KexParams<'_>,
    verifier: &mut dyn HostKeyVerify,
    session_id: &mut Option<Vec<u8>>,
) -> Result<Vec<u8>> {
    match run_key_exchange(stream, sock, rng, config, params, verifier, session_id) {
        Ok(exchange_hash) => Ok(exchange_hash),
        Err(err) => {
            if should_send_disconnect(&err) {
                let _ = send_disconnect(stream, sock, disconnect_reason(&err), "key exchange failed");
            }
            Err(err)
        },
    }
}

fn run_key_exchange(
    stream: &mut Stream,
    sock: &mut dyn Socket,
    rng: &mut dyn CryptoRngCore,
    config: &Config,
    params: &KexParams<'_>,
    verifier: &mut dyn HostKeyVerify,
    session_id: &mut Option<Vec<u8>>,
) -> Result<Vec<u8>> {
    let our_kex_init = build_kex_init(rng, config)?;
    stream.send_packet(sock, &our_kex_init)?;
    log::debug!("sent SSH_MSG_KEXINIT");

    let their_kex_init = recv_their_kex_init(stream, sock)?;
    let algos = negotiate_algos(config, &their_kex_init)?;

    let input = KexInput {
        client_ident: params.client_ident,
        server_ident: params.server_ident,
        client_kex_init: &our_kex_init,
        server_kex_init: &their_kex_init.payload,
    };
    let kex_output = (algos.kex.exchange)(stream, sock, rng, input)?;
    log::debug!("finished kex");

    let pubkey = Pubkey::decode(kex_output.server_pubkey.clone())?;
    log::debug!("server pubkey {}", pubkey);
    let _signature_verified = (algos.server_pubkey.verify)(
        &pubkey, &kex_output.exchange_hash, kex_output.server_exchange_hash_sign.clone())?;

    match verifier.verify(params.host, params.port, &kex_output.server_pubkey) {
        HostKeyVerdict::Accept => {},
        HostKeyVerdict::AcceptAndRemember =>
            verifier.remember(params.host, params.port, &kex_output.server_pubkey),
        HostKeyVerdict::Reject => return Err(Error::HostKeyUntrusted),
    }
    log::debug!("server identity verified");

    // the exchange hash of the very first kex identifies the whole connection
    let session_id = session_id.get_or_insert_with(|| kex_output.exchange_hash.clone());

    send_new_keys(stream, sock, &algos, &kex_output, session_id)?;
    recv_new_keys(stream, sock, &algos, &kex_output, session_id)?;

    Ok(kex_output.exchange_hash)
}

struct Algos {
    kex: &'static KexAlgo,
    server_pubkey: &'static PubkeyAlgo,
    cipher_cts: &'static CipherAlgo,
    cipher_stc: &'static CipherAlgo,
    mac_cts: &'static MacAlgo,
    mac_stc: &'static MacAlgo,
}

#[derive(Debug)]
struct TheirKexInit {
    payload: Bytes,
    kex_algos: Vec<String>,
    server_pubkey_algos: Vec<String>,
    cipher_algos_cts: Vec<String>,
    cipher_algos_stc: Vec<String>,
    mac_algos_cts: Vec<String>,
    mac_algos_stc: Vec<String>,
    compression_algos_cts: Vec<String>,
    compression_algos_stc: Vec<String>,
}

fn build_kex_init(rng: &mut dyn CryptoRngCore, config: &Config) -> Result<Bytes> {
    let mut cookie = [0; 16];
    rng.as_rngcore().try_fill_bytes(&mut cookie)
        .map_err(|_| Error::Random("could not generate random cookie"))?;

    fn get_algo_names<A: NamedAlgo>(algos: &[&A]) -> Vec<&'static str> {
        algos.iter().map(|algo| algo.name()).collect()
    }

    // RFC 4253, section 7.1
    let mut payload = PacketEncode::new();
    payload.put_u8(msg::KEXINIT)?;
    payload.put_raw(&cookie)?;
    payload.put_name_list(&get_algo_names(&config.kex_algos))?;
    payload.put_name_list(&get_algo_names(&config.server_pubkey_algos))?;
    payload.put_name_list(&get_algo_names(&config.cipher_algos))?;
    payload.put_name_list(&get_algo_names(&config.cipher_algos))?;
    payload.put_name_list(&get_algo_names(&config.mac_algos))?;
    payload.put_name_list(&get_algo_names(&config.mac_algos))?;
    payload.put_name_list(&["none"])?;
    payload.put_name_list(&["none"])?;
    payload.put_name_list(&[])?;
    payload.put_name_list(&[])?;
    payload.put_bool(false)?;
    payload.put_u32(0)?;
    Ok(payload.finish())
}

fn recv_their_kex_init(stream: &mut Stream, sock: &mut dyn Socket) -> Result<TheirKexInit> {
    let payload = recv_packet_skip_ignore(stream, sock)?;
    let kex_init = parse_kex_init(payload)?;
    log::debug!("received SSH_MSG_KEXINIT: {:?}", kex_init);
    Ok(kex_init)
}

fn parse_kex_init(payload: Bytes) -> Result<TheirKexInit> {
    let mut decode = PacketDecode::new(payload.clone());

    let msg_id = decode.get_u8()?;
    if msg_id != msg::KEXINIT {
        return Err(Error::UnexpectedPacket(msg_id))
    }

    // RFC 4253, section 7.1
    decode.skip(16)?; // cookie
    let kex_algos = decode.get_name_list()?; // kex_algorithms
    let server_pubkey_algos = decode.get_name_list()?; // server_host_key_algorithms
    let cipher_algos_cts = decode.get_name_list()?; // encryption_algorithms_client_to_server
    let cipher_algos_stc = decode.get_name_list()?; // encryption_algorithms_server_to_client
    let mac_algos_cts = decode.get_name_list()?; // mac_algorithms_client_to_server
    let mac_algos_stc = decode.get_name_list()?; // mac_algorithms_server_to_client
    let compression_algos_cts = decode.get_name_list()?; // compression_algorithms_client_to_server
    let compression_algos_stc = decode.get_name_list()?; // compression_algorithms_server_to_client
    decode.get_name_list()?; // languages_client_to_server
    decode.get_name_list()?; // languages_server_to_client
    let first_kex_packet_follows = decode.get_bool()?;
    decode.get_u32()?; // reserved

    if first_kex_packet_follows {
        return Err(Error::Protocol("received SSH_MSG_KEXINIT with first_kex_packet_follows set"))
    }

    Ok(TheirKexInit {
        payload,
        kex_algos,
        server_pubkey_algos,
        cipher_algos_cts,
        cipher_algos_stc,
        mac_algos_cts,
        mac_algos_stc,
        compression_algos_cts,
        compression_algos_stc,
    })
}

fn negotiate_algos(config: &Config, their: &TheirKexInit) -> Result<Algos> {
    let kex = negotiate_algo(&config.kex_algos, &their.kex_algos, "key exchange")?;
    let server_pubkey = negotiate_algo(
        &config.server_pubkey_algos, &their.server_pubkey_algos, "server public key")?;
    let cipher_cts = negotiate_algo(
        &config.cipher_algos, &their.cipher_algos_cts, "cipher client-to-server")?;
    let cipher_stc = negotiate_algo(
        &config.cipher_algos, &their.cipher_algos_stc, "cipher server-to-client")?;
    let mac_cts = negotiate_algo(
        &config.mac_algos, &their.mac_algos_cts, "mac client-to-server")?;
    let mac_stc = negotiate_algo(
        &config.mac_algos, &their.mac_algos_stc, "mac server-to-client")?;
    negotiate_compression(&their.compression_algos_cts, "compression client-to-server")?;
    negotiate_compression(&their.compression_algos_stc, "compression server-to-client")?;

    Ok(Algos { kex, server_pubkey, cipher_cts, cipher_stc, mac_cts, mac_stc })
}

// walk our (the client's) preferences in order and take the first name that the server also
// supports, anywhere in its list
fn negotiate_algo<A: NamedAlgo>(
    our_algos: &[&'static A],
    their_algos: &[String],
    name: &'static str,
) -> Result<&'static A> {
    for our_algo in our_algos.iter() {
        if their_algos.iter().any(|their_algo| our_algo.name() == their_algo.as_str()) {
            log::debug!("negotiated algo {:?} for {}", our_algo.name(), name);
            return Ok(our_algo)
        }
    }

    Err(Error::AlgoNegotiate(AlgoNegotiateError {
        algo_name: name.into(),
        our_algos: our_algos.iter().map(|a| a.name().into()).collect(),
        their_algos: their_algos.into(),
    }))
}

fn negotiate_compression(their_algos: &[String], name: &'static str) -> Result<()> {
    if their_algos.iter().any(|algo| algo == "none") {
        return Ok(())
    }
    Err(Error::AlgoNegotiate(AlgoNegotiateError {
        algo_name: name.into(),
        our_algos: vec!["none".into()],
        their_algos: their_algos.into(),
    }))
}

trait NamedAlgo { fn name(&self) -> &'static str; }
impl NamedAlgo for KexAlgo { fn name(&self) -> &'static str { self.name } }
impl NamedAlgo for CipherAlgo { fn name(&self) -> &'static str { self.name } }
impl NamedAlgo for MacAlgo { fn name(&self) -> &'static str { self.name } }
impl NamedAlgo for PubkeyAlgo { fn name(&self) -> &'static str { self.name } }

fn send_new_keys(
    stream: &mut Stream,
    sock: &mut dyn Socket,
    algos: &Algos,
    kex_output: &KexOutput,
    session_id: &[u8],
) -> Result<()> {
    let cipher_algo = algos.cipher_cts;
    let cipher_iv = derive_key(algos.kex, kex_output, session_id, b'A', cipher_algo.iv_len)?;
    let cipher_key = derive_key(algos.kex, kex_output, session_id, b'C', cipher_algo.key_len)?;

    let mac_algo = algos.mac_cts;
    let mac_key = derive_key(algos.kex, kex_output, session_id, b'E', mac_algo.key_len)?;

    // NEWKEYS is the last packet under the old keys
    let mut payload = PacketEncode::new();
    payload.put_u8(msg::NEWKEYS)?;
    stream.send_packet(sock, &payload.finish())?;

    stream.set_encrypt(cipher_algo, &cipher_key, &cipher_iv, mac_algo, &mac_key);
    log::debug!("sent SSH_MSG_NEWKEYS and applied new keys");
    Ok(())
}

fn recv_new_keys(
    stream: &mut Stream,
    sock: &mut dyn Socket,
    algos: &Algos,
    kex_output: &KexOutput,
    session_id: &[u8],
) -> Result<()> {
    let payload = recv_packet_skip_ignore(stream, sock)?;
    let msg_id = PacketDecode::new(payload).get_u8()?;
    if msg_id != msg::NEWKEYS {
        return Err(Error::UnexpectedPacket(msg_id))
    }

    let cipher_algo = algos.cipher_stc;
    let cipher_iv = derive_key(algos.kex, kex_output, session_id, b'B', cipher_algo.iv_len)?;
    let cipher_key = derive_key(algos.kex, kex_output, session_id, b'D', cipher_algo.key_len)?;

    let mac_algo = algos.mac_stc;
    let mac_key = derive_key(algos.kex, kex_output, session_id, b'F', mac_algo.key_len)?;

    stream.set_decrypt(cipher_algo, &cipher_key, &cipher_iv, mac_algo, &mac_key);
    log::debug!("received SSH_MSG_NEWKEYS and applied new keys");
    Ok(())
}

fn derive_key(
    kex_algo: &KexAlgo,
    kex_output: &KexOutput,
    session_id: &[u8],
    key_type: u8,
    key_len: usize,
) -> Result<Vec<u8>> {
    // RFC 4253, section 7.2
    let mut to_hash_prefix = PacketEncode::new();
    to_hash_prefix.put_mpint_uint_be(&kex_output.shared_secret_be)?;
    to_hash_prefix.put_raw(&kex_output.exchange_hash)?;

    let compute_hash = kex_algo.compute_hash;
    let mut key = {
        let mut to_hash = to_hash_prefix.clone();
        to_hash.put_u8(key_type)?;
        to_hash.put_raw(session_id)?;
        compute_hash(&to_hash.finish())
    };

    while key.len() < key_len {
        let mut to_hash = to_hash_prefix.clone();
        to_hash.put_raw(&key)?;
        key.extend_from_slice(&compute_hash(&to_hash.finish()));
    }

    key.truncate(key_len);
    Ok(key)
}

/// Receives one packet, transparently skipping `SSH_MSG_IGNORE`, `SSH_MSG_DEBUG` and
/// `SSH_MSG_UNIMPLEMENTED` and turning `SSH_MSG_DISCONNECT` into an error.
pub(crate) fn recv_packet_skip_ignore(stream: &mut Stream, sock: &mut dyn Socket) -> Result<Bytes> {
    loop {
        let payload = stream.recv_packet(sock)?;
        match payload.first().copied() {
            Some(msg::IGNORE) | Some(msg::DEBUG) | Some(msg::UNIMPLEMENTED) => {
                log::trace!("skipped packet {} during key exchange", payload[0]);
            },
            Some(msg::DISCONNECT) => {
                let mut decode = PacketDecode::new(payload.clone());
                decode.get_u8()?;
                let disconnect = DisconnectError {
                    reason_code: decode.get_u32()?,
                    description: decode.get_string()?,
                    description_lang: decode.get_string()?,
                };
                log::debug!("received SSH_MSG_DISCONNECT: {:?}", disconnect);
                return Err(Error::PeerDisconnected(disconnect))
            },
            Some(_) => return Ok(payload),
            None => return Err(Error::Protocol("received empty packet")),
        }
    }
}

/// Sends `SSH_MSG_DISCONNECT` with the given reason code and description.
///
/// The connection should be closed afterwards; a disconnect message is never answered.
pub fn send_disconnect(
    stream: &mut Stream,
    sock: &mut dyn Socket,
    reason_code: u32,
    description: &str,
) -> Result<()> {
    let mut payload = PacketEncode::new();
    payload.put_u8(msg::DISCONNECT)?;
    payload.put_u32(reason_code)?;
    payload.put_str(description)?;
    payload.put_str("")?; // language tag
    stream.send_packet(sock, &payload.finish())?;
    Ok(())
}

fn disconnect_reason(error: &Error) -> u32 {
    match error {
        Error::Mac => disconnect::MAC_ERROR,
        Error::Signature | Error::AlgoNegotiate(_) => disconnect::KEY_EXCHANGE_FAILED,
        Error::HostKeyUntrusted => disconnect::HOST_KEY_NOT_VERIFIABLE,
        _ => disconnect::PROTOCOL_ERROR,
    }
}

fn should_send_disconnect(error: &Error) -> bool {
    !matches!(error,
        Error::PeerDisconnected(_) | Error::PeerClosed | Error::ReadIo(_) | Error::WriteIo(_))
}
