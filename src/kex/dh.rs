use bytes::Bytes;
use hex_literal::hex;
use num_bigint_dig::{BigUint, RandBigInt as _};
use crate::codec::{PacketDecode, PacketEncode};
use crate::error::{Error, Result};
use crate::numbers::msg;
use crate::stream::Stream;
use crate::util::{CryptoRngCore, Socket};
use super::negotiate::recv_packet_skip_ignore;
use super::{KexAlgo, KexInput, KexOutput};

/// "diffie-hellman-group14-sha1" key exchange from RFC 4253.
pub static DIFFIE_HELLMAN_GROUP14_SHA1: KexAlgo = KexAlgo {
    name: "diffie-hellman-group14-sha1",
    exchange: |stream, sock, rng, input|
        run_kex(stream, sock, rng, input, Group::group_14(), compute_hash_sha1),
    compute_hash: compute_hash_sha1,
};

/// "diffie-hellman-group1-sha1" key exchange from RFC 4253.
///
/// Note that the name refers to "group1", but the method in fact uses the Oakley group 2 prime.
pub static DIFFIE_HELLMAN_GROUP1_SHA1: KexAlgo = KexAlgo {
    name: "diffie-hellman-group1-sha1",
    exchange: |stream, sock, rng, input|
        run_kex(stream, sock, rng, input, Group::group_1(), compute_hash_sha1),
    compute_hash: compute_hash_sha1,
};

#[derive(Debug)]
struct Group {
    g: BigUint,
    p: BigUint,
    p_minus_1: BigUint,
}

struct KexdhReply {
    server_pubkey: Bytes,
    server_eph_pubkey: BigUint,
    server_exchange_hash_sign: Bytes,
}

fn run_kex(
    stream: &mut Stream,
    sock: &mut dyn Socket,
    rng: &mut dyn CryptoRngCore,
    input: KexInput<'_>,
    group: Group,
    compute_hash: fn(&[u8]) -> Vec<u8>,
) -> Result<KexOutput> {
    // RFC 4253, section 8: the ephemeral exponent is drawn uniformly from [2, p-2]
    let our_eph_privkey = rng.as_rngcore().gen_biguint_range(&BigUint::from(2u32), &group.p_minus_1);
    let our_eph_pubkey = group.g.modpow(&our_eph_privkey, &group.p);

    send_kexdh_init(stream, sock, &our_eph_pubkey)?;
    let reply = recv_kexdh_reply(stream, sock)?;

    // RFC 8268, section 4
    if reply.server_eph_pubkey <= BigUint::from(1u32)
            || reply.server_eph_pubkey >= group.p_minus_1 {
        return Err(Error::Protocol("server sent invalid Diffie-Hellman ephemeral public key"))
    }

    let shared_secret = reply.server_eph_pubkey.modpow(&our_eph_privkey, &group.p);
    let exchange_hash = compute_exchange_hash(
        &input, &reply.server_pubkey, &our_eph_pubkey, &reply.server_eph_pubkey,
        &shared_secret, compute_hash)?;

    Ok(KexOutput {
        shared_secret_be: shared_secret.to_bytes_be(),
        exchange_hash,
        server_pubkey: reply.server_pubkey,
        server_exchange_hash_sign: reply.server_exchange_hash_sign,
    })
}

fn send_kexdh_init(stream: &mut Stream, sock: &mut dyn Socket, eph_pubkey: &BigUint) -> Result<()> {
    // RFC 4253, section 8
    let mut payload = PacketEncode::new();
    payload.put_u8(msg::KEXDH_INIT)?;
    payload.put_biguint(eph_pubkey)?;
    stream.send_packet(sock, &payload.finish())?;
    log::debug!("sent SSH_MSG_KEXDH_INIT");
    Ok(())
}

fn recv_kexdh_reply(stream: &mut Stream, sock: &mut dyn Socket) -> Result<KexdhReply> {
    let payload = recv_packet_skip_ignore(stream, sock)?;
    let mut payload = PacketDecode::new(payload);

    let msg_id = payload.get_u8()?;
    if msg_id != msg::KEXDH_REPLY {
        return Err(Error::UnexpectedPacket(msg_id))
    }

    // RFC 4253, section 8
    let server_pubkey = payload.get_bytes()?;
    let server_eph_pubkey = payload.get_biguint()?;
    let server_exchange_hash_sign = payload.get_bytes()?;
    log::debug!("received SSH_MSG_KEXDH_REPLY");

    Ok(KexdhReply { server_pubkey, server_eph_pubkey, server_exchange_hash_sign })
}

fn compute_exchange_hash(
    input: &KexInput<'_>,
    server_pubkey: &[u8],
    our_eph_pubkey: &BigUint,
    server_eph_pubkey: &BigUint,
    shared_secret: &BigUint,
    compute_hash: fn(&[u8]) -> Vec<u8>,
) -> Result<Vec<u8>> {
    // RFC 4253, section 8
    let mut exchange_data = PacketEncode::new();
    exchange_data.put_bytes(input.client_ident)?;
    exchange_data.put_bytes(input.server_ident)?;
    exchange_data.put_bytes(input.client_kex_init)?;
    exchange_data.put_bytes(input.server_kex_init)?;
    exchange_data.put_bytes(server_pubkey)?;
    exchange_data.put_biguint(our_eph_pubkey)?;
    exchange_data.put_biguint(server_eph_pubkey)?;
    exchange_data.put_biguint(shared_secret)?;
    Ok(compute_hash(&exchange_data.finish()))
}

fn compute_hash_sha1(data: &[u8]) -> Vec<u8> {
    use sha1::digest::Digest as _;
    sha1::Sha1::digest(data).to_vec()
}

impl Group {
    fn group_1() -> Group {
        // RFC 2409, section 6.2
        let g = BigUint::from(2u32);
        let p = BigUint::from_bytes_be(&hex!(
            "FFFFFFFF" "FFFFFFFF" "C90FDAA2" "2168C234" "C4C6628B" "80DC1CD1"
            "29024E08" "8A67CC74" "020BBEA6" "3B139B22" "514A0879" "8E3404DD"
            "EF9519B3" "CD3A431B" "302B0A6D" "F25F1437" "4FE1356D" "6D51C245"
            "E485B576" "625E7EC6" "F44C42E9" "A637ED6B" "0BFF5CB6" "F406B7ED"
            "EE386BFB" "5A899FA5" "AE9F2411" "7C4B1FE6" "49286651" "ECE65381"
            "FFFFFFFF" "FFFFFFFF"
        ));
        let p_minus_1 = &p - BigUint::from(1u32);
        Group { g, p, p_minus_1 }
    }

    fn group_14() -> Group {
        // RFC 3526, section 3
        let g = BigUint::from(2u32);
        let p = BigUint::from_bytes_be(&hex!(
            "FFFFFFFF" "FFFFFFFF" "C90FDAA2" "2168C234" "C4C6628B" "80DC1CD1"
            "29024E08" "8A67CC74" "020BBEA6" "3B139B22" "514A0879" "8E3404DD"
            "EF9519B3" "CD3A431B" "302B0A6D" "F25F1437" "4FE1356D" "6D51C245"
            "E485B576" "625E7EC6" "F44C42E9" "A637ED6B" "0BFF5CB6" "F406B7ED"
            "EE386BFB" "5A899FA5" "AE9F2411" "7C4B1FE6" "49286651" "ECE45B3D"
            "C2007CB8" "A163BF05" "98DA4836" "1C55D39A" "69163FA8" "FD24CF5F"
            "83655D23" "DCA3AD96" "1C62F356" "208552BB" "9ED52907" "7096966D"
            "670C354E" "4ABC9804" "F1746C08" "CA18217C" "32905E46" "2E36CE3B"
            "E39E772C" "180E8603" "9B2783A2" "EC07A28F" "B5C55DF0" "6F4C52C9"
            "DE2BCBF6" "95581718" "3995497C" "EA956AE5" "15D22618" "98FA0510"
            "15728E5A" "8AACAA68" "FFFFFFFF" "FFFFFFFF"
        ));
        let p_minus_1 = &p - BigUint::from(1u32);
        Group { g, p, p_minus_1 }
    }
}
