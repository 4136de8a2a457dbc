//! The SSH binary packet protocol (RFC 4253, section 6).
//!
//! A [`Stream`] frames payloads into packets, encrypts and authenticates them, and parses and
//! verifies packets received from the peer. The two directions of the connection are fully
//! independent: each has its own cipher and MAC state and its own sequence number.
use bytes::{Buf as _, BufMut as _, Bytes, BytesMut};
use rand::{RngCore as _, SeedableRng as _};
use rand_chacha::ChaCha8Rng;
use crate::cipher::{self, CipherAlgo, Decrypt, Encrypt};
use crate::error::{Error, Result};
use crate::mac::{self, Mac, MacAlgo, MacVerified};
use crate::util::{CryptoRngCore, Socket};

/// Hard upper bound for the configurable maximum packet length.
pub const MAX_PACKET_LEN_LIMIT: usize = 262144;

/// The packet layer of an SSH connection.
///
/// The stream starts in plaintext ("none" cipher and MAC, as during the initial key exchange) and
/// is rebound to negotiated algorithms with [`set_encrypt`][Self::set_encrypt] and
/// [`set_decrypt`][Self::set_decrypt] when `SSH_MSG_NEWKEYS` crosses the connection. The socket is
/// not owned by the stream; it is passed to every call that touches the network.
pub struct Stream {
    send: SendHalf,
    recv: RecvHalf,
    read_ahead: BytesMut,
    max_packet_len: usize,
}

struct SendHalf {
    packet_seq: u32,
    encrypt: Box<dyn Encrypt + Send>,
    mac: Box<dyn Mac + Send>,
    block_len: usize,
    tag_len: usize,
    encrypted: bool,
    buf: BytesMut,
    padding_rng: ChaCha8Rng,
}

struct RecvHalf {
    packet_seq: u32,
    decrypt: Box<dyn Decrypt + Send>,
    mac: Box<dyn Mac + Send>,
    block_len: usize,
    tag_len: usize,
    buf: BytesMut,
}

impl Stream {
    /// Creates a stream in the initial plaintext state.
    ///
    /// `max_packet_len` bounds the `packet_length` field in both directions (the protocol
    /// requires at least 35000; the default configuration uses 65536). `rng` seeds the generator
    /// used for packet padding.
    pub fn new(max_packet_len: usize, rng: &mut dyn CryptoRngCore) -> Result<Stream> {
        if max_packet_len < 16 || max_packet_len > MAX_PACKET_LEN_LIMIT {
            return Err(Error::Config("max_packet_len out of range"))
        }
        let padding_rng = ChaCha8Rng::from_rng(rng.as_rngcore())
            .map_err(|_| Error::Random("could not generate seed for padding generator"))?;
        Ok(Stream {
            send: SendHalf {
                packet_seq: 0,
                encrypt: Box::new(cipher::Identity),
                mac: Box::new(mac::Empty),
                block_len: 8,
                tag_len: 0,
                encrypted: false,
                buf: BytesMut::new(),
                padding_rng,
            },
            recv: RecvHalf {
                packet_seq: 0,
                decrypt: Box::new(cipher::Identity),
                mac: Box::new(mac::Empty),
                block_len: 8,
                tag_len: 0,
                buf: BytesMut::new(),
            },
            read_ahead: BytesMut::new(),
            max_packet_len,
        })
    }

    /// Frames `payload` into a packet and writes it to `sock`.
    ///
    /// Returns the sequence number that the packet was sent under.
    pub fn send_packet(&mut self, sock: &mut dyn Socket, payload: &[u8]) -> Result<u32> {
        let padding_len = calculate_padding_len(payload.len(), self.send.block_len);
        let packet_len = 1 + payload.len() + padding_len;
        if packet_len > self.max_packet_len {
            return Err(Error::Encode("payload does not fit in the maximum packet length"))
        }

        log::trace!("sending packet {}, len {}, seq {}",
            payload.first().copied().unwrap_or(0), payload.len(), self.send.packet_seq);

        // RFC 4253, section 6
        //
        // packet layout:
        // 4 bytes: `packet_len = 1 + payload_len + padding_len` (u32 big endian)
        // 1 byte: padding_len (u8)
        // `payload_len` bytes: payload
        // `padding_len` bytes: padding
        // `tag_len` bytes: mac tag
        let buf = &mut self.send.buf;
        buf.clear();
        buf.reserve(4 + packet_len + self.send.tag_len);
        buf.put_u32(packet_len as u32);
        buf.put_u8(padding_len as u8);
        buf.put_slice(payload);
        buf.put_bytes(0, padding_len + self.send.tag_len);

        let padding = &mut buf[5 + payload.len()..][..padding_len];
        if self.send.encrypted {
            self.send.padding_rng.fill_bytes(padding);
        } else {
            // keep the packet deterministic until a cipher is engaged
            padding.fill(0xff);
        }

        let (plaintext, tag) = self.send.buf.split_at_mut(4 + packet_len);
        self.send.mac.sign(self.send.packet_seq, plaintext, tag);
        self.send.encrypt.encrypt(plaintext);

        sock.write_all(&self.send.buf).map_err(Error::WriteIo)?;
        sock.flush().map_err(Error::WriteIo)?;

        let packet_seq = self.send.packet_seq;
        self.send.packet_seq = self.send.packet_seq.wrapping_add(1);
        Ok(packet_seq)
    }

    /// Reads exactly one packet from `sock`, decrypts it and verifies its MAC.
    ///
    /// Returns the packet payload (without the padding and the tag). On error the stream must not
    /// be used again.
    pub fn recv_packet(&mut self, sock: &mut dyn Socket) -> Result<Bytes> {
        let block_len = self.recv.block_len;
        let tag_len = self.recv.tag_len;

        // read and decrypt the first block to learn the packet length
        let buf = &mut self.recv.buf;
        buf.clear();
        buf.resize(block_len, 0);
        recv_data(&mut self.read_ahead, sock, &mut buf[..])?;
        self.recv.decrypt.decrypt(&mut buf[..block_len]);

        let packet_len = u32::from_be_bytes(buf[..4].try_into().unwrap());
        if packet_len == 0 || packet_len as usize > self.max_packet_len {
            return Err(Error::PacketLength(packet_len))
        }
        let packet_len = packet_len as usize;
        if (4 + packet_len) % block_len != 0 {
            return Err(Error::Padding("packet is not aligned to cipher block length"))
        }

        // read the rest of the packet and the mac tag, decrypting everything but the tag
        let total_len = 4 + packet_len + tag_len;
        if total_len > block_len {
            buf.resize(total_len, 0);
            recv_data(&mut self.read_ahead, sock, &mut buf[block_len..])?;
            self.recv.decrypt.decrypt(&mut buf[block_len..4 + packet_len]);
        }

        let padding_len = buf[4] as usize;
        if padding_len < 4 || padding_len > packet_len - 1 {
            return Err(Error::Padding("padding length out of range"))
        }

        let (plaintext, tag) = self.recv.buf.split_at(4 + packet_len);
        let _verified: MacVerified = self.recv.mac.verify(self.recv.packet_seq, plaintext, tag)?;

        log::trace!("received packet {}, len {}, seq {}",
            plaintext.get(5).copied().unwrap_or(0), packet_len - padding_len - 1,
            self.recv.packet_seq);

        let payload = Bytes::copy_from_slice(&plaintext[5..4 + packet_len - padding_len]);
        self.recv.packet_seq = self.recv.packet_seq.wrapping_add(1);
        Ok(payload)
    }

    /// Installs a new cipher and MAC for the outgoing direction.
    ///
    /// The old contexts are dropped and the new ones installed as a single operation. Call this
    /// right after sending `SSH_MSG_NEWKEYS`, so that `NEWKEYS` is the last packet under the old
    /// keys.
    pub fn set_encrypt(
        &mut self,
        cipher_algo: &CipherAlgo, key: &[u8], iv: &[u8],
        mac_algo: &MacAlgo, mac_key: &[u8],
    ) {
        self.send.encrypt = (cipher_algo.make_encrypt)(key, iv);
        self.send.mac = (mac_algo.make_mac)(mac_key);
        self.send.block_len = cipher_algo.block_len.max(8);
        self.send.tag_len = mac_algo.tag_len;
        self.send.encrypted = cipher_algo.name != "none";
    }

    /// Installs a new cipher and MAC for the incoming direction.
    ///
    /// Call this right after receiving `SSH_MSG_NEWKEYS`, so that `NEWKEYS` is the first packet
    /// boundary under the new keys.
    pub fn set_decrypt(
        &mut self,
        cipher_algo: &CipherAlgo, key: &[u8], iv: &[u8],
        mac_algo: &MacAlgo, mac_key: &[u8],
    ) {
        self.recv.decrypt = (cipher_algo.make_decrypt)(key, iv);
        self.recv.mac = (mac_algo.make_mac)(mac_key);
        self.recv.block_len = cipher_algo.block_len.max(8);
        self.recv.tag_len = mac_algo.tag_len;
    }

    /// Hands bytes that were read past the packet boundary back to the stream.
    ///
    /// [`recv_packet`][Self::recv_packet] consumes these bytes before reading from the socket.
    /// This is how bytes over-read during the version exchange find their way into the packet
    /// layer.
    pub fn unread_input(&mut self, data: &[u8]) {
        self.read_ahead.extend_from_slice(data);
    }

    /// Sequence number of the next outgoing packet.
    pub fn send_seq(&self) -> u32 {
        self.send.packet_seq
    }

    /// Sequence number of the next incoming packet.
    pub fn recv_seq(&self) -> u32 {
        self.recv.packet_seq
    }
}

fn recv_data(read_ahead: &mut BytesMut, sock: &mut dyn Socket, mut data: &mut [u8]) -> Result<()> {
    if !read_ahead.is_empty() {
        let take = read_ahead.len().min(data.len());
        data[..take].copy_from_slice(&read_ahead[..take]);
        read_ahead.advance(take);
        data = &mut data[take..];
    }

    if !data.is_empty() {
        sock.read_exact(data).map_err(|err| match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::PeerClosed,
            _ => Error::ReadIo(err),
        })?;
    }
    Ok(())
}

fn calculate_padding_len(payload_len: usize, block_len: usize) -> usize {
    // RFC 4253, section 6: at least 4 bytes of padding, and the whole encrypted region must be
    // a multiple of the block length (or 8, whichever is larger)
    let block_len = block_len.max(8);
    let min_padded_len = 5 + payload_len + 4;
    let padded_len = (min_padded_len + block_len - 1) / block_len * block_len;
    padded_len - payload_len - 5
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use rand::SeedableRng as _;
    use rand_chacha::ChaCha8Rng;
    use std::io;
    use super::*;

    struct FakeSock {
        input: io::Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl io::Read for FakeSock {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            io::Read::read(&mut self.input, buf)
        }
    }

    impl io::Write for FakeSock {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> { Ok(()) }
    }

    fn sock(input: &[u8]) -> FakeSock {
        FakeSock { input: io::Cursor::new(input.into()), output: Vec::new() }
    }

    fn stream() -> Stream {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        Stream::new(65536, &mut rng).unwrap()
    }

    fn zero_key_mac(stream: &mut Stream) {
        stream.set_encrypt(&cipher::NONE, &[], &[], &mac::HMAC_SHA2_256, &[0; 32]);
        stream.set_decrypt(&cipher::NONE, &[], &[], &mac::HMAC_SHA2_256, &[0; 32]);
    }

    fn aes_ctr_keys(stream: &mut Stream) {
        stream.set_encrypt(&cipher::AES128_CTR, &[7; 16], &[9; 16], &mac::HMAC_SHA2_256, &[1; 32]);
        stream.set_decrypt(&cipher::AES128_CTR, &[7; 16], &[9; 16], &mac::HMAC_SHA2_256, &[1; 32]);
    }

    #[test]
    fn test_is_send() {
        fn assert_is_send<T: Send>() {}
        assert_is_send::<Stream>()
    }

    #[test]
    fn test_null_keys_round_trip() {
        let mut sock = sock(b"");
        let mut sender = stream();
        assert_eq!(sender.send_packet(&mut sock, &[0x05]).unwrap(), 0);
        assert_eq!(
            sock.output,
            hex!("0000000c 0a 05 ffffffffffffffffffff"),
        );
        assert_eq!(sender.send_seq(), 1);

        let mut sock = self::sock(&sock.output);
        let mut receiver = stream();
        assert_eq!(receiver.recv_packet(&mut sock).unwrap().as_ref(), &[0x05]);
        assert_eq!(receiver.recv_seq(), 1);
    }

    #[test]
    fn test_empty_payload() {
        let mut sock = sock(b"");
        let mut sender = stream();
        sender.send_packet(&mut sock, &[]).unwrap();
        assert_eq!(
            sock.output,
            hex!("0000000c 0b ffffffffffffffffffffff"),
        );
        assert_eq!(sock.output.len(), 16);

        let mut sock = self::sock(&sock.output);
        let mut receiver = stream();
        assert!(receiver.recv_packet(&mut sock).unwrap().is_empty());
    }

    #[test]
    fn test_payload_on_block_boundary() {
        // 5 + 8 leaves only 3 bytes of padding before the next block boundary, which forces the
        // padding to grow by a whole block
        let mut sock = sock(b"");
        let mut sender = stream();
        sender.send_packet(&mut sock, &[0x55; 8]).unwrap();
        assert_eq!(sock.output.len(), 24);
        assert_eq!(&sock.output[..4], &hex!("00000014"));
        assert_eq!(sock.output[4], 11);
    }

    #[test]
    fn test_padding_lens() {
        for &block_len in &[8, 16, 32] {
            for payload_len in 0..200 {
                let padding_len = calculate_padding_len(payload_len, block_len);
                assert!(padding_len >= 4 && padding_len <= 255);
                assert_eq!((5 + payload_len + padding_len) % block_len, 0);
            }
        }
    }

    #[test]
    fn test_oversize_rejected() {
        let mut sock = sock(&hex!("00010001 deadbeef"));
        let mut receiver = stream();
        match receiver.recv_packet(&mut sock) {
            Err(Error::PacketLength(65537)) => {},
            res => panic!("expected PacketLength(65537), got {:?}", res),
        }
        assert_eq!(receiver.recv_seq(), 0);
    }

    #[test]
    fn test_max_len_not_oversize() {
        // 65536 passes the length check but can never satisfy the block alignment
        let mut sock = sock(&hex!("00010000 deadbeef"));
        let mut receiver = stream();
        assert!(matches!(receiver.recv_packet(&mut sock), Err(Error::Padding(_))));
    }

    #[test]
    fn test_zero_len_rejected() {
        let mut sock = sock(&hex!("00000000 deadbeef"));
        let mut receiver = stream();
        assert!(matches!(receiver.recv_packet(&mut sock), Err(Error::PacketLength(0))));
    }

    #[test]
    fn test_bad_padding_len() {
        // padding_len = 3 is below the required minimum of 4
        let mut record = vec![0x00, 0x00, 0x00, 0x0c, 0x03];
        record.resize(16, 0xff);
        let mut sock = sock(&record);
        let mut receiver = stream();
        assert!(matches!(receiver.recv_packet(&mut sock), Err(Error::Padding(_))));
    }

    #[test]
    fn test_mac_round_trip_and_tamper() {
        let mut sock = sock(b"");
        let mut sender = stream();
        zero_key_mac(&mut sender);
        sender.send_packet(&mut sock, &[0x05]).unwrap();
        let record = sock.output.clone();
        assert_eq!(record.len(), 16 + 32);

        // untampered record verifies
        let mut sock = self::sock(&record);
        let mut receiver = stream();
        zero_key_mac(&mut receiver);
        assert_eq!(receiver.recv_packet(&mut sock).unwrap().as_ref(), &[0x05]);
        assert_eq!(receiver.recv_seq(), 1);

        // a flipped bit in the mac tag is caught and the sequence number does not advance
        let mut tampered = record.clone();
        *tampered.last_mut().unwrap() ^= 0x01;
        let mut sock = self::sock(&tampered);
        let mut receiver = stream();
        zero_key_mac(&mut receiver);
        assert!(matches!(receiver.recv_packet(&mut sock), Err(Error::Mac)));
        assert_eq!(receiver.recv_seq(), 0);

        // a flipped bit in the packet body is caught too
        let mut tampered = record;
        tampered[6] ^= 0x80;
        let mut sock = self::sock(&tampered);
        let mut receiver = stream();
        zero_key_mac(&mut receiver);
        assert!(matches!(receiver.recv_packet(&mut sock), Err(Error::Mac)));
    }

    #[test]
    fn test_encrypted_round_trip_ctr() {
        let mut sock = sock(b"");
        let mut sender = stream();
        aes_ctr_keys(&mut sender);

        let payloads: &[&[u8]] = &[b"", b"x", &[0x14; 8], &[0x5e; 100], &[0x21; 1000]];
        for payload in payloads {
            sender.send_packet(&mut sock, payload).unwrap();
        }
        assert_eq!(sender.send_seq(), payloads.len() as u32);

        let mut sock = self::sock(&sock.output);
        let mut receiver = stream();
        aes_ctr_keys(&mut receiver);
        for payload in payloads {
            assert_eq!(receiver.recv_packet(&mut sock).unwrap().as_ref(), *payload);
        }
        assert_eq!(receiver.recv_seq(), payloads.len() as u32);
    }

    #[test]
    fn test_encrypted_round_trip_cbc() {
        let mut sock = sock(b"");
        let mut sender = stream();
        sender.set_encrypt(&cipher::AES128_CBC, &[3; 16], &[4; 16], &mac::HMAC_SHA2_512, &[2; 64]);

        sender.send_packet(&mut sock, b"service request").unwrap();
        sender.send_packet(&mut sock, &[0x15]).unwrap();

        let mut sock = self::sock(&sock.output);
        let mut receiver = stream();
        receiver.set_decrypt(&cipher::AES128_CBC, &[3; 16], &[4; 16], &mac::HMAC_SHA2_512, &[2; 64]);
        assert_eq!(receiver.recv_packet(&mut sock).unwrap().as_ref(), b"service request");
        assert_eq!(receiver.recv_packet(&mut sock).unwrap().as_ref(), &[0x15]);
    }

    #[test]
    fn test_encrypted_tamper() {
        let mut sock = sock(b"");
        let mut sender = stream();
        aes_ctr_keys(&mut sender);
        sender.send_packet(&mut sock, b"tamper me").unwrap();

        let mut record = sock.output.clone();
        record[8] ^= 0x01;
        let mut sock = self::sock(&record);
        let mut receiver = stream();
        aes_ctr_keys(&mut receiver);
        assert!(matches!(receiver.recv_packet(&mut sock), Err(Error::Mac)));
    }

    #[test]
    fn test_seq_monotonic() {
        let mut sock = sock(b"");
        let mut sender = stream();
        for i in 0..5u8 {
            assert_eq!(sender.send_packet(&mut sock, &[i]).unwrap(), i as u32);
        }

        let mut sock = self::sock(&sock.output);
        let mut receiver = stream();
        for i in 0..5u8 {
            assert_eq!(receiver.recv_seq(), i as u32);
            assert_eq!(receiver.recv_packet(&mut sock).unwrap().as_ref(), &[i]);
        }
    }

    #[test]
    fn test_read_ahead() {
        let mut sock = sock(b"");
        let mut sender = stream();
        sender.send_packet(&mut sock, b"first").unwrap();
        sender.send_packet(&mut sock, b"second").unwrap();
        let records = sock.output;

        // the first 10 bytes were over-read by the caller, the rest comes from the socket
        let mut receiver = stream();
        receiver.unread_input(&records[..10]);
        let mut sock = self::sock(&records[10..]);
        assert_eq!(receiver.recv_packet(&mut sock).unwrap().as_ref(), b"first");
        assert_eq!(receiver.recv_packet(&mut sock).unwrap().as_ref(), b"second");

        // read-ahead covering everything, nothing from the socket
        let mut receiver = stream();
        receiver.unread_input(&records);
        let mut sock = self::sock(b"");
        assert_eq!(receiver.recv_packet(&mut sock).unwrap().as_ref(), b"first");
        assert_eq!(receiver.recv_packet(&mut sock).unwrap().as_ref(), b"second");
    }

    #[test]
    fn test_truncated_input() {
        let mut sock = sock(&hex!("0000000c 0a 05"));
        let mut receiver = stream();
        assert!(matches!(receiver.recv_packet(&mut sock), Err(Error::PeerClosed)));
    }

    #[test]
    fn test_send_too_large() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut stream = Stream::new(1024, &mut rng).unwrap();
        let mut sock = sock(b"");
        assert!(matches!(
            stream.send_packet(&mut sock, &[0; 2048]),
            Err(Error::Encode(_)),
        ));
        assert_eq!(stream.send_seq(), 0);
        assert!(sock.output.is_empty());
    }

    #[test]
    fn test_max_packet_len_validated() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        assert!(matches!(Stream::new(262145, &mut rng), Err(Error::Config(_))));
        assert!(matches!(Stream::new(4, &mut rng), Err(Error::Config(_))));
        assert!(Stream::new(262144, &mut rng).is_ok());
    }
}
