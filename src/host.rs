//! Host identity verification.
//!
//! During every key exchange the server presents its host key. After the signature over the
//! exchange hash has been checked, the key is submitted to a [`HostKeyVerify`] hook that decides
//! whether the key may identify the server. [`StoredHostKeys`] is the default hook: it keeps an
//! append-only text file that maps `(host, port)` to a hash of the host key, trusts hosts on
//! first use and rejects keys that changed since they were recorded.
use bytes::Bytes;
use sha2::{Digest as _, Sha256};
use std::fs;
use std::io::Write as _;
use std::path::PathBuf;
use crate::codec::PacketDecode;
use crate::error::{Error, Result};

/// Decision made by a [`HostKeyVerify`] hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKeyVerdict {
    /// The key identifies the host, continue the key exchange.
    Accept,
    /// Continue the key exchange and call [`HostKeyVerify::remember`] for this key.
    AcceptAndRemember,
    /// The key must not be trusted, abort the connection.
    Reject,
}

/// Hook that decides whether a host key identifies a server.
pub trait HostKeyVerify {
    /// Decide whether `key_blob` may identify `host:port`.
    ///
    /// `key_blob` is the raw key in SSH wire encoding, exactly as the server presented it.
    fn verify(&mut self, host: &str, port: u16, key_blob: &[u8]) -> HostKeyVerdict;

    /// Record `key_blob` for `host:port`.
    ///
    /// Called once the key exchange has verified the server's signature, if
    /// [`verify`][Self::verify] returned [`HostKeyVerdict::AcceptAndRemember`].
    fn remember(&mut self, _host: &str, _port: u16, _key_blob: &[u8]) {}
}

/// In-memory list of recorded host keys.
///
/// One record per line: `host port algorithm base64(sha256(key_blob))`, separated by single
/// spaces. Empty lines and lines starting with `#` are comments. Parsing is lenient: lines that
/// cannot be parsed are kept (and written back) verbatim, but never match a key.
#[derive(Debug, Clone, Default)]
pub struct HostKeyStore {
    lines: Vec<Line>,
}

#[derive(Debug, Clone)]
struct Line {
    raw: String,
    content: LineContent,
}

#[derive(Debug, Clone, PartialEq)]
enum LineContent {
    Comment,
    Entry(Entry),
    Error(&'static str),
}

/// A record in a [`HostKeyStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    line_i: usize,
    host: String,
    port: u16,
    algo: String,
    key_hash: String,
}

/// A match returned by [`HostKeyStore::match_host_key()`].
#[derive(Debug, Clone, PartialEq)]
pub enum KeyMatch<'e> {
    /// A recorded key for this host matches the presented key.
    Match(&'e Entry),
    /// The host is recorded, but with a different key.
    Changed(&'e Entry),
    /// The host is not recorded.
    NotFound,
}

impl HostKeyStore {
    /// Parses the text of a host key file.
    ///
    /// This function never fails: unparsable lines are preserved but ignored.
    pub fn parse(data: &str) -> HostKeyStore {
        let lines = data.lines().enumerate()
            .map(|(line_i, raw)| Line {
                raw: raw.into(),
                content: parse_line(raw, line_i),
            })
            .collect();
        HostKeyStore { lines }
    }

    /// Iterates through all records in the store.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.lines.iter().filter_map(|line| match &line.content {
            LineContent::Entry(entry) => Some(entry),
            LineContent::Comment | LineContent::Error(_) => None,
        })
    }

    /// Finds the record for `host:port` and compares it with `key_blob`.
    pub fn match_host_key(&self, host: &str, port: u16, key_blob: &[u8]) -> KeyMatch<'_> {
        let key_hash = key_fingerprint(key_blob);
        let mut changed = None;
        for entry in self.entries() {
            if entry.host != host || entry.port != port {
                continue
            }
            if entry.key_hash == key_hash {
                return KeyMatch::Match(entry)
            }
            changed.get_or_insert(entry);
        }

        match changed {
            Some(entry) => KeyMatch::Changed(entry),
            None => KeyMatch::NotFound,
        }
    }

    /// Appends a record for `host:port` holding the hash of `key_blob`.
    ///
    /// Fails if the algorithm name cannot be read from `key_blob`.
    pub fn add(&mut self, host: &str, port: u16, key_blob: &[u8]) -> Result<()> {
        let entry = Entry {
            line_i: self.lines.len(),
            host: host.into(),
            port,
            algo: key_algo(key_blob)?,
            key_hash: key_fingerprint(key_blob),
        };
        self.lines.push(Line { raw: render_entry(&entry), content: LineContent::Entry(entry) });
        Ok(())
    }

    /// Renders the store back to text, preserving comments and unparsable lines.
    pub fn render(&self) -> String {
        let mut text = String::new();
        for line in self.lines.iter() {
            text.push_str(&line.raw);
            text.push('\n');
        }
        text
    }
}

impl Entry {
    /// The line number of this record, counted from 1.
    pub fn line(&self) -> usize {
        self.line_i + 1
    }

    /// The recorded host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The recorded port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The algorithm name of the recorded key (such as `"ssh-rsa"`).
    pub fn algo(&self) -> &str {
        &self.algo
    }
}

fn parse_line(raw: &str, line_i: usize) -> LineContent {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return LineContent::Comment
    }

    let mut fields = trimmed.split_ascii_whitespace();
    let entry = (|| {
        let host = fields.next().ok_or("expected a hostname")?;
        let port = fields.next().ok_or("expected a port after the hostname")?;
        let port = port.parse().ok().ok_or("port is not a valid number")?;
        let algo = fields.next().ok_or("expected an algorithm name after the port")?;
        let key_hash = fields.next().ok_or("expected a key hash after the algorithm")?;
        if fields.next().is_some() {
            return Err("unexpected data after the key hash")
        }
        Ok(Entry {
            line_i,
            host: host.into(),
            port,
            algo: algo.into(),
            key_hash: key_hash.into(),
        })
    })();

    match entry {
        Ok(entry) => LineContent::Entry(entry),
        Err(msg) => LineContent::Error(msg),
    }
}

fn render_entry(entry: &Entry) -> String {
    format!("{} {} {} {}", entry.host, entry.port, entry.algo, entry.key_hash)
}

fn key_fingerprint(key_blob: &[u8]) -> String {
    base64::encode(Sha256::digest(key_blob))
}

fn key_algo(key_blob: &[u8]) -> Result<String> {
    let mut blob = PacketDecode::new(Bytes::copy_from_slice(key_blob));
    blob.get_string().map_err(|_| Error::Decode("could not read algorithm name from host key"))
}

/// The default [`HostKeyVerify`] hook, backed by a host key file.
///
/// Keys recorded in the file are accepted, keys that differ from the recorded one are rejected,
/// and unknown hosts are trusted on first use: their key is appended to the file once the key
/// exchange has verified the server's signature over it.
#[derive(Debug)]
pub struct StoredHostKeys {
    path: PathBuf,
    store: HostKeyStore,
}

impl StoredHostKeys {
    /// Opens a host key file. A missing file is treated as an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<StoredHostKeys> {
        let path = path.into();
        let store = match fs::read_to_string(&path) {
            Ok(data) => HostKeyStore::parse(&data),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HostKeyStore::default(),
            Err(err) => return Err(Error::ReadIo(err)),
        };
        Ok(StoredHostKeys { path, store })
    }

    /// The records loaded from the file, plus any remembered since.
    pub fn store(&self) -> &HostKeyStore {
        &self.store
    }

    fn append(&mut self, host: &str, port: u16, key_blob: &[u8]) -> Result<()> {
        self.store.add(host, port, key_blob)?;
        let line = self.store.lines.last()
            .map(|line| line.raw.clone())
            .unwrap_or_default();
        let mut file = fs::OpenOptions::new()
            .create(true).append(true)
            .open(&self.path)
            .map_err(Error::WriteIo)?;
        writeln!(file, "{}", line).map_err(Error::WriteIo)?;
        Ok(())
    }
}

impl HostKeyVerify for StoredHostKeys {
    fn verify(&mut self, host: &str, port: u16, key_blob: &[u8]) -> HostKeyVerdict {
        match self.store.match_host_key(host, port, key_blob) {
            KeyMatch::Match(_) => HostKeyVerdict::Accept,
            KeyMatch::Changed(entry) => {
                log::warn!("host key for {}:{} does not match the key recorded on line {}",
                    host, port, entry.line());
                HostKeyVerdict::Reject
            },
            KeyMatch::NotFound => HostKeyVerdict::AcceptAndRemember,
        }
    }

    fn remember(&mut self, host: &str, port: u16, key_blob: &[u8]) {
        if let Err(err) = self.append(host, port, key_blob) {
            log::warn!("could not record host key for {}:{}: {}", host, port, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::codec::PacketEncode;
    use super::*;

    fn key_blob(name: &str, seed: u8) -> Vec<u8> {
        let mut blob = PacketEncode::new();
        blob.put_str(name).unwrap();
        blob.put_bytes(&[seed; 16]).unwrap();
        blob.finish().to_vec()
    }

    #[test]
    fn test_parse() {
        let store = HostKeyStore::parse(concat!(
            "# comment\n",
            "\n",
            "example.com 22 ssh-rsa c29tZSBoYXNo\n",
            "not a valid line at all\n",
            "example.com 2222 ssh-rsa b3RoZXIgaGFzaA==\n",
        ));

        let entries: Vec<_> = store.entries().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].host(), "example.com");
        assert_eq!(entries[0].port(), 22);
        assert_eq!(entries[0].algo(), "ssh-rsa");
        assert_eq!(entries[0].line(), 3);
        assert_eq!(entries[1].port(), 2222);
        assert_eq!(entries[1].line(), 5);
    }

    #[test]
    fn test_match() {
        let blob = key_blob("ssh-rsa", 1);
        let other_blob = key_blob("ssh-rsa", 2);

        let mut store = HostKeyStore::default();
        store.add("example.com", 22, &blob).unwrap();

        assert!(matches!(store.match_host_key("example.com", 22, &blob), KeyMatch::Match(_)));
        assert!(matches!(
            store.match_host_key("example.com", 22, &other_blob),
            KeyMatch::Changed(_),
        ));
        assert!(matches!(
            store.match_host_key("example.com", 2222, &blob),
            KeyMatch::NotFound,
        ));
        assert!(matches!(store.match_host_key("other.com", 22, &blob), KeyMatch::NotFound));
    }

    #[test]
    fn test_render_round_trip() {
        let text = concat!(
            "# keys recorded by tests\n",
            "example.com 22 ssh-rsa c29tZSBoYXNo\n",
            "mangled line kept verbatim\n",
        );
        let mut store = HostKeyStore::parse(text);
        assert_eq!(store.render(), text);

        store.add("other.com", 2222, &key_blob("ssh-rsa", 3)).unwrap();
        let rendered = store.render();
        assert!(rendered.starts_with(text));
        assert!(rendered.lines().last().unwrap().starts_with("other.com 2222 ssh-rsa "));

        let reparsed = HostKeyStore::parse(&rendered);
        assert_eq!(reparsed.entries().count(), 2);
        assert_eq!(reparsed.render(), rendered);
    }

    #[test]
    fn test_add_requires_algo_name() {
        let mut store = HostKeyStore::default();
        assert!(store.add("example.com", 22, &[1, 2, 3]).is_err());
    }

    #[test]
    fn test_stored_host_keys_verify() {
        let path = std::env::temp_dir()
            .join(format!("host-keys-test-{}", std::process::id()));
        let _ = fs::remove_file(&path);

        let blob = key_blob("ssh-rsa", 1);
        let other_blob = key_blob("ssh-rsa", 2);

        // a missing file is an empty store that trusts on first use
        let mut hosts = StoredHostKeys::open(&path).unwrap();
        assert_eq!(hosts.verify("example.com", 22, &blob), HostKeyVerdict::AcceptAndRemember);
        hosts.remember("example.com", 22, &blob);
        assert_eq!(hosts.verify("example.com", 22, &blob), HostKeyVerdict::Accept);

        // the recorded key is found after a reload, and a changed key is rejected
        let mut hosts = StoredHostKeys::open(&path).unwrap();
        assert_eq!(hosts.store().entries().count(), 1);
        assert_eq!(hosts.verify("example.com", 22, &blob), HostKeyVerdict::Accept);
        assert_eq!(hosts.verify("example.com", 22, &other_blob), HostKeyVerdict::Reject);
        assert_eq!(hosts.verify("other.com", 22, &blob), HostKeyVerdict::AcceptAndRemember);

        let _ = fs::remove_file(&path);
    }
}
