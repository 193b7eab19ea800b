//! OHTTP gateway key configurations.
//!
//! A gateway publishes its HPKE keys as an `application/ohttp-keys` body: a
//! sequence of key configurations, each prefixed by a 2-byte big-endian
//! length. A single configuration is laid out as
//!
//! ```text
//! key_id (1) | kem_id (2) | public_key (Npk) | suites_len (2) | (kdf_id (2) | aead_id (2))*
//! ```
//!
//! Only the framing is validated here. Encapsulation is left to the
//! transport, which receives the original bytes untouched.

use crate::error::{DapError, Result};

/// HPKE key encapsulation mechanisms a gateway may advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kem {
    /// DHKEM(P-256, HKDF-SHA256)
    P256Sha256,
    /// DHKEM(X25519, HKDF-SHA256)
    X25519Sha256,
}

impl Kem {
    pub fn from_id(id: u16) -> Option<Self> {
        match id {
            0x0010 => Some(Self::P256Sha256),
            0x0020 => Some(Self::X25519Sha256),
            _ => None,
        }
    }

    pub fn id(self) -> u16 {
        match self {
            Self::P256Sha256 => 0x0010,
            Self::X25519Sha256 => 0x0020,
        }
    }

    /// Encoded public key length (Npk).
    pub fn public_key_len(self) -> usize {
        match self {
            Self::P256Sha256 => 65,
            Self::X25519Sha256 => 32,
        }
    }
}

/// A KDF/AEAD pair the gateway accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymmetricSuite {
    pub kdf_id: u16,
    pub aead_id: u16,
}

/// One parsed key configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyConfig {
    pub key_id: u8,
    pub kem: Kem,
    pub public_key: Vec<u8>,
    pub suites: Vec<SymmetricSuite>,
}

/// The full set of key configurations served by a gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayKeys {
    configs: Vec<KeyConfig>,
    encoded: Vec<u8>,
}

impl GatewayKeys {
    /// Parse an `application/ohttp-keys` body.
    ///
    /// Configurations using an unknown KEM are skipped. A body with no usable
    /// configuration is rejected.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(body);
        let mut configs = Vec::new();

        while !reader.is_empty() {
            let len = reader.u16()? as usize;
            let entry = reader.take(len)?;
            if let Some(config) = parse_config(entry)? {
                configs.push(config);
            }
        }

        if configs.is_empty() {
            return Err(DapError::KeyConfig(
                "no key configuration with a supported KEM".into(),
            ));
        }

        Ok(Self {
            configs,
            encoded: body.to_vec(),
        })
    }

    pub fn configs(&self) -> &[KeyConfig] {
        &self.configs
    }

    /// The configuration the transport should encapsulate to.
    pub fn primary(&self) -> &KeyConfig {
        &self.configs[0]
    }

    /// The body exactly as served by the gateway.
    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }
}

fn parse_config(entry: &[u8]) -> Result<Option<KeyConfig>> {
    let mut reader = Reader::new(entry);
    let key_id = reader.u8()?;
    let kem_id = reader.u16()?;

    let Some(kem) = Kem::from_id(kem_id) else {
        tracing::debug!(kem_id, key_id, "Skipping key config with unsupported KEM");
        return Ok(None);
    };

    let public_key = reader.take(kem.public_key_len())?.to_vec();

    let suites_len = reader.u16()? as usize;
    if suites_len == 0 || suites_len % 4 != 0 {
        return Err(DapError::KeyConfig(format!(
            "invalid cipher suite length {suites_len}"
        )));
    }
    let mut suites_reader = Reader::new(reader.take(suites_len)?);
    let mut suites = Vec::with_capacity(suites_len / 4);
    while !suites_reader.is_empty() {
        suites.push(SymmetricSuite {
            kdf_id: suites_reader.u16()?,
            aead_id: suites_reader.u16()?,
        });
    }

    if !reader.is_empty() {
        return Err(DapError::KeyConfig(format!(
            "{} trailing bytes in key config {key_id}",
            reader.remaining()
        )));
    }

    Ok(Some(KeyConfig {
        key_id,
        kem,
        public_key,
        suites,
    }))
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() < n {
            return Err(DapError::KeyConfig(format!(
                "truncated: wanted {n} bytes, {} left",
                self.buf.len()
            )));
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }
}
