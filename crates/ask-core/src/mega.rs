//! MEGA object-store download.
//!
//! A public file link is `https://mega.nz/file/<id>#<key>`. The key is 32
//! bytes of base64url: the AES-128 file key is the XOR of both halves, bytes
//! 16..24 are the CTR nonce and bytes 24..32 the condensed chunk MAC. The
//! file id is resolved through the `cs` API into a temporary download URL
//! whose body is the CTR ciphertext.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit, KeyIvInit, StreamCipher};
use aes::Aes128;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::token::SessionToken;

pub const MEGA_HOST: &str = "mega.nz";
pub const MEGA_API_URL: &str = "https://g.api.mega.co.nz";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const EAGAIN: i64 = -3;
const MAX_EAGAIN_RETRIES: u32 = 3;
const FIRST_CHUNK: u64 = 128 * 1024;
const MAX_CHUNK: u64 = 1024 * 1024;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

// ── Remote object ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub host: String,
    pub file_id: String,
    pub key: String,
}

impl RemoteObject {
    pub fn from_token(token: &SessionToken, host: &str) -> Self {
        Self {
            host: host.to_string(),
            file_id: token.file_id.clone(),
            key: token.key.clone(),
        }
    }

    pub fn url(&self) -> String {
        format!("https://{}/file/{}#{}", self.host, self.file_id, self.key)
    }
}

/// Anything that can hand back the full plaintext of a remote object.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn download(&self, object: &RemoteObject) -> Result<Vec<u8>, FetchError>;
}

// ── File key ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileKey {
    pub aes_key: [u8; 16],
    pub nonce: [u8; 8],
    pub meta_mac: [u8; 8],
}

impl FileKey {
    pub fn decode(encoded: &str) -> Result<Self, FetchError> {
        let raw = general_purpose::URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map_err(|e| FetchError::InvalidKey(e.to_string()))?;
        if raw.len() != 32 {
            return Err(FetchError::InvalidKey(format!(
                "expected 32 bytes, got {}",
                raw.len()
            )));
        }
        let mut aes_key = [0u8; 16];
        for (i, byte) in aes_key.iter_mut().enumerate() {
            *byte = raw[i] ^ raw[i + 16];
        }
        let mut nonce = [0u8; 8];
        nonce.copy_from_slice(&raw[16..24]);
        let mut meta_mac = [0u8; 8];
        meta_mac.copy_from_slice(&raw[24..32]);
        Ok(Self {
            aes_key,
            nonce,
            meta_mac,
        })
    }

    pub fn encode(&self) -> String {
        let mut raw = [0u8; 32];
        raw[16..24].copy_from_slice(&self.nonce);
        raw[24..32].copy_from_slice(&self.meta_mac);
        for i in 0..16 {
            raw[i] = self.aes_key[i] ^ raw[i + 16];
        }
        general_purpose::URL_SAFE_NO_PAD.encode(raw)
    }

    /// Encrypt `plaintext` the way an uploader does and return the
    /// ciphertext together with the resulting link key.
    pub fn seal(aes_key: [u8; 16], nonce: [u8; 8], plaintext: &[u8]) -> (Vec<u8>, Self) {
        let meta_mac = condensed_mac(&aes_key, &nonce, plaintext);
        let key = Self {
            aes_key,
            nonce,
            meta_mac,
        };
        let mut data = plaintext.to_vec();
        key.apply_keystream(&mut data);
        (data, key)
    }

    /// Decrypt and verify a downloaded body.
    pub fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>, FetchError> {
        let mut data = ciphertext.to_vec();
        self.apply_keystream(&mut data);
        if condensed_mac(&self.aes_key, &self.nonce, &data) != self.meta_mac {
            return Err(FetchError::MacMismatch);
        }
        Ok(data)
    }

    fn apply_keystream(&self, data: &mut [u8]) {
        let mut iv = [0u8; 16];
        iv[..8].copy_from_slice(&self.nonce);
        let mut cipher = Aes128Ctr::new(
            GenericArray::from_slice(&self.aes_key),
            GenericArray::from_slice(&iv),
        );
        cipher.apply_keystream(data);
    }
}

// ── Chunk MAC ───────────────────────────────────────────────────────────────

/// CBC-MAC per chunk; chunks grow by 128 KiB up to 1 MiB.
struct ChunkMac {
    cipher: Aes128,
    seed: [u8; 16],
    mac: [u8; 16],
    macs: Vec<[u8; 16]>,
    pos: u64,
    chunk_start: u64,
    next_boundary: u64,
    increment: u64,
}

impl ChunkMac {
    fn new(aes_key: &[u8; 16], nonce: &[u8; 8]) -> Self {
        let mut seed = [0u8; 16];
        seed[..8].copy_from_slice(nonce);
        seed[8..].copy_from_slice(nonce);
        Self {
            cipher: Aes128::new(GenericArray::from_slice(aes_key)),
            seed,
            mac: seed,
            macs: Vec::new(),
            pos: 0,
            chunk_start: 0,
            next_boundary: FIRST_CHUNK,
            increment: FIRST_CHUNK,
        }
    }

    fn update(&mut self, data: &[u8]) {
        for block in data.chunks(16) {
            for (m, b) in self.mac.iter_mut().zip(block) {
                *m ^= b;
            }
            self.mac = self.encrypt(self.mac);
            self.pos += 16;
            if self.pos >= self.next_boundary {
                self.macs.push(self.mac);
                self.mac = self.seed;
                self.chunk_start = self.pos;
                if self.increment < MAX_CHUNK {
                    self.increment += FIRST_CHUNK;
                }
                self.next_boundary += self.increment;
            }
        }
    }

    fn condense(mut self) -> [u8; 8] {
        if self.pos > self.chunk_start || self.macs.is_empty() {
            self.macs.push(self.mac);
        }
        let mut acc = [0u8; 16];
        for chunk_mac in &self.macs {
            for (a, m) in acc.iter_mut().zip(chunk_mac) {
                *a ^= m;
            }
            acc = self.encrypt(acc);
        }
        let mut out = [0u8; 8];
        for i in 0..4 {
            out[i] = acc[i] ^ acc[i + 4];
            out[i + 4] = acc[i + 8] ^ acc[i + 12];
        }
        out
    }

    fn encrypt(&self, block: [u8; 16]) -> [u8; 16] {
        let mut ga = GenericArray::clone_from_slice(&block);
        self.cipher.encrypt_block(&mut ga);
        let mut out = [0u8; 16];
        out.copy_from_slice(&ga);
        out
    }
}

fn condensed_mac(aes_key: &[u8; 16], nonce: &[u8; 8], plaintext: &[u8]) -> [u8; 8] {
    let mut mac = ChunkMac::new(aes_key, nonce);
    mac.update(plaintext);
    mac.condense()
}

// ── API client ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTicket {
    pub url: String,
    pub size: u64,
}

pub struct MegaClient {
    http: reqwest::Client,
    api_url: String,
    seq: AtomicU64,
}

impl MegaClient {
    /// `timeout` bounds every request, including the body download.
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent("ask-xmd/0.1")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            seq: AtomicU64::new(u64::from(rand::random::<u32>())),
        })
    }

    pub async fn resolve(&self, file_id: &str) -> Result<DownloadTicket, FetchError> {
        let mut attempt = 0;
        loop {
            let id = self.seq.fetch_add(1, Ordering::Relaxed);
            let url = format!("{}/cs?id={}", self.api_url, id);
            let body = serde_json::json!([{ "a": "g", "g": 1, "ssl": 0, "p": file_id }]);
            let res = self.http.post(url).json(&body).send().await?;
            if !res.status().is_success() {
                return Err(FetchError::Status(res.status().as_u16()));
            }
            let value: Value = res.json().await?;
            match parse_api_response(value) {
                Err(FetchError::Api { code }) if code == EAGAIN && attempt < MAX_EAGAIN_RETRIES => {
                    attempt += 1;
                    warn!(attempt, "storage api asked to retry");
                    tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl RemoteStore for MegaClient {
    async fn download(&self, object: &RemoteObject) -> Result<Vec<u8>, FetchError> {
        let key = FileKey::decode(&object.key)?;
        let ticket = self.resolve(&object.file_id).await?;
        debug!(size = ticket.size, "download ticket issued");
        let res = self.http.get(&ticket.url).send().await?;
        if !res.status().is_success() {
            return Err(FetchError::Status(res.status().as_u16()));
        }
        let body = res.bytes().await?;
        if body.len() as u64 != ticket.size {
            return Err(FetchError::SizeMismatch {
                expected: ticket.size,
                actual: body.len() as u64,
            });
        }
        let plaintext = key.open(&body)?;
        info!(bytes = plaintext.len(), file_id = %object.file_id, "remote object downloaded");
        Ok(plaintext)
    }
}

pub fn parse_api_response(value: Value) -> Result<DownloadTicket, FetchError> {
    let first = match value {
        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        number @ Value::Number(_) => number,
        other => return Err(FetchError::UnexpectedResponse(other.to_string())),
    };
    if let Some(code) = first.as_i64() {
        return Err(FetchError::Api { code });
    }
    if let Some(code) = first.get("e").and_then(Value::as_i64) {
        return Err(FetchError::Api { code });
    }
    let url = first.get("g").and_then(Value::as_str);
    let size = first.get("s").and_then(Value::as_u64);
    match (url, size) {
        (Some(url), Some(size)) => Ok(DownloadTicket {
            url: url.to_string(),
            size,
        }),
        _ => Err(FetchError::UnexpectedResponse(first.to_string())),
    }
}
