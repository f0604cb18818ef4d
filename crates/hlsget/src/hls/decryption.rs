// HLS decryption: fetching AES-128 keys and decrypting segment payloads.

use std::fmt;

use aes::Aes128;
use bytes::Bytes;
use cbc::cipher::{BlockDecryptMut, KeyIvInit, block_padding::Pkcs7};
use tracing::debug;
use url::Url;

use crate::hls::HlsError;
use crate::hls::config::IvPolicy;
use crate::hls::playlist::EncryptionKey;
use crate::transport::ResilientTransport;

/// AES block size in bytes, also the AES-128 key length.
pub const AES_BLOCK_SIZE: usize = 16;

pub const ZERO_IV: [u8; AES_BLOCK_SIZE] = [0u8; AES_BLOCK_SIZE];

type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Raw key bytes fetched for one media playlist.
#[derive(Clone)]
pub struct KeyMaterial {
    pub uri: Url,
    bytes: [u8; AES_BLOCK_SIZE],
}

impl KeyMaterial {
    pub fn new(uri: Url, raw: &[u8]) -> Result<Self, HlsError> {
        let bytes: [u8; AES_BLOCK_SIZE] = raw.try_into().map_err(|_| HlsError::InvalidKey {
            url: uri.to_string(),
            message: format!(
                "incorrect length: {} bytes (expected {AES_BLOCK_SIZE})",
                raw.len()
            ),
        })?;
        Ok(Self { uri, bytes })
    }
}

// Keep key bytes out of logs.
impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("uri", &self.uri.as_str())
            .finish_non_exhaustive()
    }
}

/// Fetches raw key data through the resilient transport.
#[derive(Debug, Clone)]
pub struct KeyFetcher {
    transport: ResilientTransport,
}

impl KeyFetcher {
    pub fn new(transport: ResilientTransport) -> Self {
        Self { transport }
    }

    pub async fn fetch_key(&self, key: &EncryptionKey) -> Result<KeyMaterial, HlsError> {
        let raw = self.transport.get_bytes(key.uri.as_str()).await?;
        debug!(uri = %key.uri, "Fetched decryption key");
        KeyMaterial::new(key.uri.clone(), &raw)
    }
}

/// IV derived from a media sequence number, as RFC 8216 prescribes when
/// `#EXT-X-KEY` carries no `IV` attribute.
pub fn sequence_iv(sequence: u64) -> [u8; AES_BLOCK_SIZE] {
    let mut iv = ZERO_IV;
    iv[8..].copy_from_slice(&sequence.to_be_bytes());
    iv
}

/// IV used to decrypt the segment with the given media sequence number.
pub fn segment_iv(policy: IvPolicy, key: &EncryptionKey, sequence: u64) -> [u8; AES_BLOCK_SIZE] {
    match policy {
        IvPolicy::Zero => ZERO_IV,
        IvPolicy::Playlist => key.iv.unwrap_or_else(|| sequence_iv(sequence)),
    }
}

/// Decrypt one AES-128-CBC segment and strip its PKCS#7 padding.
///
/// An empty segment decrypts to nothing.
pub fn decrypt_segment(
    data: &[u8],
    key: &KeyMaterial,
    iv: &[u8; AES_BLOCK_SIZE],
    segment_url: &Url,
) -> Result<Bytes, HlsError> {
    if data.is_empty() {
        return Ok(Bytes::new());
    }
    if data.len() % AES_BLOCK_SIZE != 0 {
        return Err(HlsError::Decryption {
            url: segment_url.to_string(),
            message: format!(
                "ciphertext length {} is not a multiple of {AES_BLOCK_SIZE}",
                data.len()
            ),
        });
    }

    let cipher = Aes128CbcDec::new_from_slices(&key.bytes, iv).map_err(|e| {
        HlsError::Decryption {
            url: segment_url.to_string(),
            message: format!("Failed to initialize AES decryptor: {e}"),
        }
    })?;

    let mut buffer = data.to_vec();
    let decrypted_len = cipher
        .decrypt_padded_mut::<Pkcs7>(&mut buffer)
        .map_err(|e| HlsError::Decryption {
            url: segment_url.to_string(),
            message: e.to_string(),
        })?
        .len();
    buffer.truncate(decrypted_len);

    Ok(Bytes::from(buffer))
}
