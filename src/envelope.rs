//! Envelope decoding module
//!
//! Upstream mirrors occasionally hand out values wrapped in an encrypted
//! envelope: a base64 string whose bytes are laid out as
//! `nonce (12) | tag (16) | ciphertext (..)`. The key is the SHA-256 digest
//! of a secret embedded at build time, and the cipher is AES-256-GCM.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::{Engine, alphabet};
use sha2::{Digest, Sha256};

/// AES-GCM nonce size in bytes
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag size in bytes (128-bit tag)
pub const TAG_LEN: usize = 16;

/// Smallest envelope that can carry at least one byte of ciphertext
const MIN_ENVELOPE_LEN: usize = NONCE_LEN + TAG_LEN + 1;

/// Secret the envelope key is derived from.
///
/// Set `SOURCE_SCOUT_ENVELOPE_SECRET` at build time to embed a different one.
pub const DEFAULT_SECRET: &str = match option_env!("SOURCE_SCOUT_ENVELOPE_SECRET") {
    Some(secret) => secret,
    None => "b3f1c9d27a5e4f60",
};

/// Base64 engine accepting input with or without padding
const ENVELOPE_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decodes envelopes produced with a fixed secret
#[derive(Clone)]
pub struct EnvelopeDecoder {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for EnvelopeDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeDecoder")
            .field("cipher", &"[REDACTED]")
            .finish()
    }
}

impl Default for EnvelopeDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_SECRET)
    }
}

impl EnvelopeDecoder {
    /// Creates a decoder whose key is `SHA-256(secret)`
    pub fn new(secret: &str) -> Self {
        let key = Sha256::digest(secret.as_bytes());
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    /// Decodes an envelope into its plaintext
    ///
    /// Whitespace anywhere in the input is ignored. Returns an empty string
    /// when the input is empty, is not valid base64, is too short to hold a
    /// nonce, tag and at least one ciphertext byte, fails authentication, or
    /// does not decrypt to valid UTF-8.
    ///
    /// # Examples
    ///
    /// ```
    /// use source_scout::EnvelopeDecoder;
    ///
    /// let decoder = EnvelopeDecoder::new("secret");
    /// let envelope = decoder.encode("hello", &[7u8; 12]);
    /// assert_eq!(decoder.decode(&envelope), "hello");
    /// assert_eq!(decoder.decode("not an envelope"), "");
    /// ```
    pub fn decode(&self, encoded: &str) -> String {
        self.try_decode(encoded).unwrap_or_default()
    }

    fn try_decode(&self, encoded: &str) -> Option<String> {
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return None;
        }

        let raw = ENVELOPE_BASE64.decode(compact.as_bytes()).ok()?;
        if raw.len() < MIN_ENVELOPE_LEN {
            return None;
        }

        let (nonce, rest) = raw.split_at(NONCE_LEN);
        let (tag, body) = rest.split_at(TAG_LEN);

        // The cipher expects the tag after the ciphertext
        let mut sealed = Vec::with_capacity(body.len() + TAG_LEN);
        sealed.extend_from_slice(body);
        sealed.extend_from_slice(tag);

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), sealed.as_slice())
            .ok()?;

        String::from_utf8(plaintext).ok()
    }

    /// Seals `plaintext` into an envelope using the given nonce
    ///
    /// Produces the same `nonce | tag | ciphertext` layout that [`decode`]
    /// expects, encoded as padded standard base64.
    ///
    /// [`decode`]: EnvelopeDecoder::decode
    pub fn encode(&self, plaintext: &str, nonce: &[u8; NONCE_LEN]) -> String {
        // Sealing only fails for inputs beyond the AES-GCM length limit
        let Ok(sealed) = self
            .cipher
            .encrypt(Nonce::from_slice(nonce), plaintext.as_bytes())
        else {
            return String::new();
        };

        let (body, tag) = sealed.split_at(sealed.len() - TAG_LEN);

        let mut envelope = Vec::with_capacity(NONCE_LEN + sealed.len());
        envelope.extend_from_slice(nonce);
        envelope.extend_from_slice(tag);
        envelope.extend_from_slice(body);

        base64::engine::general_purpose::STANDARD.encode(envelope)
    }
}

/// Decodes an envelope with the build-embedded secret
///
/// Shorthand for `EnvelopeDecoder::default().decode(encoded)`.
pub fn decode(encoded: &str) -> String {
    EnvelopeDecoder::default().decode(encoded)
}
