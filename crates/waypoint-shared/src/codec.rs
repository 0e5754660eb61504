//! Versioned encryption of message bodies.
//!
//! Bodies are stored and transmitted as a textual envelope: a short version
//! tag followed by base64.  Two formats exist:
//!
//! * v2 (`wp2:`) -- XChaCha20-Poly1305, nonce prepended.  All new content.
//! * v1 (`wp1:`) -- unauthenticated BLAKE3-XOF keystream XOR.  Deprecated;
//!   only decrypted so old rows stay readable, and upgraded to v2 lazily
//!   after a read.
//!
//! Decryption never fails: input that is not recognizable ciphertext (or
//! that fails to open) is returned unchanged, so a corrupt row degrades to
//! visible garbage instead of crashing the read path.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use tracing::debug;

use crate::constants::{
    CIPHER_V1_TAG, CIPHER_V2_TAG, KDF_CONTEXT_MESSAGE_KEY_V1, KDF_CONTEXT_MESSAGE_KEY_V2,
    NONCE_SIZE,
};
use crate::error::CryptoError;

/// Supported ciphertext envelope versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherVersion {
    /// Deprecated keystream-XOR format.
    V1,
    /// Current AEAD format.
    V2,
}

/// Encrypts and decrypts message bodies.
///
/// Both version keys are derived from one application secret via BLAKE3
/// `derive_key` under version-specific contexts.
pub struct MessageCodec {
    key_v2: [u8; 32],
    key_v1: [u8; 32],
}

impl MessageCodec {
    /// Build a codec from the application message secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key_v2: blake3::derive_key(KDF_CONTEXT_MESSAGE_KEY_V2, secret),
            key_v1: blake3::derive_key(KDF_CONTEXT_MESSAGE_KEY_V1, secret),
        }
    }

    /// Encrypt a plaintext body into the current (v2) envelope.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let cipher = XChaCha20Poly1305::new((&self.key_v2).into());

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = XNonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut payload = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);

        Ok(format!("{}{}", CIPHER_V2_TAG, BASE64.encode(payload)))
    }

    /// Decrypt an envelope.  Returns the input unchanged when it is not
    /// recognizable ciphertext or fails to open.
    pub fn decrypt(&self, value: &str) -> String {
        match Self::version_of(value) {
            Some(CipherVersion::V2) => self
                .decrypt_v2(&value[CIPHER_V2_TAG.len()..])
                .unwrap_or_else(|| {
                    debug!("v2 envelope failed to open, returning raw value");
                    value.to_string()
                }),
            Some(CipherVersion::V1) => self
                .decrypt_v1(&value[CIPHER_V1_TAG.len()..])
                .unwrap_or_else(|| {
                    debug!("v1 envelope failed to open, returning raw value");
                    value.to_string()
                }),
            None => value.to_string(),
        }
    }

    /// Whether the value carries any supported version tag.
    pub fn is_encrypted(value: &str) -> bool {
        Self::version_of(value).is_some()
    }

    /// The envelope version of the value, if any.
    pub fn version_of(value: &str) -> Option<CipherVersion> {
        if value.starts_with(CIPHER_V2_TAG) {
            Some(CipherVersion::V2)
        } else if value.starts_with(CIPHER_V1_TAG) {
            Some(CipherVersion::V1)
        } else {
            None
        }
    }

    /// Re-encrypt a v1 envelope as v2.
    ///
    /// Returns `None` when the input is not a decryptable v1 envelope.  The
    /// caller is expected to rewrite the persisted record in the background;
    /// this function itself does no I/O and never blocks a read.
    pub fn upgrade(&self, value: &str) -> Option<String> {
        if Self::version_of(value) != Some(CipherVersion::V1) {
            return None;
        }
        let plaintext = self.decrypt_v1(&value[CIPHER_V1_TAG.len()..])?;
        self.encrypt(&plaintext).ok()
    }

    fn decrypt_v2(&self, body: &str) -> Option<String> {
        let data = BASE64.decode(body).ok()?;
        if data.len() < NONCE_SIZE {
            return None;
        }
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
        let cipher = XChaCha20Poly1305::new((&self.key_v2).into());
        let plaintext = cipher
            .decrypt(XNonce::from_slice(nonce_bytes), ciphertext)
            .ok()?;
        String::from_utf8(plaintext).ok()
    }

    fn decrypt_v1(&self, body: &str) -> Option<String> {
        let data = BASE64.decode(body).ok()?;
        String::from_utf8(self.xor_keystream(data)).ok()
    }

    /// v1 keystream XOR (symmetric: encrypt == decrypt).
    fn xor_keystream(&self, mut data: Vec<u8>) -> Vec<u8> {
        let mut keystream = vec![0u8; data.len()];
        blake3::Hasher::new_keyed(&self.key_v1)
            .finalize_xof()
            .fill(&mut keystream);
        for (byte, k) in data.iter_mut().zip(keystream) {
            *byte ^= k;
        }
        data
    }

    /// Produce a v1 envelope.  Only used by tests and data migrations; new
    /// content is always v2.
    pub fn encrypt_v1(&self, plaintext: &str) -> String {
        let data = self.xor_keystream(plaintext.as_bytes().to_vec());
        format!("{}{}", CIPHER_V1_TAG, BASE64.encode(data))
    }
}

impl std::fmt::Debug for MessageCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.debug_struct("MessageCodec").finish_non_exhaustive()
    }
}
