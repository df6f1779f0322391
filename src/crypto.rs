//! Webhook signatures and safe-mode encryption
//!
//! Plain mode only signs: `signature = SHA1(sort(token, timestamp, nonce))`.
//! Safe mode additionally encrypts payloads with AES-256-CBC, the key being
//! the base64-decoded EncodingAESKey and the IV its first 16 bytes.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use rand::RngCore;
use sha1::{Digest, Sha1};

use crate::error::{Result, WechatError};
use crate::xml::{self, XmlNode};

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

/// Keys are 43 characters, so the last one carries bits beyond byte 32
const KEY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Safe-mode cipher for one account
#[derive(Clone)]
pub struct WechatCrypto {
    key: [u8; 32],
    app_id: String,
}

impl WechatCrypto {
    /// Create from the 43-character EncodingAESKey and the AppID
    pub fn new(encoding_aes_key: &str, app_id: &str) -> Result<Self> {
        let encoding_aes_key = encoding_aes_key.trim();

        if encoding_aes_key.len() != 43 {
            return Err(WechatError::Crypto(format!(
                "EncodingAESKey must be 43 characters, got {}",
                encoding_aes_key.len()
            )));
        }

        let decoded = KEY_ENGINE
            .decode(encoding_aes_key)
            .map_err(|e| WechatError::Crypto(format!("Invalid EncodingAESKey: {}", e)))?;

        let key: [u8; 32] = decoded.try_into().map_err(|v: Vec<u8>| {
            WechatError::Crypto(format!("Decoded key must be 32 bytes, got {}", v.len()))
        })?;

        Ok(Self {
            key,
            app_id: app_id.to_string(),
        })
    }

    /// Generate signature
    pub fn sign(token: &str, timestamp: &str, nonce: &str) -> String {
        sha1_sorted(&mut [token, timestamp, nonce])
    }

    /// Verify a plain-mode signature
    pub fn verify(token: &str, timestamp: &str, nonce: &str, signature: &str) -> bool {
        Self::sign(token, timestamp, nonce) == signature
    }

    /// Signature over an encrypted payload
    pub fn sign_message(token: &str, timestamp: &str, nonce: &str, encrypted_msg: &str) -> String {
        sha1_sorted(&mut [token, timestamp, nonce, encrypted_msg])
    }

    /// Verify a safe-mode `msg_signature`
    pub fn verify_message(
        token: &str,
        timestamp: &str,
        nonce: &str,
        encrypted_msg: &str,
        msg_signature: &str,
    ) -> bool {
        Self::sign_message(token, timestamp, nonce, encrypted_msg) == msg_signature
    }

    /// Decrypt a payload
    ///
    /// Format: random(16) + msg_len(4) + msg + app_id
    pub fn decrypt(&self, encrypted: &str) -> Result<String> {
        let mut buf = STANDARD
            .decode(encrypted)
            .map_err(|e| WechatError::Crypto(format!("Invalid base64 payload: {}", e)))?;

        if buf.len() < 32 || buf.len() % 16 != 0 {
            return Err(WechatError::Crypto(format!(
                "Encrypted payload has invalid length {}",
                buf.len()
            )));
        }

        let cipher = Aes256CbcDec::new_from_slices(&self.key, &self.key[..16])
            .map_err(|e| WechatError::Crypto(e.to_string()))?;
        let plain = cipher
            .decrypt_padded_mut::<Pkcs7>(&mut buf)
            .map_err(|_| WechatError::Crypto("Bad PKCS7 padding".to_string()))?;

        if plain.len() < 20 {
            return Err(WechatError::Crypto(format!(
                "Decrypted payload too short: {} bytes",
                plain.len()
            )));
        }

        let msg_len = u32::from_be_bytes([plain[16], plain[17], plain[18], plain[19]]) as usize;
        let body = &plain[20..];
        if body.len() < msg_len {
            return Err(WechatError::Crypto(format!(
                "Declared length {} exceeds payload {}",
                msg_len,
                body.len()
            )));
        }

        let (msg, app_id) = body.split_at(msg_len);
        if app_id != self.app_id.as_bytes() {
            return Err(WechatError::Crypto(format!(
                "AppID mismatch: expected '{}', got '{}'",
                self.app_id,
                String::from_utf8_lossy(app_id)
            )));
        }

        String::from_utf8(msg.to_vec())
            .map_err(|e| WechatError::Crypto(format!("Payload is not UTF-8: {}", e)))
    }

    /// Encrypt a payload
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut random = [0u8; 16];
        rand::rng().fill_bytes(&mut random);
        self.encrypt_with_prefix(plaintext, random)
    }

    fn encrypt_with_prefix(&self, plaintext: &str, random: [u8; 16]) -> Result<String> {
        let msg = plaintext.as_bytes();
        let app_id = self.app_id.as_bytes();
        let total_len = 20 + msg.len() + app_id.len();

        // PKCS7 always adds between 1 and 16 bytes
        let padded_len = (total_len / 16 + 1) * 16;
        let mut buf = Vec::with_capacity(padded_len);
        buf.extend_from_slice(&random);
        buf.extend_from_slice(&(msg.len() as u32).to_be_bytes());
        buf.extend_from_slice(msg);
        buf.extend_from_slice(app_id);
        buf.resize(padded_len, 0);

        let cipher = Aes256CbcEnc::new_from_slices(&self.key, &self.key[..16])
            .map_err(|e| WechatError::Crypto(e.to_string()))?;
        let encrypted = cipher
            .encrypt_padded_mut::<Pkcs7>(&mut buf, total_len)
            .map_err(|_| WechatError::Crypto("Failed to encrypt payload".to_string()))?;

        Ok(STANDARD.encode(encrypted))
    }

    /// Wrap a reply in the encrypted envelope
    pub fn encrypt_reply(&self, reply: &str, token: &str, timestamp: &str, nonce: &str) -> Result<String> {
        let encrypted = self.encrypt(reply)?;
        let signature = Self::sign_message(token, timestamp, nonce, &encrypted);

        Ok(xml::build(
            "xml",
            &XmlNode::element()
                .text("Encrypt", encrypted)
                .text("MsgSignature", signature)
                .raw("TimeStamp", timestamp)
                .text("Nonce", nonce),
        ))
    }
}

fn sha1_sorted(parts: &mut [&str]) -> String {
    parts.sort_unstable();
    hex::encode(Sha1::digest(parts.concat().as_bytes()))
}
