//! Share tokens: a small fixed-layout grant, wrapped for one recipient's
//! ML-KEM-768 public key.

use crate::crypto::{
    self, aead_decrypt, aead_encrypt, kem, random_array, Sensitive, DSA_PK_LEN, KEM_CT_LEN,
    NONCE_LEN,
};
use crate::error::{Result, ZaultError};

pub const CONTENT_HASH_LEN: usize = 32;
pub const CONTENT_KEY_LEN: usize = 32;
pub const CONTENT_NONCE_LEN: usize = 12;

/// `version(1) + file_hash(32) + content_key(32) + content_nonce(12) +
/// expires_at(8) + granted_by(1952) + granted_at(8)`.
pub const SHARE_TOKEN_LEN: usize =
    1 + CONTENT_HASH_LEN + CONTENT_KEY_LEN + CONTENT_NONCE_LEN + 8 + DSA_PK_LEN + 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareToken {
    pub version: u8,
    pub file_hash: [u8; CONTENT_HASH_LEN],
    pub content_key: [u8; CONTENT_KEY_LEN],
    pub content_nonce: [u8; CONTENT_NONCE_LEN],
    pub expires_at: i64,
    pub granted_by: [u8; DSA_PK_LEN],
    pub granted_at: i64,
}

impl ShareToken {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(SHARE_TOKEN_LEN);
        buf.push(self.version);
        buf.extend_from_slice(&self.file_hash);
        buf.extend_from_slice(&self.content_key);
        buf.extend_from_slice(&self.content_nonce);
        buf.extend_from_slice(&self.expires_at.to_le_bytes());
        buf.extend_from_slice(&self.granted_by);
        buf.extend_from_slice(&self.granted_at.to_le_bytes());
        debug_assert_eq!(buf.len(), SHARE_TOKEN_LEN);
        buf
    }

    fn deserialize(buf: &[u8]) -> Result<Self> {
        if buf.len() != SHARE_TOKEN_LEN {
            return Err(ZaultError::InvalidArgument("malformed share token".into()));
        }
        let mut off = 0;
        let version = buf[off];
        off += 1;

        let mut file_hash = [0u8; CONTENT_HASH_LEN];
        file_hash.copy_from_slice(&buf[off..off + CONTENT_HASH_LEN]);
        off += CONTENT_HASH_LEN;

        let mut content_key = [0u8; CONTENT_KEY_LEN];
        content_key.copy_from_slice(&buf[off..off + CONTENT_KEY_LEN]);
        off += CONTENT_KEY_LEN;

        let mut content_nonce = [0u8; CONTENT_NONCE_LEN];
        content_nonce.copy_from_slice(&buf[off..off + CONTENT_NONCE_LEN]);
        off += CONTENT_NONCE_LEN;

        let mut i64_buf = [0u8; 8];
        i64_buf.copy_from_slice(&buf[off..off + 8]);
        let expires_at = i64::from_le_bytes(i64_buf);
        off += 8;

        let mut granted_by = [0u8; DSA_PK_LEN];
        granted_by.copy_from_slice(&buf[off..off + DSA_PK_LEN]);
        off += DSA_PK_LEN;

        i64_buf.copy_from_slice(&buf[off..off + 8]);
        let granted_at = i64::from_le_bytes(i64_buf);

        Ok(ShareToken { version, file_hash, content_key, content_nonce, expires_at, granted_by, granted_at })
    }
}

/// `kem_ct(1088) ‖ nonce(12) ‖ aead(token ‖ tag)`.
pub fn encrypt_share(token: &ShareToken, recipient_kem_pk: &[u8; crate::crypto::KEM_PK_LEN]) -> Result<Vec<u8>> {
    let (kem_ct, shared_secret) = kem::encapsulate(recipient_kem_pk)?;
    let derived_key = Sensitive::new(crypto::hkdf_sha3_256(&shared_secret, crypto::SHARE_TOKEN_INFO));
    let nonce: [u8; NONCE_LEN] = random_array();
    let ciphertext = aead_encrypt(derived_key.expose(), &nonce, &token.serialize())?;

    let mut out = Vec::with_capacity(KEM_CT_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&kem_ct);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Parses the three fields, decapsulates with the vault's KEM secret key,
/// re-derives the key, AEAD-decrypts, and parses the token. A wrong
/// recipient or any tampering surfaces as `AuthFailed`.
pub fn decrypt_share(bytes: &[u8], kem_sk: &[u8; crate::crypto::KEM_SK_LEN]) -> Result<ShareToken> {
    if bytes.len() < KEM_CT_LEN + NONCE_LEN {
        return Err(ZaultError::InvalidArgument("share payload too short".into()));
    }
    let mut kem_ct = [0u8; KEM_CT_LEN];
    kem_ct.copy_from_slice(&bytes[0..KEM_CT_LEN]);
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&bytes[KEM_CT_LEN..KEM_CT_LEN + NONCE_LEN]);
    let ciphertext = &bytes[KEM_CT_LEN + NONCE_LEN..];

    let shared_secret = kem::decapsulate(kem_sk, &kem_ct)?;
    let derived_key = Sensitive::new(crypto::hkdf_sha3_256(&shared_secret, crypto::SHARE_TOKEN_INFO));
    let plaintext = aead_decrypt(derived_key.expose(), &nonce, ciphertext)?;
    ShareToken::deserialize(&plaintext)
}
