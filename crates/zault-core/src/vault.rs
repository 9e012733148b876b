//! Orchestrates identity, master key, and block store into the public
//! `add/get/list/verify/share/receive/export/import` surface.

use crate::block::{Block, BlockKind};
use crate::crypto::{aead_decrypt, aead_encrypt, random_array, Sensitive, NONCE_LEN};
use crate::error::{Result, ZaultError};
use crate::identity::Identity;
use crate::metadata::{mime_of, FileMetadata};
use crate::share::{self, ShareToken};
use crate::store::BlockStore;
use std::path::{Path, PathBuf};

pub const MAX_SOURCE_FILE_LEN: u64 = 100 * 1024 * 1024;

pub struct Vault {
    identity: Identity,
    master_key: Sensitive<32>,
    store: BlockStore,
}

#[derive(Debug, Clone)]
pub struct FileInfo {
    pub hash: [u8; 32],
    pub filename: String,
    pub size: u64,
    pub mime_type: String,
    pub created: i64,
}

#[derive(Debug, Clone)]
pub struct ShareInfo {
    pub file_hash: [u8; 32],
    pub content_key: [u8; 32],
    pub content_nonce: [u8; NONCE_LEN],
    pub granted_by: [u8; crate::crypto::DSA_PK_LEN],
}

impl Vault {
    /// If `path/identity.bin` is absent, generate and persist a fresh
    /// identity; otherwise load it. Derives the master key and opens the
    /// block store.
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let identity_path = path.join("identity.bin");
        let identity = if identity_path.is_file() {
            Identity::load(&identity_path)?
        } else {
            let identity = Identity::generate();
            identity.save(&identity_path)?;
            identity
        };
        let master_key = identity.derive_master_key();
        let store = BlockStore::init(path)?;
        Ok(Vault { identity, master_key, store })
    }

    pub fn kem_pk(&self) -> &[u8; crate::crypto::KEM_PK_LEN] {
        &self.identity.kem_pk
    }

    pub fn dsa_pk(&self) -> &[u8; crate::crypto::DSA_PK_LEN] {
        &self.identity.dsa_pk
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    /// Reads `path` (≤100 MiB), encrypts it under a fresh content key, seals
    /// a content block, then seals a metadata block under the vault master
    /// key pointing back at it. Returns the metadata block's hash.
    pub fn add_file(&self, path: &Path) -> Result<[u8; 32]> {
        let len = std::fs::metadata(path)?.len();
        if len > MAX_SOURCE_FILE_LEN {
            return Err(ZaultError::InvalidArgument("source file exceeds 100 MiB".into()));
        }
        let plaintext = std::fs::read(path)?;

        let content_key: [u8; 32] = random_array();
        let content_nonce: [u8; NONCE_LEN] = random_array();
        let content_ciphertext = aead_encrypt(&content_key, &content_nonce, &plaintext)?;

        let content_block = Block::seal(
            BlockKind::Content,
            0,
            self.identity.dsa_sk.expose(),
            self.identity.dsa_pk,
            content_ciphertext,
            content_nonce,
            [0u8; 32],
        )?;
        self.store.put(&content_block.hash, &content_block)?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ZaultError::InvalidArgument("path has no filename".into()))?;
        let mime_type = mime_of(&filename).to_string();

        let file_metadata = FileMetadata {
            version: 1,
            filename,
            size: plaintext.len() as u64,
            mime_type,
            created: 0,
            modified: 0,
            content_hash: content_block.hash,
            content_key: Sensitive::new(content_key),
            content_nonce,
        };

        let meta_nonce: [u8; NONCE_LEN] = random_array();
        let meta_ciphertext = aead_encrypt(self.master_key.expose(), &meta_nonce, &file_metadata.serialize())?;

        let meta_block = Block::seal(
            BlockKind::Metadata,
            0,
            self.identity.dsa_sk.expose(),
            self.identity.dsa_pk,
            meta_ciphertext,
            meta_nonce,
            content_block.hash,
        )?;
        self.store.put(&meta_block.hash, &meta_block)?;

        Ok(meta_block.hash)
    }

    /// Loads the metadata block, verifies it, decrypts and parses it, then
    /// loads and decrypts the referenced content block, writing plaintext
    /// to `out_path`.
    pub fn get_file(&self, hash: &[u8; 32], out_path: &Path) -> Result<()> {
        let meta_block = self.store.get(hash)?;
        if !meta_block.verify_signature() || !meta_block.hash_is_valid_for(hash) {
            return Err(ZaultError::AuthFailed);
        }
        let meta_plaintext = aead_decrypt(self.master_key.expose(), &meta_block.nonce, &meta_block.data)?;
        let file_metadata = FileMetadata::deserialize(&meta_plaintext)?;

        let content_block = self.store.get(&file_metadata.content_hash)?;
        if !content_block.verify_signature() || !content_block.hash_is_valid_for(&file_metadata.content_hash) {
            return Err(ZaultError::AuthFailed);
        }
        let plaintext = aead_decrypt(file_metadata.content_key.expose(), &file_metadata.content_nonce, &content_block.data)?;
        std::fs::write(out_path, plaintext)?;
        Ok(())
    }

    /// Enumerates every block; for each `metadata`-kind block that decrypts
    /// under the master key, collects its summary. Blocks of other kinds,
    /// or metadata blocks that fail to parse or decrypt, are silently
    /// skipped — protocol, not a bug, preserving forward compatibility.
    pub fn list_files(&self) -> Result<Vec<FileInfo>> {
        let mut out = Vec::new();
        let mut skipped = 0u64;
        for hash in self.store.enumerate()? {
            let block = match self.store.get(&hash) {
                Ok(b) => b,
                Err(_) => {
                    skipped += 1;
                    continue;
                }
            };
            if block.kind != BlockKind::Metadata {
                continue;
            }
            if !block.hash_is_valid_for(&hash) {
                skipped += 1;
                continue;
            }
            let plaintext = match aead_decrypt(self.master_key.expose(), &block.nonce, &block.data) {
                Ok(p) => p,
                Err(_) => {
                    skipped += 1;
                    continue;
                }
            };
            let meta = match FileMetadata::deserialize(&plaintext) {
                Ok(m) => m,
                Err(_) => {
                    skipped += 1;
                    continue;
                }
            };
            out.push(FileInfo {
                hash,
                filename: meta.filename,
                size: meta.size,
                mime_type: meta.mime_type,
                created: meta.created,
            });
        }
        if skipped > 0 {
            eprintln!("zault: list_files skipped {skipped} unreadable block(s)");
        }
        Ok(out)
    }

    /// Re-verifies a stored block's signature against the signing preimage.
    pub fn verify_block(&self, hash: &[u8; 32]) -> Result<bool> {
        let block = self.store.get(hash)?;
        Ok(block.verify_signature() && block.hash_is_valid_for(hash))
    }

    /// Loads the metadata block by `file_hash`, decrypts it to recover the
    /// content key/nonce, and wraps a fresh `ShareToken` for `recipient_kem_pk`.
    pub fn create_share(
        &self,
        file_hash: &[u8; 32],
        recipient_kem_pk: &[u8; crate::crypto::KEM_PK_LEN],
        expires_at: i64,
    ) -> Result<Vec<u8>> {
        let meta_block = self.store.get(file_hash)?;
        if !meta_block.verify_signature() || !meta_block.hash_is_valid_for(file_hash) {
            return Err(ZaultError::AuthFailed);
        }
        let meta_plaintext = aead_decrypt(self.master_key.expose(), &meta_block.nonce, &meta_block.data)?;
        let file_metadata = FileMetadata::deserialize(&meta_plaintext)?;

        let token = ShareToken {
            version: 1,
            file_hash: file_metadata.content_hash,
            content_key: *file_metadata.content_key.expose(),
            content_nonce: file_metadata.content_nonce,
            expires_at,
            granted_by: self.identity.dsa_pk,
            granted_at: 0,
        };
        share::encrypt_share(&token, recipient_kem_pk)
    }

    /// Decrypts `token_bytes` with this vault's KEM secret key. Note the
    /// caller supplies a metadata hash to `create_share` but redeems to a
    /// *content* hash here — `get_shared_file` takes the content hash.
    pub fn redeem_share(&self, token_bytes: &[u8]) -> Result<ShareInfo> {
        let token = share::decrypt_share(token_bytes, self.identity.kem_sk.expose())?;
        if token.expires_at != 0 && token.expires_at < now_secs() {
            return Err(ZaultError::ShareExpired);
        }
        Ok(ShareInfo {
            file_hash: token.file_hash,
            content_key: token.content_key,
            content_nonce: token.content_nonce,
            granted_by: token.granted_by,
        })
    }

    /// Loads the content block by `share_info.file_hash`, verifies, decrypts
    /// with the share's key/nonce, writes to `out_path`.
    pub fn get_shared_file(&self, share_info: &ShareInfo, out_path: &Path) -> Result<()> {
        let content_block = self.store.get(&share_info.file_hash)?;
        if !content_block.verify_signature() || !content_block.hash_is_valid_for(&share_info.file_hash) {
            return Err(ZaultError::AuthFailed);
        }
        let plaintext = aead_decrypt(&share_info.content_key, &share_info.content_nonce, &content_block.data)?;
        std::fs::write(out_path, plaintext)?;
        Ok(())
    }

    /// Writes a self-delimited sequence of `u32_le length ‖ block_bytes`
    /// records for the given hashes.
    pub fn export_blocks(&self, hashes: &[[u8; 32]], out_path: &Path) -> Result<()> {
        let mut buf = Vec::new();
        for hash in hashes {
            let block = self.store.get(hash)?;
            let bytes = block.serialize();
            buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            buf.extend_from_slice(&bytes);
        }
        std::fs::write(out_path, buf)?;
        Ok(())
    }

    /// Parses the record stream written by `export_blocks`, `put`s each
    /// block, and returns the hashes observed.
    pub fn import_blocks(&self, in_path: &Path) -> Result<Vec<[u8; 32]>> {
        let buf = std::fs::read(in_path)?;
        let mut off = 0usize;
        let mut out = Vec::new();
        while off < buf.len() {
            if off + 4 > buf.len() {
                return Err(ZaultError::InvalidExportFile);
            }
            let mut len_buf = [0u8; 4];
            len_buf.copy_from_slice(&buf[off..off + 4]);
            let rec_len = u32::from_le_bytes(len_buf) as usize;
            off += 4;
            if off + rec_len > buf.len() {
                return Err(ZaultError::InvalidExportFile);
            }
            let block = Block::deserialize(&buf[off..off + rec_len]).map_err(|_| ZaultError::InvalidExportFile)?;
            off += rec_len;
            self.store.put(&block.hash, &block)?;
            out.push(block.hash);
        }
        Ok(out)
    }
}

fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
