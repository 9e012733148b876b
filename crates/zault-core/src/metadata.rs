//! Per-file metadata, stored plaintext-shaped but living only ever inside a
//! metadata block's encrypted `data`.

use crate::crypto::Sensitive;
use crate::error::{Result, ZaultError};

pub const CONTENT_HASH_LEN: usize = 32;
pub const CONTENT_KEY_LEN: usize = 32;
pub const CONTENT_NONCE_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub version: u8,
    pub filename: String,
    pub size: u64,
    pub mime_type: String,
    pub created: i64,
    pub modified: i64,
    pub content_hash: [u8; CONTENT_HASH_LEN],
    pub content_key: Sensitive<CONTENT_KEY_LEN>,
    pub content_nonce: [u8; CONTENT_NONCE_LEN],
}

impl FileMetadata {
    /// `version ‖ filename_len_le4 ‖ filename ‖ size_le8 ‖ mime_len_le4 ‖ mime ‖
    /// created_le8 ‖ modified_le8 ‖ content_hash ‖ content_key ‖ content_nonce`.
    pub fn serialize(&self) -> Vec<u8> {
        let filename_bytes = self.filename.as_bytes();
        let mime_bytes = self.mime_type.as_bytes();
        let mut buf = Vec::with_capacity(
            1 + 4 + filename_bytes.len() + 8 + 4 + mime_bytes.len() + 8 + 8
                + CONTENT_HASH_LEN + CONTENT_KEY_LEN + CONTENT_NONCE_LEN,
        );
        buf.push(self.version);
        buf.extend_from_slice(&(filename_bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(filename_bytes);
        buf.extend_from_slice(&self.size.to_le_bytes());
        buf.extend_from_slice(&(mime_bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(mime_bytes);
        buf.extend_from_slice(&self.created.to_le_bytes());
        buf.extend_from_slice(&self.modified.to_le_bytes());
        buf.extend_from_slice(&self.content_hash);
        buf.extend_from_slice(self.content_key.expose());
        buf.extend_from_slice(&self.content_nonce);
        buf
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self> {
        let mut off = 0usize;
        let need = |off: usize, n: usize| -> Result<()> {
            if off + n > buf.len() {
                Err(ZaultError::InvalidMetadata)
            } else {
                Ok(())
            }
        };

        need(off, 1)?;
        let version = buf[off];
        off += 1;

        need(off, 4)?;
        let mut len_buf = [0u8; 4];
        len_buf.copy_from_slice(&buf[off..off + 4]);
        let filename_len = u32::from_le_bytes(len_buf) as usize;
        off += 4;
        need(off, filename_len)?;
        let filename = String::from_utf8(buf[off..off + filename_len].to_vec())
            .map_err(|_| ZaultError::InvalidMetadata)?;
        off += filename_len;

        need(off, 8)?;
        let mut size_buf = [0u8; 8];
        size_buf.copy_from_slice(&buf[off..off + 8]);
        let size = u64::from_le_bytes(size_buf);
        off += 8;

        need(off, 4)?;
        len_buf.copy_from_slice(&buf[off..off + 4]);
        let mime_len = u32::from_le_bytes(len_buf) as usize;
        off += 4;
        need(off, mime_len)?;
        let mime_type = String::from_utf8(buf[off..off + mime_len].to_vec())
            .map_err(|_| ZaultError::InvalidMetadata)?;
        off += mime_len;

        need(off, 8)?;
        let mut ts_buf = [0u8; 8];
        ts_buf.copy_from_slice(&buf[off..off + 8]);
        let created = i64::from_le_bytes(ts_buf);
        off += 8;

        need(off, 8)?;
        ts_buf.copy_from_slice(&buf[off..off + 8]);
        let modified = i64::from_le_bytes(ts_buf);
        off += 8;

        need(off, CONTENT_HASH_LEN)?;
        let mut content_hash = [0u8; CONTENT_HASH_LEN];
        content_hash.copy_from_slice(&buf[off..off + CONTENT_HASH_LEN]);
        off += CONTENT_HASH_LEN;

        need(off, CONTENT_KEY_LEN)?;
        let mut content_key = [0u8; CONTENT_KEY_LEN];
        content_key.copy_from_slice(&buf[off..off + CONTENT_KEY_LEN]);
        off += CONTENT_KEY_LEN;

        need(off, CONTENT_NONCE_LEN)?;
        let mut content_nonce = [0u8; CONTENT_NONCE_LEN];
        content_nonce.copy_from_slice(&buf[off..off + CONTENT_NONCE_LEN]);
        off += CONTENT_NONCE_LEN;

        if off != buf.len() {
            return Err(ZaultError::InvalidMetadata);
        }

        Ok(FileMetadata {
            version,
            filename,
            size,
            mime_type,
            created,
            modified,
            content_hash,
            content_key: Sensitive::new(content_key),
            content_nonce,
        })
    }
}

/// Fixed extension table; anything unrecognized is `application/octet-stream`.
pub fn mime_of(filename: &str) -> &'static str {
    let ext = filename.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("zip") => "application/zip",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FileMetadata {
        FileMetadata {
            version: 1,
            filename: "hello.txt".to_string(),
            size: 20,
            mime_type: "text/plain".to_string(),
            created: 0,
            modified: 0,
            content_hash: [1u8; CONTENT_HASH_LEN],
            content_key: Sensitive::new([2u8; CONTENT_KEY_LEN]),
            content_nonce: [3u8; CONTENT_NONCE_LEN],
        }
    }

    #[test]
    fn round_trips() {
        let m = sample();
        let bytes = m.serialize();
        let back = FileMetadata::deserialize(&bytes).unwrap();
        assert_eq!(m, back);
    }

    #[test]
    fn rejects_truncated_buffer() {
        let m = sample();
        let mut bytes = m.serialize();
        bytes.truncate(bytes.len() - 5);
        assert!(matches!(FileMetadata::deserialize(&bytes), Err(ZaultError::InvalidMetadata)));
    }

    #[test]
    fn rejects_trailing_bytes() {
        let m = sample();
        let mut bytes = m.serialize();
        bytes.push(0);
        assert!(matches!(FileMetadata::deserialize(&bytes), Err(ZaultError::InvalidMetadata)));
    }

    #[test]
    fn mime_table() {
        assert_eq!(mime_of("a.txt"), "text/plain");
        assert_eq!(mime_of("a.md"), "text/markdown");
        assert_eq!(mime_of("a.PDF"), "application/pdf");
        assert_eq!(mime_of("a.png"), "image/png");
        assert_eq!(mime_of("a.jpg"), "image/jpeg");
        assert_eq!(mime_of("a.jpeg"), "image/jpeg");
        assert_eq!(mime_of("a.zip"), "application/zip");
        assert_eq!(mime_of("a.json"), "application/json");
        assert_eq!(mime_of("a.bin"), "application/octet-stream");
        assert_eq!(mime_of("noext"), "application/octet-stream");
    }
}
