//! Content-addressed filesystem persistence: `blocks/<hex[0..2]>/<hex64>`,
//! written atomically via a `.tmp` sibling and rename.

use crate::block::Block;
use crate::crypto::HASH_LEN;
use crate::error::{Result, ZaultError};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const MAX_BLOCK_READ_LEN: usize = 16 * 1024 * 1024 + 8192;

pub struct BlockStore {
    blocks_dir: PathBuf,
}

impl BlockStore {
    pub fn init(base_path: &Path) -> Result<Self> {
        let blocks_dir = base_path.join("blocks");
        std::fs::create_dir_all(&blocks_dir)?;
        Ok(BlockStore { blocks_dir })
    }

    fn shard_dir(&self, hex: &str) -> PathBuf {
        self.blocks_dir.join(&hex[0..2])
    }

    fn final_path(&self, hash: &[u8; HASH_LEN]) -> PathBuf {
        let hex = hex::encode(hash);
        self.shard_dir(&hex).join(hex)
    }

    /// Serialize and atomically persist a block under its hash. A second
    /// `put` for the same hash overwrites; since the hash covers every
    /// signed field, equal hashes imply equal bytes.
    pub fn put(&self, hash: &[u8; HASH_LEN], block: &Block) -> Result<()> {
        let hex = hex::encode(hash);
        let shard = self.shard_dir(&hex);
        std::fs::create_dir_all(&shard).map_err(|e| ZaultError::StorageFailure(e.to_string()))?;

        let tmp_path = shard.join(format!("{hex}.tmp"));
        let write_result = (|| -> Result<()> {
            let mut f = std::fs::File::create(&tmp_path)?;
            f.write_all(&block.serialize())?;
            f.sync_all()?;
            Ok(())
        })();

        if let Err(e) = write_result {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e);
        }

        std::fs::rename(&tmp_path, shard.join(&hex)).map_err(|e| {
            let _ = std::fs::remove_file(&tmp_path);
            ZaultError::StorageFailure(e.to_string())
        })
    }

    /// `NotFound` if the path is absent, `InvalidBlock` on parse failure or
    /// a read past the 16 MiB block ceiling.
    pub fn get(&self, hash: &[u8; HASH_LEN]) -> Result<Block> {
        let path = self.final_path(hash);
        let meta = std::fs::metadata(&path)?;
        if meta.len() as usize > MAX_BLOCK_READ_LEN {
            return Err(ZaultError::InvalidBlock);
        }
        let bytes = std::fs::read(&path)?;
        Block::deserialize(&bytes)
    }

    pub fn has(&self, hash: &[u8; HASH_LEN]) -> bool {
        self.final_path(hash).is_file()
    }

    /// Recursive walk of `blocks/`, skipping `.tmp` files and any basename
    /// that isn't a 64-character hex string.
    pub fn enumerate(&self) -> Result<Vec<[u8; HASH_LEN]>> {
        let mut out = Vec::new();
        if !self.blocks_dir.is_dir() {
            return Ok(out);
        }
        for shard_entry in std::fs::read_dir(&self.blocks_dir)? {
            let shard_entry = shard_entry?;
            if !shard_entry.file_type()?.is_dir() {
                continue;
            }
            for file_entry in std::fs::read_dir(shard_entry.path())? {
                let file_entry = file_entry?;
                let name = file_entry.file_name();
                let name = match name.to_str() {
                    Some(n) => n,
                    None => continue,
                };
                if name.ends_with(".tmp") || name.len() != 64 {
                    continue;
                }
                if let Ok(bytes) = hex::decode(name) {
                    if bytes.len() == HASH_LEN {
                        let mut hash = [0u8; HASH_LEN];
                        hash.copy_from_slice(&bytes);
                        out.push(hash);
                    }
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockKind;
    use crate::crypto::{dsa, NONCE_LEN};

    fn sample_block() -> ([u8; HASH_LEN], Block) {
        let (pk, sk) = dsa::generate_keypair();
        let block = Block::seal(
            BlockKind::Content,
            0,
            sk.expose(),
            pk,
            b"payload".to_vec(),
            [0u8; NONCE_LEN],
            [0u8; HASH_LEN],
        )
        .unwrap();
        (block.hash, block)
    }

    #[test]
    fn put_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::init(dir.path()).unwrap();
        let (hash, block) = sample_block();
        store.put(&hash, &block).unwrap();
        let loaded = store.get(&hash).unwrap();
        assert_eq!(loaded, block);
        assert!(store.has(&hash));
    }

    #[test]
    fn get_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::init(dir.path()).unwrap();
        let err = store.get(&[0u8; HASH_LEN]).unwrap_err();
        assert!(matches!(err, ZaultError::NotFound));
    }

    #[test]
    fn no_tmp_sibling_survives_a_successful_put() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::init(dir.path()).unwrap();
        let (hash, block) = sample_block();
        store.put(&hash, &block).unwrap();
        let hex = hex::encode(hash);
        let shard = dir.path().join("blocks").join(&hex[0..2]);
        let tmp = shard.join(format!("{hex}.tmp"));
        assert!(!tmp.exists());
    }

    #[test]
    fn enumerate_skips_tmp_and_bad_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::init(dir.path()).unwrap();
        let (hash, block) = sample_block();
        store.put(&hash, &block).unwrap();

        let shard = dir.path().join("blocks").join(&hex::encode(hash)[0..2]);
        std::fs::write(shard.join("deadbeef.tmp"), b"x").unwrap();
        std::fs::write(shard.join("short"), b"x").unwrap();

        let found = store.enumerate().unwrap();
        assert_eq!(found, vec![hash]);
    }

    #[test]
    fn overwrite_with_same_hash_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlockStore::init(dir.path()).unwrap();
        let (hash, block) = sample_block();
        store.put(&hash, &block).unwrap();
        store.put(&hash, &block).unwrap();
        assert_eq!(store.get(&hash).unwrap(), block);
    }
}
