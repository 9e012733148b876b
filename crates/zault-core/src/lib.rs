//! Zault: a local, content-addressed, post-quantum authenticated,
//! zero-knowledge encrypted object store.
//!
//! A vault is a directory holding a persistent dual-keypair identity
//! (ML-DSA-65 for signing, ML-KEM-768 for share encapsulation) and a set of
//! signed, encrypted blocks. Files are admitted through [`Vault::add_file`],
//! which splits them into a content block (encrypted under a unique
//! per-file key) and a metadata block (encrypted under a vault-wide master
//! key, pointing back at the content block). The handle returned to callers
//! is always the metadata block's hash.
//!
//! This crate is the core: identity, block format, store, and share
//! protocol. Command-line surfaces, network transport, and bindings to
//! other languages are out of scope — see [`Vault`] and [`BlockStore`] for
//! the two interfaces external collaborators are expected to build on.

pub mod block;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod metadata;
pub mod share;
pub mod store;
pub mod vault;

pub use block::{Block, BlockKind};
pub use error::{Result, ZaultError};
pub use identity::Identity;
pub use metadata::FileMetadata;
pub use share::ShareToken;
pub use store::BlockStore;
pub use vault::{FileInfo, ShareInfo, Vault};
