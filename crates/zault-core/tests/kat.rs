//! Known-answer tests for wire-format sizes and field ordering named in the
//! data model: ML-DSA-65 (pk 1952, sk 4032, sig 3309), ML-KEM-768 (pk 1184,
//! sk 2400, ct 1088), and the fixed-width records built on top of them.

use zault_core::block::{Block, BlockKind, MAX_BLOCK_DATA_LEN};
use zault_core::crypto::{
    dsa, Sensitive, DSA_PK_LEN, DSA_SIG_LEN, DSA_SK_LEN, KEM_CT_LEN, KEM_PK_LEN, KEM_SK_LEN, NONCE_LEN,
};
use zault_core::identity::IDENTITY_LEN;
use zault_core::metadata::FileMetadata;
use zault_core::share::SHARE_TOKEN_LEN;

#[test]
fn primitive_sizes_match_fips_203_204() {
    assert_eq!(DSA_PK_LEN, 1952);
    assert_eq!(DSA_SK_LEN, 4032);
    assert_eq!(DSA_SIG_LEN, 3309);
    assert_eq!(KEM_PK_LEN, 1184);
    assert_eq!(KEM_SK_LEN, 2400);
    assert_eq!(KEM_CT_LEN, 1088);
}

#[test]
fn identity_file_length_is_fixed() {
    // version(1) + dsa_pk(1952) + dsa_sk(4032) + kem_pk(1184) + kem_sk(2400) + created_at(8)
    assert_eq!(IDENTITY_LEN, 1 + 1952 + 4032 + 1184 + 2400 + 8);
    assert_eq!(IDENTITY_LEN, 9577);
}

#[test]
fn share_token_length_is_fixed() {
    // version(1) + file_hash(32) + content_key(32) + content_nonce(12) + expires_at(8) + granted_by(1952) + granted_at(8)
    assert_eq!(SHARE_TOKEN_LEN, 1 + 32 + 32 + 12 + 8 + 1952 + 8);
    assert_eq!(SHARE_TOKEN_LEN, 2045);
}

#[test]
fn share_envelope_length_is_fixed() {
    // kem_ct(1088) + nonce(12) + (token(2045) + tag(16))
    let envelope_len = KEM_CT_LEN + NONCE_LEN + SHARE_TOKEN_LEN + 16;
    assert_eq!(envelope_len, 3161);
}

#[test]
fn on_disk_block_length_matches_field_widths() {
    let (pk, sk) = dsa::generate_keypair();
    let data = b"known answer payload".to_vec();
    let data_len = data.len();
    let block = Block::seal(BlockKind::Content, 0, sk.expose(), pk, data, [0u8; NONCE_LEN], [0u8; 32]).unwrap();
    let bytes = block.serialize();

    // version(1)+kind(1)+timestamp(8)+author(1952)+nonce(12)+data_len(4)+data+prev_hash(32)+signature(3309)+hash(32)
    let expected_len = 1 + 1 + 8 + DSA_PK_LEN + NONCE_LEN + 4 + data_len + 32 + DSA_SIG_LEN + 32;
    assert_eq!(bytes.len(), expected_len);
}

#[test]
fn block_data_ceiling_is_16_mib() {
    assert_eq!(MAX_BLOCK_DATA_LEN, 16 * 1024 * 1024);
}

#[test]
fn file_metadata_field_order_round_trips_byte_exact() {
    let m = FileMetadata {
        version: 1,
        filename: "known.bin".to_string(),
        size: 12345,
        mime_type: "application/octet-stream".to_string(),
        created: 0,
        modified: 0,
        content_hash: [0xaa; 32],
        content_key: Sensitive::new([0xbb; 32]),
        content_nonce: [0xcc; 12],
    };
    let bytes = m.serialize();

    // byte 0 is version
    assert_eq!(bytes[0], 1);
    // bytes 1..5 are the little-endian filename length
    let filename_len = u32::from_le_bytes(bytes[1..5].try_into().unwrap()) as usize;
    assert_eq!(filename_len, "known.bin".len());
    assert_eq!(&bytes[5..5 + filename_len], b"known.bin");

    let back = FileMetadata::deserialize(&bytes).unwrap();
    assert_eq!(m, back);
}
