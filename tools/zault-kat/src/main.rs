//! Standalone known-answer-test checker for Zault's wire primitives.
//! Reimplements HKDF-SHA3-256 and ChaCha20-Poly1305 independently of
//! `zault-core` so a fixture failure points at a real protocol drift
//! rather than a shared bug.

use aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use hkdf::Hkdf;
use serde::Deserialize;
use sha3::Sha3_256;

#[derive(Deserialize)]
struct Kat {
    hkdf: HkdfKat,
    aead: AeadKat,
}

#[derive(Deserialize)]
struct HkdfKat {
    ikm_hex: String,
    info_utf8: String,
    expected_hex: String,
}

#[derive(Deserialize)]
struct AeadKat {
    key_hex: String,
    nonce_hex: String,
    plaintext_hex: String,
    ciphertext_hex: String,
}

fn hex_to<const N: usize>(s: &str) -> anyhow::Result<[u8; N]> {
    let v = hex::decode(s)?;
    anyhow::ensure!(v.len() == N, "expected {N} bytes, got {}", v.len());
    let mut out = [0u8; N];
    out.copy_from_slice(&v);
    Ok(out)
}

fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1).expect("usage: zault-kat file.json");
    let data = std::fs::read_to_string(path)?;
    let kat: Kat = serde_json::from_str(&data)?;

    let ikm = hex::decode(&kat.hkdf.ikm_hex)?;
    let hk = Hkdf::<Sha3_256>::new(None, &ikm);
    let mut derived = [0u8; 32];
    hk.expand(kat.hkdf.info_utf8.as_bytes(), &mut derived)
        .map_err(|_| anyhow::anyhow!("HKDF expand failed"))?;
    let expected = hex_to::<32>(&kat.hkdf.expected_hex)?;
    anyhow::ensure!(derived == expected, "HKDF-SHA3-256 output mismatch");

    let key = hex_to::<32>(&kat.aead.key_hex)?;
    let nonce_bytes = hex_to::<12>(&kat.aead.nonce_hex)?;
    let plaintext = hex::decode(&kat.aead.plaintext_hex)?;
    let expected_ct = hex::decode(&kat.aead.ciphertext_hex)?;

    let cipher = ChaCha20Poly1305::new_from_slice(&key)?;
    let ct = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), Payload { msg: &plaintext, aad: &[] })
        .map_err(|_| anyhow::anyhow!("AEAD encrypt failed"))?;
    anyhow::ensure!(ct == expected_ct, "ChaCha20-Poly1305 ciphertext mismatch");

    println!("KAT OK");
    Ok(())
}
