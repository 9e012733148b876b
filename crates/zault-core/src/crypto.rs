//! Crypto facade: named, fixed-parameter re-exports of the five primitives
//! Zault is built on. Nothing upstream of this module reaches into
//! `pqcrypto_*`, `chacha20poly1305`, `hkdf`, or `sha3` directly — callers
//! only see fixed-size byte arrays and the functions below.

use crate::error::{Result, ZaultError};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce as ChaChaNonce};
use hkdf::Hkdf;
use rand_chacha::ChaCha20Rng;
use rand_chacha::rand_core::{RngCore, SeedableRng};
use sha3::{Digest, Sha3_256};
use std::cell::RefCell;
use std::fmt;
use std::io::Read;
use std::sync::{Mutex, OnceLock};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

#[cfg(feature = "pq")]
use pqcrypto_mldsa::mldsa65;
#[cfg(feature = "pq")]
use pqcrypto_mlkem::mlkem768;
#[cfg(feature = "pq")]
use pqcrypto_traits::kem::{
    Ciphertext as KemCiphertextTrait, PublicKey as KemPublicKeyTrait,
    SecretKey as KemSecretKeyTrait, SharedSecret as KemSharedSecretTrait,
};
#[cfg(feature = "pq")]
use pqcrypto_traits::sign::{
    DetachedSignature as DetachedSignatureTrait, PublicKey as SignPublicKeyTrait,
    SecretKey as SignSecretKeyTrait,
};

/// ML-DSA-65 (FIPS 204) fixed sizes.
pub const DSA_PK_LEN: usize = 1952;
pub const DSA_SK_LEN: usize = 4032;
pub const DSA_SIG_LEN: usize = 3309;

/// ML-KEM-768 (FIPS 203) fixed sizes.
pub const KEM_PK_LEN: usize = 1184;
pub const KEM_SK_LEN: usize = 2400;
pub const KEM_CT_LEN: usize = 1088;
pub const SHARED_SECRET_LEN: usize = 32;

pub const HASH_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const AEAD_TAG_LEN: usize = 16;

/// HKDF info label for `derive_master_key`. Byte-exact, part of the protocol.
pub const MASTER_KEY_INFO: &[u8] = b"zault-vault-master-key-v1";
/// HKDF info label for `derive_share_key`. Byte-exact, part of the protocol.
pub const SHARE_TOKEN_INFO: &[u8] = b"zault-share-token-v1";

/// A fixed-size secret byte buffer, zeroized on drop. Primitive key handles
/// (pqcrypto's opaque `SecretKey`/`PublicKey` types) are reconstructed from
/// these bytes lazily at the point of use rather than held live.
pub struct Sensitive<const N: usize>([u8; N]);

impl<const N: usize> Sensitive<N> {
    pub fn new(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    pub fn expose(&self) -> &[u8; N] {
        &self.0
    }
}

impl<const N: usize> Drop for Sensitive<N> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<const N: usize> Clone for Sensitive<N> {
    fn clone(&self) -> Self {
        Self(self.0)
    }
}

/// Constant-time, to avoid leaking secret bytes through comparison timing.
impl<const N: usize> PartialEq for Sensitive<N> {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl<const N: usize> Eq for Sensitive<N> {}

impl<const N: usize> fmt::Debug for Sensitive<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sensitive<{N}>(REDACTED)")
    }
}

pub fn sha3_256(data: &[u8]) -> [u8; HASH_LEN] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; HASH_LEN];
    out.copy_from_slice(&digest);
    out
}

/// HKDF-SHA3-256 with an empty extract salt, matching §4.4's construction
/// for both the share-token key and the vault master key.
pub fn hkdf_sha3_256(ikm: &[u8], info: &[u8]) -> [u8; 32] {
    let hk = Hkdf::<Sha3_256>::new(None, ikm);
    let mut out = [0u8; 32];
    hk.expand(info, &mut out).expect("32 bytes is a valid HKDF-SHA3-256 output length");
    out
}

/// ChaCha20-Poly1305 AEAD encrypt with empty associated data. Returns
/// `ciphertext || tag`.
pub fn aead_encrypt(key: &[u8; 32], nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| ZaultError::CryptoError(e.to_string()))?;
    cipher
        .encrypt(ChaChaNonce::from_slice(nonce), Payload { msg: plaintext, aad: &[] })
        .map_err(|_| ZaultError::CryptoError("aead encrypt failed".into()))
}

/// ChaCha20-Poly1305 AEAD decrypt with empty associated data. Any
/// authentication failure surfaces as `ZaultError::AuthFailed`.
pub fn aead_decrypt(key: &[u8; 32], nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| ZaultError::CryptoError(e.to_string()))?;
    cipher
        .decrypt(ChaChaNonce::from_slice(nonce), Payload { msg: ciphertext, aad: &[] })
        .map_err(|_| ZaultError::AuthFailed)
}

pub mod dsa {
    use super::*;

    pub fn generate_keypair() -> ([u8; DSA_PK_LEN], Sensitive<DSA_SK_LEN>) {
        #[cfg(feature = "pq")]
        {
            let (pk, sk) = mldsa65::keypair();
            let mut pk_bytes = [0u8; DSA_PK_LEN];
            pk_bytes.copy_from_slice(pk.as_bytes());
            let mut sk_bytes = [0u8; DSA_SK_LEN];
            sk_bytes.copy_from_slice(sk.as_bytes());
            (pk_bytes, Sensitive::new(sk_bytes))
        }
        #[cfg(not(feature = "pq"))]
        {
            panic!("ML-DSA-65 not available without the 'pq' feature");
        }
    }

    pub fn sign(sk: &[u8; DSA_SK_LEN], msg: &[u8]) -> Result<[u8; DSA_SIG_LEN]> {
        #[cfg(feature = "pq")]
        {
            let sk = mldsa65::SecretKey::from_bytes(sk)
                .map_err(|_| ZaultError::CryptoError("invalid ML-DSA-65 secret key".into()))?;
            let sig = mldsa65::detached_sign(msg, &sk);
            let mut out = [0u8; DSA_SIG_LEN];
            out.copy_from_slice(sig.as_bytes());
            Ok(out)
        }
        #[cfg(not(feature = "pq"))]
        {
            let _ = (sk, msg);
            Err(ZaultError::CryptoError("ML-DSA-65 not available without the 'pq' feature".into()))
        }
    }

    pub fn verify(pk: &[u8; DSA_PK_LEN], msg: &[u8], sig: &[u8; DSA_SIG_LEN]) -> bool {
        #[cfg(feature = "pq")]
        {
            let pk = match mldsa65::PublicKey::from_bytes(pk) {
                Ok(pk) => pk,
                Err(_) => return false,
            };
            let sig = match mldsa65::DetachedSignature::from_bytes(sig) {
                Ok(sig) => sig,
                Err(_) => return false,
            };
            mldsa65::verify_detached_signature(&sig, msg, &pk).is_ok()
        }
        #[cfg(not(feature = "pq"))]
        {
            let _ = (pk, msg, sig);
            false
        }
    }
}

pub mod kem {
    use super::*;

    pub fn generate_keypair() -> ([u8; KEM_PK_LEN], Sensitive<KEM_SK_LEN>) {
        #[cfg(feature = "pq")]
        {
            let (pk, sk) = mlkem768::keypair();
            let mut pk_bytes = [0u8; KEM_PK_LEN];
            pk_bytes.copy_from_slice(pk.as_bytes());
            let mut sk_bytes = [0u8; KEM_SK_LEN];
            sk_bytes.copy_from_slice(sk.as_bytes());
            (pk_bytes, Sensitive::new(sk_bytes))
        }
        #[cfg(not(feature = "pq"))]
        {
            panic!("ML-KEM-768 not available without the 'pq' feature");
        }
    }

    pub fn encapsulate(pk: &[u8; KEM_PK_LEN]) -> Result<([u8; KEM_CT_LEN], [u8; SHARED_SECRET_LEN])> {
        #[cfg(feature = "pq")]
        {
            let pk = mlkem768::PublicKey::from_bytes(pk)
                .map_err(|_| ZaultError::CryptoError("invalid ML-KEM-768 public key".into()))?;
            let (ss, ct) = mlkem768::encapsulate(&pk);
            let mut ct_bytes = [0u8; KEM_CT_LEN];
            ct_bytes.copy_from_slice(ct.as_bytes());
            let mut ss_bytes = [0u8; SHARED_SECRET_LEN];
            ss_bytes.copy_from_slice(ss.as_bytes());
            Ok((ct_bytes, ss_bytes))
        }
        #[cfg(not(feature = "pq"))]
        {
            let _ = pk;
            Err(ZaultError::CryptoError("ML-KEM-768 not available without the 'pq' feature".into()))
        }
    }

    pub fn decapsulate(
        sk: &[u8; KEM_SK_LEN],
        ct: &[u8; KEM_CT_LEN],
    ) -> Result<[u8; SHARED_SECRET_LEN]> {
        #[cfg(feature = "pq")]
        {
            let sk = mlkem768::SecretKey::from_bytes(sk)
                .map_err(|_| ZaultError::CryptoError("invalid ML-KEM-768 secret key".into()))?;
            let ct = mlkem768::Ciphertext::from_bytes(ct)
                .map_err(|_| ZaultError::CryptoError("invalid ML-KEM-768 ciphertext".into()))?;
            let ss = mlkem768::decapsulate(&ct, &sk);
            let mut out = [0u8; SHARED_SECRET_LEN];
            out.copy_from_slice(ss.as_bytes());
            Ok(out)
        }
        #[cfg(not(feature = "pq"))]
        {
            let _ = (sk, ct);
            Err(ZaultError::CryptoError("ML-KEM-768 not available without the 'pq' feature".into()))
        }
    }
}

// --- Randomness -------------------------------------------------------
//
// pqcrypto's keypair() functions draw randomness from the process's single
// registered `getrandom` backend; there is no seed parameter on the safe
// API. To support `Identity::from_seed` (spec.md §4.5/§8 scenario 1) without
// patching the vendored PQClean bindings, we register our own backend once
// and give it a thread-local override slot: when a deterministic scope is
// active, every draw — including the ones buried inside `mldsa65::keypair()`
// and `mlkem768::keypair()` — comes from a ChaCha20 stream reseeded from the
// caller's 32-byte seed instead of the OS.

thread_local! {
    static DETERMINISTIC: RefCell<Option<ChaCha20Rng>> = RefCell::new(None);
}

static SHARED_RNG: OnceLock<Mutex<ChaCha20Rng>> = OnceLock::new();

fn os_entropy_32() -> [u8; 32] {
    let mut seed = [0u8; 32];
    if let Ok(mut f) = std::fs::File::open("/dev/urandom") {
        if f.read_exact(&mut seed).is_ok() {
            return seed;
        }
    }
    // Extremely unlikely fallback path on a system without /dev/urandom;
    // mix in ASLR/time jitter so we never hand out an all-zero seed.
    let addr = &seed as *const _ as usize;
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let mixed = sha3_256(format!("{addr:x}{nanos:x}").as_bytes());
    mixed
}

fn shared_rng() -> &'static Mutex<ChaCha20Rng> {
    SHARED_RNG.get_or_init(|| Mutex::new(ChaCha20Rng::from_seed(os_entropy_32())))
}

fn zault_getrandom(buf: &mut [u8]) -> std::result::Result<(), getrandom::Error> {
    DETERMINISTIC.with(|slot| {
        if let Some(rng) = slot.borrow_mut().as_mut() {
            rng.fill_bytes(buf);
        } else {
            shared_rng().lock().expect("rng mutex poisoned").fill_bytes(buf);
        }
        Ok(())
    })
}

getrandom::register_custom_getrandom!(zault_getrandom);

/// Run `f` with the process's randomness source pinned to a deterministic
/// stream derived from `seed`. Used only by `Identity::from_seed`.
pub fn with_deterministic_seed<T>(seed: [u8; 32], f: impl FnOnce() -> T) -> T {
    DETERMINISTIC.with(|slot| *slot.borrow_mut() = Some(ChaCha20Rng::from_seed(seed)));
    let result = f();
    DETERMINISTIC.with(|slot| *slot.borrow_mut() = None);
    result
}

pub fn random_array<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    shared_rng().lock().expect("rng mutex poisoned").fill_bytes(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hkdf_is_deterministic() {
        let ikm = [7u8; 32];
        let a = hkdf_sha3_256(&ikm, MASTER_KEY_INFO);
        let b = hkdf_sha3_256(&ikm, MASTER_KEY_INFO);
        assert_eq!(a, b);
    }

    #[test]
    fn hkdf_labels_are_domain_separated() {
        let ikm = [7u8; 32];
        let a = hkdf_sha3_256(&ikm, MASTER_KEY_INFO);
        let b = hkdf_sha3_256(&ikm, SHARE_TOKEN_INFO);
        assert_ne!(a, b);
    }

    #[test]
    fn aead_round_trip() {
        let key = [1u8; 32];
        let nonce = [2u8; NONCE_LEN];
        let pt = b"hello quantum world";
        let ct = aead_encrypt(&key, &nonce, pt).unwrap();
        let back = aead_decrypt(&key, &nonce, &ct).unwrap();
        assert_eq!(back, pt);
    }

    #[test]
    fn aead_tamper_fails() {
        let key = [1u8; 32];
        let nonce = [2u8; NONCE_LEN];
        let mut ct = aead_encrypt(&key, &nonce, b"hello").unwrap();
        ct[0] ^= 0x80;
        assert!(matches!(aead_decrypt(&key, &nonce, &ct), Err(ZaultError::AuthFailed)));
    }

    #[cfg(feature = "pq")]
    #[test]
    fn deterministic_dsa_keypair_matches_across_calls() {
        let seed = [0x42u8; 32];
        let (pk1, _) = with_deterministic_seed(seed, dsa::generate_keypair);
        let (pk2, _) = with_deterministic_seed(seed, dsa::generate_keypair);
        assert_eq!(pk1, pk2);
    }

    #[cfg(feature = "pq")]
    #[test]
    fn dsa_sign_verify_round_trip() {
        let (pk, sk) = dsa::generate_keypair();
        let msg = b"zault block preimage";
        let sig = dsa::sign(sk.expose(), msg).unwrap();
        assert!(dsa::verify(&pk, msg, &sig));
    }

    #[cfg(feature = "pq")]
    #[test]
    fn kem_round_trip() {
        let (pk, sk) = kem::generate_keypair();
        let (ct, ss1) = kem::encapsulate(&pk).unwrap();
        let ss2 = kem::decapsulate(sk.expose(), &ct).unwrap();
        assert_eq!(ss1, ss2);
    }
}
