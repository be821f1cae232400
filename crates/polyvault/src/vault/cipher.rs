//! Password sealing of recovery phrases.
//!
//! password --Argon2id(salt)--> base key --HKDF-SHA256(purpose)--> AES-256-GCM key.
//! The Argon2id cost is written into each box so older boxes stay readable
//! after the configured cost changes.

use crate::{errors::WalletError, mnemonic};
use aes_gcm::{
    aead::{Aead as _, KeyInit as _},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine as _;
use eyre::Context as _;
use hkdf::Hkdf;
use rand::Rng as _;
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

const BOX_VERSION: u8 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const MNEMONIC_PURPOSE: &str = "polyvault:vault:mnemonic";
/// Upper bound accepted from a stored box (4 GiB), so a tampered file cannot
/// make unlock allocate without limit.
const MAX_MEMORY_KIB: u32 = 4 * 1024 * 1024;
const MAX_ITERATIONS: u32 = 64;
const MAX_PARALLELISM: u32 = 64;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    /// Same cost as `argon2::Params::DEFAULT` (19 MiB, t=2, p=1), pinned here.
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Minimal cost. Only for tests.
    pub const fn insecure_for_tests() -> Self {
        Self {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn argon2(self) -> eyre::Result<Argon2<'static>> {
        if self.memory_kib > MAX_MEMORY_KIB {
            eyre::bail!("argon2 memory cost too large: {} KiB", self.memory_kib);
        }
        if self.iterations > MAX_ITERATIONS {
            eyre::bail!("argon2 iteration count too large: {}", self.iterations);
        }
        if self.parallelism > MAX_PARALLELISM {
            eyre::bail!("argon2 parallelism too large: {}", self.parallelism);
        }
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, Some(32))
            .map_err(|e| eyre::eyre!("argon2 params: {e}"))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// An encrypted recovery phrase as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedMnemonic {
    pub v: u8,
    pub kdf: KdfParams,
    pub salt_b64: String,
    pub nonce_b64: String,
    pub ct_b64: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VaultCipher {
    params: KdfParams,
}

fn fill_random(buf: &mut [u8]) {
    rand::rng().fill_bytes(buf);
}

fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

fn derive_key(
    password: &SecretString,
    salt: &[u8],
    params: KdfParams,
) -> eyre::Result<Zeroizing<[u8; 32]>> {
    let mut base = Zeroizing::new([0_u8; 32]);
    params
        .argon2()?
        .hash_password_into(password.expose_secret().as_bytes(), salt, base.as_mut())
        .map_err(|e| eyre::eyre!("argon2 hash: {e}"))?;

    let hk = Hkdf::<Sha256>::new(None, base.as_ref());
    let mut key = Zeroizing::new([0_u8; 32]);
    hk.expand(MNEMONIC_PURPOSE.as_bytes(), key.as_mut())
        .map_err(|e| eyre::eyre!("hkdf expand: {e}"))?;
    Ok(key)
}

impl VaultCipher {
    pub const fn new(params: KdfParams) -> Self {
        Self { params }
    }

    pub const fn params(&self) -> KdfParams {
        self.params
    }

    pub fn encrypt(
        &self,
        phrase: &SecretString,
        password: &SecretString,
    ) -> eyre::Result<SealedMnemonic> {
        let mut salt = [0_u8; SALT_LEN];
        fill_random(&mut salt);
        let mut nonce = [0_u8; NONCE_LEN];
        fill_random(&mut nonce);

        let key = derive_key(password, &salt, self.params)?;
        let cipher = Aes256Gcm::new_from_slice(key.as_ref()).context("aes init")?;
        let ct = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                phrase.expose_secret().as_bytes(),
            )
            .map_err(|e| eyre::eyre!("aes encrypt: {e}"))?;

        Ok(SealedMnemonic {
            v: BOX_VERSION,
            kdf: self.params,
            salt_b64: b64().encode(salt),
            nonce_b64: b64().encode(nonce),
            ct_b64: b64().encode(ct),
        })
    }

    /// Every failure, including a plaintext that is not a valid phrase, is
    /// reported as the same [`WalletError::Decryption`].
    pub fn decrypt(
        &self,
        sealed: &SealedMnemonic,
        password: &SecretString,
    ) -> Result<SecretString, WalletError> {
        open(sealed, password).map_err(|e| {
            debug!(error = %e, "vault box did not open");
            WalletError::Decryption
        })
    }
}

fn open(sealed: &SealedMnemonic, password: &SecretString) -> eyre::Result<SecretString> {
    if sealed.v != BOX_VERSION {
        eyre::bail!("unsupported box version: {}", sealed.v);
    }
    let salt = b64().decode(&sealed.salt_b64).context("decode salt")?;
    let nonce = b64().decode(&sealed.nonce_b64).context("decode nonce")?;
    if nonce.len() != NONCE_LEN {
        eyre::bail!("invalid nonce length");
    }
    let ct = b64().decode(&sealed.ct_b64).context("decode ciphertext")?;

    let key = derive_key(password, &salt, sealed.kdf)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_ref()).context("aes init")?;
    let pt = Zeroizing::new(
        cipher
            .decrypt(Nonce::from_slice(&nonce), ct.as_ref())
            .map_err(|e| eyre::eyre!("aes decrypt: {e}"))?,
    );

    let phrase = std::str::from_utf8(&pt).context("plaintext is not utf-8")?;
    if !mnemonic::validate(phrase) {
        eyre::bail!("plaintext is not a valid recovery phrase");
    }
    Ok(SecretString::new(phrase.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::ContextCompat as _;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.to_owned().into())
    }

    fn cipher() -> VaultCipher {
        VaultCipher::new(KdfParams::insecure_for_tests())
    }

    #[test]
    fn round_trip_with_generated_phrase() -> eyre::Result<()> {
        let phrase = mnemonic::generate(mnemonic::DEFAULT_ENTROPY_BITS)?;
        let pw = secret("Tr0ub4dor&3");
        let sealed = cipher().encrypt(&phrase, &pw)?;
        let opened = cipher().decrypt(&sealed, &pw)?;
        assert_eq!(opened.expose_secret(), phrase.expose_secret());
        Ok(())
    }

    #[test]
    fn wrong_password_is_a_generic_decryption_error() -> eyre::Result<()> {
        let sealed = cipher().encrypt(&secret(ABANDON), &secret("right"))?;
        let err = cipher()
            .decrypt(&sealed, &secret("wrong"))
            .err()
            .context("wrong password must fail")?;
        assert_eq!(err, WalletError::Decryption);
        assert_eq!(err.to_string(), "wrong password or corrupted wallet");
        Ok(())
    }

    #[test]
    fn tampering_is_indistinguishable_from_wrong_password() -> eyre::Result<()> {
        let pw = secret("pw");
        let sealed = cipher().encrypt(&secret(ABANDON), &pw)?;

        let mut ct = b64().decode(&sealed.ct_b64)?;
        let first = ct.first_mut().context("empty ciphertext")?;
        *first ^= 0x01;
        let flipped = SealedMnemonic {
            ct_b64: b64().encode(&ct),
            ..sealed.clone()
        };
        let bad_version = SealedMnemonic {
            v: 9,
            ..sealed.clone()
        };
        let bad_b64 = SealedMnemonic {
            nonce_b64: "%%%".to_owned(),
            ..sealed
        };
        for b in [flipped, bad_version, bad_b64] {
            assert_eq!(cipher().decrypt(&b, &pw).err(), Some(WalletError::Decryption));
        }
        Ok(())
    }

    #[test]
    fn non_phrase_plaintext_is_rejected_after_decrypt() -> eyre::Result<()> {
        // Seals arbitrary text; the AEAD tag verifies but the phrase check must not.
        let pw = secret("pw");
        let sealed = cipher().encrypt(&secret("definitely not a phrase"), &pw)?;
        assert_eq!(cipher().decrypt(&sealed, &pw).err(), Some(WalletError::Decryption));
        Ok(())
    }

    #[test]
    fn boxes_are_salted_and_record_their_cost() -> eyre::Result<()> {
        let pw = secret("pw");
        let a = cipher().encrypt(&secret(ABANDON), &pw)?;
        let b = cipher().encrypt(&secret(ABANDON), &pw)?;
        assert_ne!(a.salt_b64, b.salt_b64);
        assert_ne!(a.ct_b64, b.ct_b64);
        assert_eq!(a.kdf, KdfParams::insecure_for_tests());

        // A cipher configured with a different cost still opens old boxes.
        let other = VaultCipher::new(KdfParams {
            memory_kib: 128,
            ..KdfParams::insecure_for_tests()
        });
        assert_eq!(other.decrypt(&a, &pw)?.expose_secret(), ABANDON);
        Ok(())
    }

    #[test]
    fn absurd_stored_cost_is_refused() -> eyre::Result<()> {
        let pw = secret("pw");
        let mut sealed = cipher().encrypt(&secret(ABANDON), &pw)?;
        let huge_memory = SealedMnemonic {
            kdf: KdfParams {
                memory_kib: u32::MAX,
                ..sealed.kdf
            },
            ..sealed.clone()
        };
        let endless = SealedMnemonic {
            kdf: KdfParams {
                iterations: u32::MAX,
                ..sealed.kdf
            },
            ..sealed.clone()
        };
        let wide = SealedMnemonic {
            kdf: KdfParams {
                parallelism: u32::MAX,
                ..sealed.kdf
            },
            ..sealed.clone()
        };
        for b in [huge_memory, endless, wide] {
            assert_eq!(cipher().decrypt(&b, &pw).err(), Some(WalletError::Decryption));
        }
        // Encrypting with such a cost is refused up front.
        sealed.kdf.iterations = u32::MAX;
        assert!(VaultCipher::new(sealed.kdf).encrypt(&secret(ABANDON), &pw).is_err());
        Ok(())
    }
}
