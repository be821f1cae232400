//! BIP-39 recovery phrases: generation, validation and phrase → seed stretching.

use crate::errors::WalletError;
use bip39::{Language, Mnemonic};
use rand::Rng as _;
use secrecy::{ExposeSecret as _, SecretString};
use tracing::debug;
use zeroize::{Zeroize as _, Zeroizing};

/// Default entropy size: 128 bits -> 12 words.
pub const DEFAULT_ENTROPY_BITS: usize = 128;

/// Seed bytes stretched from a phrase (or supplied directly, e.g. for test vectors).
///
/// BIP-32 accepts 16..=64 byte seeds; BIP-39 always produces 64.
pub struct Seed(Zeroizing<Vec<u8>>);

impl Seed {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(Zeroizing::new(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Seed").field("len", &self.0.len()).finish()
    }
}

fn fill_entropy(buf: &mut [u8]) {
    // The thread RNG is seeded from the OS; it panics instead of falling back if that fails.
    rand::rng().fill_bytes(buf);
}

/// Generate a fresh English phrase with `entropy_bits` of CSPRNG entropy.
pub fn generate(entropy_bits: usize) -> eyre::Result<SecretString> {
    if !matches!(entropy_bits, 128 | 160 | 192 | 224 | 256) {
        debug!(entropy_bits, "unsupported entropy size");
        return Err(WalletError::InvalidMnemonic.into());
    }
    let mut entropy = Zeroizing::new(vec![0_u8; entropy_bits / 8]);
    fill_entropy(&mut entropy);
    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
        .map_err(|e| {
            debug!(error = %e, "entropy rejected");
            WalletError::InvalidMnemonic
        })?;
    let phrase = mnemonic.to_string();
    Ok(SecretString::new(phrase.into()))
}

fn parse(phrase: &str) -> Result<Mnemonic, WalletError> {
    Mnemonic::parse_in_normalized(Language::English, phrase.trim())
        .map_err(|e| {
            debug!(error = %e, "phrase rejected");
            WalletError::InvalidMnemonic
        })
}

/// Word count, word list membership and checksum.
pub fn validate(phrase: &str) -> bool {
    parse(phrase).is_ok()
}

/// Stretch a phrase into its 64-byte BIP-39 seed (empty passphrase).
pub fn to_seed(phrase: &SecretString) -> Result<Seed, WalletError> {
    let mnemonic = parse(phrase.expose_secret())?;
    let mut raw = mnemonic.to_seed_normalized("");
    let seed = Seed::from_bytes(&raw);
    raw.zeroize();
    Ok(seed)
}
