//! Public key → display address.
//!
//! Only `Ethereum` produces a real on-chain address. `Bitcoin`, `SolanaLike`
//! and `Generic` are stable placeholders: deterministic and unique per key, but
//! not wire-compatible with the chains' own encodings.

use crate::{
    chains::{AddressFormat, ChainDescriptor},
    derivation::PublicKey,
    errors::WalletError,
};
use alloy::primitives::keccak256;
use base64::Engine as _;
use bitcoin::hashes::{hash160, Hash as _};
use sha2::{Digest as _, Sha256};

const SOLANA_LIKE_LEN: usize = 44;
const GENERIC_HEX_LEN: usize = 40;

pub fn encode(chain: &ChainDescriptor, public_key: &PublicKey) -> Result<String, WalletError> {
    match chain.address_format {
        AddressFormat::Ethereum => Ok(ethereum(secp256k1_key(chain, public_key)?)),
        AddressFormat::Bitcoin => Ok(bitcoin_placeholder(secp256k1_key(chain, public_key)?)),
        AddressFormat::SolanaLike => {
            let PublicKey::Ed25519(vk) = public_key else {
                return Err(WalletError::chain(chain.id, "expected an ed25519 key"));
            };
            Ok(solana_like_placeholder(vk))
        }
        AddressFormat::Generic => Ok(generic_placeholder(chain.id, &public_key.to_bytes())),
    }
}

fn secp256k1_key<'a>(
    chain: &ChainDescriptor,
    public_key: &'a PublicKey,
) -> Result<&'a bitcoin::secp256k1::PublicKey, WalletError> {
    match public_key {
        PublicKey::Secp256k1(pk) => Ok(pk),
        PublicKey::Ed25519(_) => Err(WalletError::chain(chain.id, "expected a secp256k1 key")),
    }
}

/// `0x` + lowercase hex of the last 20 bytes of keccak256(X || Y).
fn ethereum(pk: &bitcoin::secp256k1::PublicKey) -> String {
    let uncompressed = pk.serialize_uncompressed();
    let (_, xy) = uncompressed.split_at(1);
    let hash = keccak256(xy);
    let (_, tail) = hash.as_slice().split_at(12);
    format!("0x{}", hex::encode(tail))
}

/// Base58 of HASH160(compressed key), without version byte or checksum.
fn bitcoin_placeholder(pk: &bitcoin::secp256k1::PublicKey) -> String {
    let h = hash160::Hash::hash(&pk.serialize());
    bs58::encode(h.to_byte_array()).into_string()
}

/// Standard base64 of the raw key, cut to 44 characters.
fn solana_like_placeholder(vk: &ed25519_dalek::VerifyingKey) -> String {
    let mut s = base64::engine::general_purpose::STANDARD.encode(vk.as_bytes());
    s.truncate(SOLANA_LIKE_LEN);
    s
}

/// Chain id followed by the first 40 hex chars of sha256(key bytes).
fn generic_placeholder(chain_id: &str, key: &[u8]) -> String {
    let mut digest = hex::encode(Sha256::digest(key));
    digest.truncate(GENERIC_HEX_LEN);
    format!("{chain_id}{digest}")
}
