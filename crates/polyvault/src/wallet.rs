use crate::vault::cipher::SealedMnemonic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One chain's view of an unlocked wallet. Public data only; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAccount {
    pub chain_id: String,
    pub address: String,
    /// Hex: compressed SEC1 for secp256k1 chains, raw 32 bytes for ed25519 chains.
    pub public_key: String,
    pub derivation_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedWallet {
    pub id: String,
    pub name: String,
    pub encrypted_mnemonic: SealedMnemonic,
    /// Populated only on the current wallet while unlocked.
    #[serde(default, skip_serializing)]
    pub accounts: Vec<WalletAccount>,
    pub created_at: DateTime<Utc>,
}

impl EncryptedWallet {
    pub fn new(name: String, encrypted_mnemonic: SealedMnemonic) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            encrypted_mnemonic,
            accounts: vec![],
            created_at: Utc::now(),
        }
    }

    /// Metadata view without the ciphertext, for listings.
    pub fn summary(&self) -> WalletSummary {
        WalletSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            accounts: self.accounts.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub accounts: usize,
}

/// Process-wide wallet state; `is_unlocked` always starts false.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    pub is_initialized: bool,
    pub is_unlocked: bool,
    pub current_wallet: Option<EncryptedWallet>,
    pub wallets: Vec<EncryptedWallet>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::cipher::{KdfParams, VaultCipher};
    use secrecy::SecretString;

    #[test]
    fn accounts_are_never_written_to_disk() -> eyre::Result<()> {
        let cipher = VaultCipher::new(KdfParams::insecure_for_tests());
        let sealed = cipher.encrypt(
            &SecretString::new("abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about".to_owned().into()),
            &SecretString::new("pw".to_owned().into()),
        )?;
        let mut w = EncryptedWallet::new("main".to_owned(), sealed);
        w.accounts.push(WalletAccount {
            chain_id: "ethereum".to_owned(),
            address: "0x9858effd232b4033e47d90003d41ec34ecaeda94".to_owned(),
            public_key: "02".to_owned(),
            derivation_path: "m/44'/60'/0'/0/0".to_owned(),
        });

        let json = serde_json::to_value(&w)?;
        assert!(json.get("accounts").is_none());
        assert!(json.get("encryptedMnemonic").is_some());
        assert!(json.get("createdAt").is_some());

        let back: EncryptedWallet = serde_json::from_value(json)?;
        assert!(back.accounts.is_empty());
        assert_eq!(back.id, w.id);
        Ok(())
    }
}
