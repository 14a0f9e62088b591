//! Local keypair signer.

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use secrecy::{ExposeSecret, SecretString};
use solana_sdk::{
    hash::Hash,
    signer::{Signer, keypair::Keypair},
    transaction::Transaction,
};
use tracing::{debug, instrument};

use crate::domain::{AppError, ConfigError, TransactionError, WalletSigner};

/// Signs with a keypair held in process memory. Approval is implicit.
pub struct KeypairWallet {
    keypair: Keypair,
}

impl KeypairWallet {
    pub fn from_signing_key(signing_key: &SigningKey) -> Result<Self, AppError> {
        let keypair_bytes = signing_key.to_keypair_bytes();
        let keypair = Keypair::try_from(keypair_bytes.as_slice()).map_err(|e| {
            AppError::Config(ConfigError::InvalidValue {
                name: "WALLET_PRIVATE_KEY".to_string(),
                message: format!("Failed to create keypair: {}", e),
            })
        })?;
        Ok(Self { keypair })
    }

    pub fn from_base58(secret: &SecretString) -> Result<Self, AppError> {
        Self::from_signing_key(&signing_key_from_base58(secret)?)
    }

    #[must_use]
    pub fn public_key(&self) -> String {
        self.keypair.pubkey().to_string()
    }
}

#[async_trait]
impl WalletSigner for KeypairWallet {
    fn address(&self) -> Option<String> {
        Some(self.public_key())
    }

    #[instrument(skip(self, transaction))]
    async fn sign_transaction(
        &self,
        mut transaction: Transaction,
    ) -> Result<Transaction, TransactionError> {
        let blockhash: Hash = transaction.message.recent_blockhash;
        transaction
            .try_sign(&[&self.keypair], blockhash)
            .map_err(|e| TransactionError::UserRejected(e.to_string()))?;
        debug!(signer = %self.public_key(), "Transaction signed");
        Ok(transaction)
    }
}

/// Parse a base58-encoded private key into a SigningKey
pub fn signing_key_from_base58(secret: &SecretString) -> Result<SigningKey, AppError> {
    let invalid = |message: String| {
        AppError::Config(ConfigError::InvalidValue {
            name: "WALLET_PRIVATE_KEY".to_string(),
            message,
        })
    };

    let key_bytes = bs58::decode(secret.expose_secret())
        .into_vec()
        .map_err(|e| invalid(e.to_string()))?;

    // Solana keypair files carry the 32-byte secret followed by the public key
    let key_array: [u8; 32] = match key_bytes.len() {
        64 | 32 => key_bytes[..32]
            .try_into()
            .map_err(|_| invalid("Invalid keypair format".to_string()))?,
        other => {
            return Err(invalid(format!("Key must be 32 or 64 bytes, got {}", other)));
        }
    };

    Ok(SigningKey::from_bytes(&key_array))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use solana_sdk::{message::Message, pubkey::Pubkey};
    use solana_system_interface::instruction as system_instruction;
    use std::str::FromStr;

    #[test]
    fn test_signing_key_from_base58_valid_32_bytes() {
        let original_key = SigningKey::generate(&mut OsRng);
        let encoded = bs58::encode(original_key.to_bytes()).into_string();
        let secret = SecretString::from(encoded);
        let parsed = signing_key_from_base58(&secret).unwrap();
        assert_eq!(parsed.to_bytes(), original_key.to_bytes());
    }

    #[test]
    fn test_signing_key_from_base58_valid_64_bytes() {
        let original_key = SigningKey::generate(&mut OsRng);
        let mut keypair = original_key.to_bytes().to_vec();
        keypair.extend_from_slice(original_key.verifying_key().as_bytes());
        let encoded = bs58::encode(&keypair).into_string();
        let secret = SecretString::from(encoded);
        let parsed = signing_key_from_base58(&secret).unwrap();
        assert_eq!(parsed.to_bytes(), original_key.to_bytes());
    }

    #[test]
    fn test_signing_key_from_base58_invalid() {
        let secret = SecretString::from("invalid-base58!!!");
        assert!(signing_key_from_base58(&secret).is_err());

        let wrong_key = bs58::encode(vec![0u8; 48]).into_string();
        let secret = SecretString::from(wrong_key);
        assert!(matches!(
            signing_key_from_base58(&secret),
            Err(AppError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_wallet_address_matches_key() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let wallet = KeypairWallet::from_signing_key(&signing_key).unwrap();
        let expected = bs58::encode(signing_key.verifying_key().as_bytes()).into_string();
        assert_eq!(wallet.address(), Some(expected));
    }

    #[tokio::test]
    async fn test_sign_transfer() {
        let wallet = KeypairWallet::from_signing_key(&SigningKey::generate(&mut OsRng)).unwrap();
        let payer = Pubkey::from_str(&wallet.public_key()).unwrap();
        let recipient = Pubkey::new_unique();
        let instruction = system_instruction::transfer(&payer, &recipient, 1_000);
        let mut message = Message::new(&[instruction], Some(&payer));
        message.recent_blockhash = Hash::new_from_array([7u8; 32]);

        let signed = wallet
            .sign_transaction(Transaction::new_unsigned(message))
            .await
            .unwrap();
        assert!(signed.is_signed());
    }

    #[tokio::test]
    async fn test_sign_rejects_foreign_fee_payer() {
        let wallet = KeypairWallet::from_signing_key(&SigningKey::generate(&mut OsRng)).unwrap();
        let stranger = Pubkey::new_unique();
        let instruction = system_instruction::transfer(&stranger, &Pubkey::new_unique(), 1);
        let message = Message::new(&[instruction], Some(&stranger));

        let result = wallet
            .sign_transaction(Transaction::new_unsigned(message))
            .await;
        assert!(matches!(result, Err(TransactionError::UserRejected(_))));
    }
}
