use crate::core::{Result, SyncError};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Separator between the signed value and its signature.
pub const SIGNATURE_SEPARATOR: char = '.';

/// Keyed signing capability used for session identifiers.
pub trait Signer: Send + Sync {
    /// Returns a token carrying `value` and its signature.
    fn sign(&self, value: &str) -> String;

    /// Returns the signed value when `token` carries a valid signature.
    fn verify(&self, token: &str) -> Option<String>;
}

/// HMAC-SHA256 signer producing `<value>.<hex signature>` tokens.
#[derive(Clone)]
pub struct HmacSigner {
    mac: HmacSha256,
}

impl HmacSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(SyncError::Configuration(
                "signing secret must not be empty".to_string(),
            ));
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|err| SyncError::Configuration(format!("invalid signing secret: {err}")))?;
        Ok(Self { mac })
    }
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner").finish_non_exhaustive()
    }
}

impl Signer for HmacSigner {
    fn sign(&self, value: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(value.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        format!("{value}{SIGNATURE_SEPARATOR}{signature}")
    }

    fn verify(&self, token: &str) -> Option<String> {
        let (value, signature) = token.rsplit_once(SIGNATURE_SEPARATOR)?;
        let signature = hex::decode(signature).ok()?;
        let mut mac = self.mac.clone();
        mac.update(value.as_bytes());
        // verify_slice compares in constant time.
        mac.verify_slice(&signature).ok()?;
        Some(value.to_string())
    }
}
