use crate::core::errors::PelagosError;
use crate::core::kernel::canonical::canonicalize;
use crate::core::kernel::keys::{normalize_address, KeyMaterial};
use ed25519_dalek::Signer as Ed25519SignerTrait;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Signs a prepared canonical message.
///
/// The default implementation holds the key in-process; a hardware or
/// remote signer only needs to replace this one step, everything else in
/// request construction is identical.
pub trait MessageSigner: Send + Sync {
    /// Sign the canonical message bytes, returning the raw 64-byte signature.
    fn sign_message(&self, message: &[u8]) -> Result<[u8; 64], PelagosError>;

    /// Base-58 address of the key this signer controls.
    fn address(&self) -> &str;
}

/// In-process signer backed by resolved [`KeyMaterial`].
pub struct LocalSigner {
    keys: KeyMaterial,
}

impl LocalSigner {
    pub fn new(keys: KeyMaterial) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &KeyMaterial {
        &self.keys
    }
}

impl MessageSigner for LocalSigner {
    fn sign_message(&self, message: &[u8]) -> Result<[u8; 64], PelagosError> {
        Ok(self.keys.signing_key().sign(message).to_bytes())
    }

    fn address(&self) -> &str {
        self.keys.address()
    }
}

/// Builds signed request envelopes for authenticated venue operations.
///
/// The message that gets signed nests the payload under `data`:
/// `{"type": op, "timestamp": ms, "expiry_window"?: s, "data": {...}}`,
/// canonicalized before signing. The transmitted envelope is a different
/// structure: the payload fields flattened to the top level next to
/// `account`, `signature`, `timestamp` and `expiry_window`. The envelope is
/// never canonicalized or re-signed; venue-side verification reconstructs
/// the nested form.
pub struct RequestSigner {
    signer: Arc<dyn MessageSigner>,
    account: String,
}

impl RequestSigner {
    /// Signer for an account signing its own requests.
    pub fn new(keys: KeyMaterial) -> Self {
        let signer = LocalSigner::new(keys);
        let account = signer.address().to_string();
        Self {
            signer: Arc::new(signer),
            account,
        }
    }

    /// Signer acting for an explicit account (agent key flows). The account
    /// is accepted in hex or base-58 and normalized to the address form.
    pub fn for_account(
        signer: Arc<dyn MessageSigner>,
        account: &str,
    ) -> Result<Self, PelagosError> {
        Ok(Self {
            signer,
            account: normalize_address(account)?,
        })
    }

    /// Base-58 address the produced envelopes claim.
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Sign `payload` for `operation` at the current wall-clock timestamp.
    pub fn sign(
        &self,
        operation: &str,
        payload: &Value,
        expiry_window: Option<u64>,
    ) -> Result<Value, PelagosError> {
        self.sign_at(operation, payload, now_ms()?, expiry_window)
    }

    /// Sign with an explicit timestamp. Exposed for deterministic testing;
    /// production callers go through [`RequestSigner::sign`].
    pub fn sign_at(
        &self,
        operation: &str,
        payload: &Value,
        timestamp: u64,
        expiry_window: Option<u64>,
    ) -> Result<Value, PelagosError> {
        let fields = payload.as_object().ok_or_else(|| {
            PelagosError::Validation("operation payload must be a JSON object".to_string())
        })?;

        let mut message = Map::new();
        message.insert("type".to_string(), Value::from(operation));
        message.insert("timestamp".to_string(), Value::from(timestamp));
        if let Some(window) = expiry_window {
            message.insert("expiry_window".to_string(), Value::from(window));
        }
        message.insert("data".to_string(), payload.clone());

        let canonical = canonicalize(&Value::Object(message));
        let signature = self.signer.sign_message(canonical.as_bytes())?;

        let mut envelope = fields.clone();
        envelope.insert("account".to_string(), Value::from(self.account.as_str()));
        envelope.insert(
            "signature".to_string(),
            Value::from(bs58::encode(signature).into_string()),
        );
        envelope.insert("timestamp".to_string(), Value::from(timestamp));
        if let Some(window) = expiry_window {
            envelope.insert("expiry_window".to_string(), Value::from(window));
        }

        Ok(Value::Object(envelope))
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> Result<u64, PelagosError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .map_err(|e| PelagosError::Signing(format!("system clock before epoch: {}", e)))
}
