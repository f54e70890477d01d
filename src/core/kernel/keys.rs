use crate::core::errors::PelagosError;
use ed25519_dalek::{SigningKey, VerifyingKey};
use zeroize::Zeroize;

/// Length of an Ed25519 secret key in bytes.
pub const SECRET_KEY_LEN: usize = 32;
/// Length of a secret||public keypair concatenation in bytes.
pub const KEYPAIR_LEN: usize = 64;
/// Length of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Resolved signing material: the 32-byte Ed25519 secret plus its derived
/// public identity, computed once at construction and immutable afterwards.
///
/// The secret never leaves this struct except as transient input to the
/// signing primitive; it is never logged or serialized.
pub struct KeyMaterial {
    signing_key: SigningKey,
    address: String,
    public_hex: String,
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl KeyMaterial {
    /// Build key material from raw secret bytes.
    pub fn from_bytes(secret: &[u8; SECRET_KEY_LEN]) -> Self {
        let signing_key = SigningKey::from_bytes(secret);
        let public = signing_key.verifying_key();

        Self {
            address: bs58::encode(public.to_bytes()).into_string(),
            public_hex: hex::encode(public.to_bytes()),
            signing_key,
        }
    }

    /// Resolve a private key from any supported textual encoding.
    ///
    /// Decode strategies are tried in a fixed order and the first one whose
    /// output matches the expected length wins: 64-char hex (`0x` prefix
    /// tolerated), base-58 (32-byte secret or 64-byte secret||public form,
    /// of which only the leading 32 bytes are secret material), then
    /// standard base-64. The order is part of the contract: an input valid
    /// in more than one encoding must keep resolving to the same key.
    pub fn resolve(raw: &str) -> Result<Self, PelagosError> {
        let decoders: [fn(&str) -> Option<Vec<u8>>; 3] = [decode_hex, decode_base58, decode_base64];

        for decode in decoders {
            if let Some(mut bytes) = decode(raw) {
                let mut secret = [0u8; SECRET_KEY_LEN];
                secret.copy_from_slice(&bytes[..SECRET_KEY_LEN]);
                bytes.zeroize();

                let material = Self::from_bytes(&secret);
                secret.zeroize();
                return Ok(material);
            }
        }

        Err(PelagosError::InvalidKeyFormat(
            "private key is not valid hex, base-58, or base-64 of the expected length".to_string(),
        ))
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Base-58 address string, the venue-side account identifier.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Hex rendering of the public key.
    pub fn public_key_hex(&self) -> &str {
        &self.public_hex
    }
}

/// Normalize an account identity given in either textual encoding (hex or
/// base-58) to the base-58 address form used on the wire.
pub fn normalize_address(input: &str) -> Result<String, PelagosError> {
    let stripped = input.strip_prefix("0x").unwrap_or(input);
    if stripped.len() == PUBLIC_KEY_LEN * 2 {
        if let Ok(bytes) = hex::decode(stripped) {
            return Ok(bs58::encode(bytes).into_string());
        }
    }

    match bs58::decode(input).into_vec() {
        Ok(bytes) if bytes.len() == PUBLIC_KEY_LEN => Ok(input.to_string()),
        _ => Err(PelagosError::InvalidKeyFormat(format!(
            "account identity '{}' is neither a hex nor base-58 public key",
            input
        ))),
    }
}

fn decode_hex(raw: &str) -> Option<Vec<u8>> {
    let stripped = raw.strip_prefix("0x").unwrap_or(raw);
    if stripped.len() != SECRET_KEY_LEN * 2 {
        return None;
    }
    hex::decode(stripped).ok()
}

fn decode_base58(raw: &str) -> Option<Vec<u8>> {
    let bytes = bs58::decode(raw).into_vec().ok()?;
    (bytes.len() == SECRET_KEY_LEN || bytes.len() == KEYPAIR_LEN).then_some(bytes)
}

fn decode_base64(raw: &str) -> Option<Vec<u8>> {
    use base64::{engine::general_purpose, Engine as _};

    let bytes = general_purpose::STANDARD.decode(raw).ok()?;
    (bytes.len() == SECRET_KEY_LEN).then_some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose, Engine as _};

    const SECRET: [u8; 32] = [7u8; 32];

    #[test]
    fn hex_and_base64_resolve_to_the_same_public_key() {
        let from_hex = KeyMaterial::resolve(&hex::encode(SECRET)).unwrap();
        let from_b64 = KeyMaterial::resolve(&general_purpose::STANDARD.encode(SECRET)).unwrap();

        assert_eq!(from_hex.public_key_hex(), from_b64.public_key_hex());
        assert_eq!(from_hex.address(), from_b64.address());
    }

    #[test]
    fn prefixed_hex_is_accepted() {
        let bare = KeyMaterial::resolve(&hex::encode(SECRET)).unwrap();
        let prefixed = KeyMaterial::resolve(&format!("0x{}", hex::encode(SECRET))).unwrap();
        assert_eq!(bare.address(), prefixed.address());
    }

    #[test]
    fn base58_secret_resolves() {
        let encoded = bs58::encode(SECRET).into_string();
        let material = KeyMaterial::resolve(&encoded).unwrap();
        assert_eq!(material.address(), KeyMaterial::from_bytes(&SECRET).address());
    }

    #[test]
    fn base58_keypair_form_uses_leading_secret_half() {
        let reference = KeyMaterial::from_bytes(&SECRET);

        let mut keypair = [0u8; KEYPAIR_LEN];
        keypair[..SECRET_KEY_LEN].copy_from_slice(&SECRET);
        keypair[SECRET_KEY_LEN..].copy_from_slice(&reference.verifying_key().to_bytes());

        let material = KeyMaterial::resolve(&bs58::encode(keypair).into_string()).unwrap();
        assert_eq!(material.address(), reference.address());
    }

    #[test]
    fn wrong_length_input_is_rejected() {
        assert!(matches!(
            KeyMaterial::resolve("deadbeef"),
            Err(PelagosError::InvalidKeyFormat(_))
        ));
        assert!(matches!(
            KeyMaterial::resolve(""),
            Err(PelagosError::InvalidKeyFormat(_))
        ));
    }

    #[test]
    fn normalize_accepts_both_public_encodings() {
        let material = KeyMaterial::from_bytes(&SECRET);

        let from_b58 = normalize_address(material.address()).unwrap();
        let from_hex = normalize_address(material.public_key_hex()).unwrap();

        assert_eq!(from_b58, material.address());
        assert_eq!(from_hex, material.address());
    }

    #[test]
    fn normalize_rejects_garbage() {
        assert!(normalize_address("not-a-key-0OIl").is_err());
    }
}
