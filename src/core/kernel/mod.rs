/// Pelagos kernel - venue-agnostic request authentication and transport.
///
/// The kernel contains no endpoint knowledge; it provides the pieces every
/// authenticated call and streaming connection is built from:
///
/// ## Authentication
/// - `canonical`: deterministic canonical JSON, the exact bytes that get signed
/// - `keys`: multi-encoding private key resolution (hex / base-58 / base-64)
/// - `signer`: signed envelope construction, with pluggable [`MessageSigner`]
///
/// ## Transport
/// - `rest`: HTTP client with bounded, classified retry
/// - `ws`: WebSocket session plus reconnect/replay wrapper
/// - `codec`: frame encode/decode contract between transport and venue layer
///
/// ## Shared
/// - `policy`: the single retry/backoff decision point both transports use
///
/// # Example
///
/// ```rust,no_run
/// use pelagos::core::kernel::{KeyMaterial, RequestSigner};
/// use serde_json::json;
///
/// # fn example() -> Result<(), pelagos::PelagosError> {
/// let keys = KeyMaterial::resolve("0x1111111111111111111111111111111111111111111111111111111111111111")?;
/// let signer = RequestSigner::new(keys);
/// let envelope = signer.sign(
///     "create_order",
///     &json!({"symbol": "SOL", "side": "bid", "price": "20.5", "amount": "1", "tif": "GTC"}),
///     Some(30),
/// )?;
/// # Ok(())
/// # }
/// ```
pub mod canonical;
pub mod codec;
pub mod keys;
pub mod policy;
pub mod rest;
pub mod signer;
pub mod ws;

// Re-export key types for convenience
pub use canonical::{canonical_json, canonicalize};
pub use codec::WsCodec;
pub use keys::{normalize_address, KeyMaterial};
pub use policy::{run_with_retry, RetryPolicy, Verdict};
pub use rest::{ReqwestRest, RestClient, RestClientConfig};
pub use signer::{LocalSigner, MessageSigner, RequestSigner};
pub use ws::{ReconnectWs, TungsteniteWs, WsConfig, WsSession};
