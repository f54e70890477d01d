use crate::client::codec::PelagosCodec;
use crate::client::rest::PelagosRestClient;
use crate::client::stream::{PelagosStream, StreamEvents, StreamHandle, DEFAULT_EVENT_BUFFER};
use crate::core::config::PelagosConfig;
use crate::core::errors::PelagosError;
use crate::core::kernel::{
    KeyMaterial, ReconnectWs, ReqwestRest, RequestSigner, RestClientConfig, RetryPolicy,
    TungsteniteWs, WsConfig, WsSession,
};
use std::sync::Arc;
use std::time::Duration;

pub const MAINNET_URL: &str = "https://api.pelagos.exchange";
pub const MAINNET_WS_URL: &str = "wss://ws.pelagos.exchange/ws";

fn build_signer(config: &PelagosConfig) -> Result<Option<Arc<RequestSigner>>, PelagosError> {
    if !config.has_credentials() {
        return Ok(None);
    }
    let keys = KeyMaterial::resolve(config.private_key())?;
    Ok(Some(Arc::new(RequestSigner::new(keys))))
}

/// Create the REST client. Works without credentials for public market
/// data; signed operations then fail with an authentication error.
pub fn build_client(
    config: &PelagosConfig,
) -> Result<PelagosRestClient<ReqwestRest>, PelagosError> {
    let rest_config = RestClientConfig::new(
        config
            .base_url
            .clone()
            .unwrap_or_else(|| MAINNET_URL.to_string()),
    )
    .with_timeout(config.timeout_seconds)
    .with_max_retries(config.max_retries)
    .with_retry_base_delay(config.retry_base_delay_ms);

    let rest = ReqwestRest::new(rest_config)?;
    let signer = build_signer(config)?;

    Ok(PelagosRestClient::new(rest, signer))
}

/// Connect the streaming client and spawn its task.
///
/// The initial connect happens here and its failure surfaces immediately;
/// later drops are handled by the reconnect policy in the background.
pub async fn build_stream(
    config: &PelagosConfig,
) -> Result<(StreamHandle, StreamEvents), PelagosError> {
    let signer = build_signer(config)?;

    let ws_config = WsConfig {
        connect_timeout_ms: config.timeout_seconds.saturating_mul(1_000),
        max_reconnect_attempts: config.max_reconnect_attempts,
        reconnect_delay_ms: config.reconnect_delay_ms,
        auto_reconnect: config.auto_reconnect,
    };

    let url = config
        .ws_url
        .clone()
        .unwrap_or_else(|| MAINNET_WS_URL.to_string());

    let inner = TungsteniteWs::new(url, PelagosCodec::new()).with_config(ws_config);

    let mut session = ReconnectWs::new(inner)
        .with_reconnect_policy(RetryPolicy {
            max_retries: config.max_reconnect_attempts,
            base_delay: Duration::from_millis(config.reconnect_delay_ms),
            max_delay: Duration::from_secs(60),
        })
        .with_auto_reconnect(config.auto_reconnect);

    session.connect().await?;

    Ok(PelagosStream::spawn(session, signer, DEFAULT_EVENT_BUFFER))
}
