use crate::core::errors::PelagosError;
use crate::core::kernel::codec::WsCodec;
use crate::core::kernel::policy::RetryPolicy;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{instrument, warn};

/// WebSocket transport configuration.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Max reconnection attempts before the error surfaces.
    pub max_reconnect_attempts: u32,
    /// Initial reconnection delay in milliseconds (doubles per attempt).
    pub reconnect_delay_ms: u64,
    /// Whether to reconnect at all after an unsolicited close.
    pub auto_reconnect: bool,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            max_reconnect_attempts: 10,
            reconnect_delay_ms: 1_000,
            auto_reconnect: true,
        }
    }
}

/// WebSocket session trait - pure transport layer.
#[async_trait]
pub trait WsSession<C: WsCodec>: Send {
    /// Connect (or re-connect) the underlying socket.
    async fn connect(&mut self) -> Result<(), PelagosError>;

    /// Send a raw frame.
    async fn send_raw(&mut self, msg: Message) -> Result<(), PelagosError>;

    /// Receive the next raw data frame.
    async fn next_raw(&mut self) -> Option<Result<Message, PelagosError>>;

    /// Close the connection.
    async fn close(&mut self) -> Result<(), PelagosError>;

    /// Whether the socket is currently open.
    fn is_connected(&self) -> bool;

    /// Send a subscribe frame for one channel.
    async fn subscribe(&mut self, channel: &str) -> Result<(), PelagosError>;

    /// Send an unsubscribe frame for one channel.
    async fn unsubscribe(&mut self, channel: &str) -> Result<(), PelagosError>;

    /// Get the next decoded message.
    async fn next_message(&mut self) -> Option<Result<C::Message, PelagosError>>;
}

/// Tungstenite-based WebSocket session.
pub struct TungsteniteWs<C: WsCodec> {
    url: String,
    write: Option<
        futures_util::stream::SplitSink<
            tokio_tungstenite::WebSocketStream<
                tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
            >,
            Message,
        >,
    >,
    read: Option<
        futures_util::stream::SplitStream<
            tokio_tungstenite::WebSocketStream<
                tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
            >,
        >,
    >,
    connected: bool,
    codec: C,
    config: WsConfig,
}

impl<C: WsCodec> TungsteniteWs<C> {
    pub fn new(url: String, codec: C) -> Self {
        Self {
            url,
            write: None,
            read: None,
            connected: false,
            codec,
            config: WsConfig::default(),
        }
    }

    pub fn with_config(mut self, config: WsConfig) -> Self {
        self.config = config;
        self
    }
}

#[async_trait]
impl<C: WsCodec> WsSession<C> for TungsteniteWs<C> {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn connect(&mut self) -> Result<(), PelagosError> {
        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);

        // dropping the timed-out future aborts the half-open connection
        let (ws_stream, _) = tokio::time::timeout(connect_timeout, connect_async(&self.url))
            .await
            .map_err(|_| {
                PelagosError::Timeout("WebSocket connection timeout".to_string())
            })?
            .map_err(|e| PelagosError::Network(format!("WebSocket connection failed: {}", e)))?;

        let (write, read) = ws_stream.split();
        self.write = Some(write);
        self.read = Some(read);
        self.connected = true;

        Ok(())
    }

    async fn send_raw(&mut self, msg: Message) -> Result<(), PelagosError> {
        if !self.connected {
            return Err(PelagosError::Network("WebSocket not connected".to_string()));
        }

        let write = self.write.as_mut().ok_or_else(|| {
            PelagosError::Network("WebSocket write stream not available".to_string())
        })?;

        write.send(msg).await.map_err(|e| {
            self.connected = false;
            PelagosError::Network(format!("failed to send WebSocket message: {}", e))
        })?;

        Ok(())
    }

    async fn next_raw(&mut self) -> Option<Result<Message, PelagosError>> {
        loop {
            if !self.connected {
                return Some(Err(PelagosError::Network(
                    "WebSocket not connected".to_string(),
                )));
            }

            let read = self.read.as_mut()?;

            match read.next().await {
                Some(Ok(message)) => match message {
                    Message::Close(_) => {
                        self.connected = false;
                        return Some(Ok(message));
                    }
                    Message::Ping(data) => {
                        // answer pings at the transport level
                        if let Err(e) = self.send_raw(Message::Pong(data)).await {
                            warn!("failed to send pong response: {}", e);
                        }
                    }
                    Message::Pong(_) => {}
                    _ => return Some(Ok(message)),
                },
                Some(Err(e)) => {
                    self.connected = false;
                    return Some(Err(PelagosError::Network(format!(
                        "WebSocket error: {}",
                        e
                    ))));
                }
                None => {
                    self.connected = false;
                    return None;
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), PelagosError> {
        if let Some(write) = self.write.as_mut() {
            let _ = write.send(Message::Close(None)).await;
        }
        self.connected = false;
        self.write = None;
        self.read = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn subscribe(&mut self, channel: &str) -> Result<(), PelagosError> {
        let message = self.codec.encode_subscribe(channel)?;
        self.send_raw(message).await
    }

    async fn unsubscribe(&mut self, channel: &str) -> Result<(), PelagosError> {
        let message = self.codec.encode_unsubscribe(channel)?;
        self.send_raw(message).await
    }

    async fn next_message(&mut self) -> Option<Result<C::Message, PelagosError>> {
        loop {
            match self.next_raw().await {
                Some(Ok(raw_msg)) => {
                    // control frames are handled by next_raw
                    if matches!(
                        raw_msg,
                        Message::Ping(_) | Message::Pong(_) | Message::Close(_)
                    ) {
                        continue;
                    }

                    match self.codec.decode_message(raw_msg) {
                        Ok(Some(decoded)) => return Some(Ok(decoded)),
                        Ok(None) => {}
                        Err(e) => return Some(Err(e)),
                    }
                }
                Some(Err(e)) => return Some(Err(e)),
                None => return None,
            }
        }
    }
}

/// Wrapper that adds reconnection and subscription replay.
///
/// The subscription set survives reconnects and is replayed, in order, on
/// every successful (re)connect; it is cleared only by an explicit
/// [`WsSession::close`]. Subscribe/unsubscribe while disconnected mutate
/// the set and take effect atomically on the next open.
pub struct ReconnectWs<C: WsCodec, T: WsSession<C>> {
    inner: T,
    policy: RetryPolicy,
    auto_reconnect: bool,
    subscriptions: BTreeSet<String>,
    _codec: std::marker::PhantomData<C>,
}

impl<C: WsCodec, T: WsSession<C>> ReconnectWs<C, T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            policy: RetryPolicy {
                max_retries: 10,
                base_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(60),
            },
            auto_reconnect: true,
            subscriptions: BTreeSet::new(),
            _codec: std::marker::PhantomData,
        }
    }

    /// Override the reconnect attempt budget and backoff shape.
    pub fn with_reconnect_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }

    /// Channels currently held for replay.
    pub fn subscriptions(&self) -> &BTreeSet<String> {
        &self.subscriptions
    }

    async fn replay_subscriptions(&mut self) {
        let channels: Vec<String> = self.subscriptions.iter().cloned().collect();
        for channel in channels {
            if let Err(e) = self.inner.subscribe(&channel).await {
                warn!(channel = %channel, "failed to resubscribe after reconnection: {}", e);
            }
        }
    }

    async fn attempt_reconnect(&mut self) -> Result<(), PelagosError> {
        let mut attempts = 0u32;

        loop {
            match self.inner.connect().await {
                Ok(()) => {
                    self.replay_subscriptions().await;
                    return Ok(());
                }
                Err(e) => {
                    attempts += 1;
                    if attempts > self.policy.max_retries {
                        return Err(PelagosError::Network(format!(
                            "failed to reconnect after {} attempts: {}",
                            attempts, e
                        )));
                    }
                    let delay = self.policy.delay_for(attempts - 1);
                    warn!(
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "reconnection attempt failed: {}",
                        e
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl<C: WsCodec, T: WsSession<C>> WsSession<C> for ReconnectWs<C, T> {
    async fn connect(&mut self) -> Result<(), PelagosError> {
        self.inner.connect().await?;
        self.replay_subscriptions().await;
        Ok(())
    }

    async fn send_raw(&mut self, msg: Message) -> Result<(), PelagosError> {
        if !self.inner.is_connected() {
            if !self.auto_reconnect {
                return Err(PelagosError::Network("WebSocket not connected".to_string()));
            }
            self.attempt_reconnect().await?;
        }
        self.inner.send_raw(msg).await
    }

    async fn next_raw(&mut self) -> Option<Result<Message, PelagosError>> {
        loop {
            if !self.inner.is_connected() {
                if !self.auto_reconnect {
                    return None;
                }
                if let Err(e) = self.attempt_reconnect().await {
                    return Some(Err(e));
                }
            }

            match self.inner.next_raw().await {
                Some(Ok(msg)) => return Some(Ok(msg)),
                Some(Err(e)) if self.inner.is_connected() => return Some(Err(e)),
                Some(Err(_)) | None => {
                    // connection dropped; loop to reconnect (or bail)
                    if !self.auto_reconnect {
                        return None;
                    }
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), PelagosError> {
        self.subscriptions.clear();
        self.inner.close().await
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    async fn subscribe(&mut self, channel: &str) -> Result<(), PelagosError> {
        // membership is idempotent; a disconnected subscribe is queued and
        // takes effect on the next open via replay
        self.subscriptions.insert(channel.to_string());
        if self.inner.is_connected() {
            self.inner.subscribe(channel).await?;
        }
        Ok(())
    }

    async fn unsubscribe(&mut self, channel: &str) -> Result<(), PelagosError> {
        self.subscriptions.remove(channel);
        if self.inner.is_connected() {
            self.inner.unsubscribe(channel).await?;
        }
        Ok(())
    }

    async fn next_message(&mut self) -> Option<Result<C::Message, PelagosError>> {
        loop {
            if !self.inner.is_connected() {
                if !self.auto_reconnect {
                    return None;
                }
                if let Err(e) = self.attempt_reconnect().await {
                    return Some(Err(e));
                }
            }

            match self.inner.next_message().await {
                Some(Ok(msg)) => return Some(Ok(msg)),
                // decode errors surface without tearing the connection down
                Some(Err(e)) if self.inner.is_connected() => return Some(Err(e)),
                Some(Err(_)) | None => {
                    if !self.auto_reconnect {
                        return None;
                    }
                }
            }
        }
    }
}
