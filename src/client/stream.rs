use crate::core::errors::PelagosError;
use crate::core::kernel::{ReconnectWs, RequestSigner, WsCodec, WsSession};
use crate::core::types::{
    OrderBookUpdate, OrderUpdate, StreamEvent, TickerUpdate, TradeUpdate,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, warn};

/// Default per-channel event buffer size.
pub const DEFAULT_EVENT_BUFFER: usize = 1024;

enum StreamCommand {
    Subscribe(String),
    Unsubscribe(String),
    SendFrame { operation: String, frame: Message },
    Disconnect,
}

/// Handle for driving the stream: subscriptions and signed actions.
///
/// Commands issued while the socket is down are queued in order and take
/// effect on the next successful (re)connect. Dropping every handle shuts
/// the stream task down.
#[derive(Clone)]
pub struct StreamHandle {
    cmd_tx: mpsc::Sender<StreamCommand>,
    signer: Option<Arc<RequestSigner>>,
}

impl StreamHandle {
    pub async fn subscribe(&self, channel: impl Into<String>) -> Result<(), PelagosError> {
        self.send(StreamCommand::Subscribe(channel.into())).await
    }

    pub async fn unsubscribe(&self, channel: impl Into<String>) -> Result<(), PelagosError> {
        self.send(StreamCommand::Unsubscribe(channel.into())).await
    }

    /// Sign an operation payload and transmit it as a typed frame.
    ///
    /// Signing failures surface here; transmission is fire-and-forget. The
    /// acknowledgement, if any, arrives on the order-update channel and
    /// correlating it is the caller's concern.
    pub async fn send_signed(
        &self,
        operation: &str,
        payload: &Value,
        expiry_window: Option<u64>,
    ) -> Result<(), PelagosError> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            PelagosError::Authentication("signed actions require credentials".to_string())
        })?;

        let envelope = signer.sign(operation, payload, expiry_window)?;
        let mut frame = envelope
            .as_object()
            .cloned()
            .unwrap_or_default();
        frame.insert("type".to_string(), Value::from(operation));

        self.send(StreamCommand::SendFrame {
            operation: operation.to_string(),
            frame: Message::Text(Value::Object(frame).to_string()),
        })
        .await
    }

    /// Tear the connection down. Short-circuits an in-progress reconnect
    /// backoff and clears subscription state.
    pub async fn disconnect(&self) -> Result<(), PelagosError> {
        self.send(StreamCommand::Disconnect).await
    }

    async fn send(&self, command: StreamCommand) -> Result<(), PelagosError> {
        self.cmd_tx
            .send(command)
            .await
            .map_err(|_| PelagosError::Network("stream task has shut down".to_string()))
    }
}

/// Typed inbound event channels. One receiver per frame kind; frames with
/// unknown discriminators arrive only on `raw`.
pub struct StreamEvents {
    pub tickers: mpsc::Receiver<TickerUpdate>,
    pub orderbooks: mpsc::Receiver<OrderBookUpdate>,
    pub trades: mpsc::Receiver<TradeUpdate>,
    pub orders: mpsc::Receiver<OrderUpdate>,
    pub raw: mpsc::Receiver<Value>,
}

struct EventSenders {
    tickers: mpsc::Sender<TickerUpdate>,
    orderbooks: mpsc::Sender<OrderBookUpdate>,
    trades: mpsc::Sender<TradeUpdate>,
    orders: mpsc::Sender<OrderUpdate>,
    raw: mpsc::Sender<Value>,
}

impl EventSenders {
    fn new(buffer: usize) -> (Self, StreamEvents) {
        let (tickers_tx, tickers_rx) = mpsc::channel(buffer);
        let (orderbooks_tx, orderbooks_rx) = mpsc::channel(buffer);
        let (trades_tx, trades_rx) = mpsc::channel(buffer);
        let (orders_tx, orders_rx) = mpsc::channel(buffer);
        let (raw_tx, raw_rx) = mpsc::channel(buffer);

        (
            Self {
                tickers: tickers_tx,
                orderbooks: orderbooks_tx,
                trades: trades_tx,
                orders: orders_tx,
                raw: raw_tx,
            },
            StreamEvents {
                tickers: tickers_rx,
                orderbooks: orderbooks_rx,
                trades: trades_rx,
                orders: orders_rx,
                raw: raw_rx,
            },
        )
    }

    /// Route one decoded frame. Delivery per channel is isolated: a full or
    /// dropped consumer on one channel never stops the others.
    fn dispatch(&self, event: StreamEvent) {
        match event {
            StreamEvent::Ticker(update) => forward("ticker", self.tickers.try_send(update)),
            StreamEvent::OrderBook(update) => {
                forward("orderbook", self.orderbooks.try_send(update));
            }
            StreamEvent::Trade(update) => forward("trade", self.trades.try_send(update)),
            StreamEvent::Order(update) => forward("order_update", self.orders.try_send(update)),
            StreamEvent::Raw(value) => forward("raw", self.raw.try_send(value)),
        }
    }
}

fn forward<T>(channel: &str, result: Result<(), TrySendError<T>>) {
    match result {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            warn!(channel, "event consumer lagging, dropping frame");
        }
        Err(TrySendError::Closed(_)) => {
            debug!(channel, "event consumer dropped");
        }
    }
}

/// Streaming client: one task owns the connection, the subscription set and
/// all frame dispatch; callers talk to it through [`StreamHandle`] and read
/// from [`StreamEvents`].
pub struct PelagosStream;

impl PelagosStream {
    /// Spawn the stream task over an already-connected session.
    ///
    /// If the session is not yet connected and auto-reconnect is on, the
    /// task establishes the socket on its first receive.
    pub fn spawn<C, S>(
        session: ReconnectWs<C, S>,
        signer: Option<Arc<RequestSigner>>,
        buffer: usize,
    ) -> (StreamHandle, StreamEvents)
    where
        C: WsCodec<Message = StreamEvent>,
        S: WsSession<C> + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (senders, events) = EventSenders::new(buffer);

        tokio::spawn(run_stream(session, cmd_rx, senders));

        (StreamHandle { cmd_tx, signer }, events)
    }
}

enum Step {
    Command(Option<StreamCommand>),
    Inbound(Option<Result<StreamEvent, PelagosError>>),
}

async fn run_stream<C, S>(
    mut session: ReconnectWs<C, S>,
    mut cmd_rx: mpsc::Receiver<StreamCommand>,
    senders: EventSenders,
) where
    C: WsCodec<Message = StreamEvent>,
    S: WsSession<C>,
{
    loop {
        // completing either branch drops the other future, so a Disconnect
        // command cancels a reconnect backoff sleep mid-wait
        let step = tokio::select! {
            command = cmd_rx.recv() => Step::Command(command),
            inbound = session.next_message() => Step::Inbound(inbound),
        };

        match step {
            Step::Command(None) | Step::Command(Some(StreamCommand::Disconnect)) => {
                if let Err(e) = session.close().await {
                    debug!("error during close: {}", e);
                }
                return;
            }
            Step::Command(Some(StreamCommand::Subscribe(channel))) => {
                if let Err(e) = session.subscribe(&channel).await {
                    warn!(channel = %channel, "subscribe failed: {}", e);
                }
            }
            Step::Command(Some(StreamCommand::Unsubscribe(channel))) => {
                if let Err(e) = session.unsubscribe(&channel).await {
                    warn!(channel = %channel, "unsubscribe failed: {}", e);
                }
            }
            Step::Command(Some(StreamCommand::SendFrame { operation, frame })) => {
                if let Err(e) = session.send_raw(frame).await {
                    warn!(operation = %operation, "failed to send signed action: {}", e);
                }
            }
            Step::Inbound(Some(Ok(event))) => senders.dispatch(event),
            Step::Inbound(Some(Err(e))) => match e {
                // reconnect budget exhausted; the transport is gone
                PelagosError::Network(_) => {
                    error!("stream transport failed: {}", e);
                    return;
                }
                other => warn!("dropping undecodable frame: {}", other),
            },
            Step::Inbound(None) => {
                debug!("stream closed");
                return;
            }
        }
    }
}
