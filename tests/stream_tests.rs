use async_trait::async_trait;
use pelagos::client::{PelagosCodec, PelagosStream};
use pelagos::core::errors::PelagosError;
use pelagos::core::kernel::{
    KeyMaterial, ReconnectWs, RequestSigner, RetryPolicy, WsCodec, WsSession,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

#[derive(Default)]
struct MockState {
    connected: bool,
    connect_attempts: u32,
    fail_connects: u32,
    hang_when_empty: bool,
    sent: Vec<Message>,
    inbound: VecDeque<Message>,
}

/// Shared handle the test keeps to script and observe the fake socket.
#[derive(Clone, Default)]
struct MockHandle(Arc<Mutex<MockState>>);

impl MockHandle {
    fn session(&self) -> MockSession {
        MockSession {
            codec: PelagosCodec::new(),
            state: Arc::clone(&self.0),
        }
    }

    fn drop_connection(&self) {
        self.0.lock().unwrap().connected = false;
    }

    fn clear_sent(&self) {
        self.0.lock().unwrap().sent.clear();
    }

    fn connect_attempts(&self) -> u32 {
        self.0.lock().unwrap().connect_attempts
    }

    fn push_inbound(&self, frame: Value) {
        self.0
            .lock()
            .unwrap()
            .inbound
            .push_back(Message::Text(frame.to_string()));
    }

    /// Channels named in sent frames of the given type, in send order.
    fn sent_channels(&self, frame_type: &str) -> Vec<String> {
        self.sent_frames(frame_type)
            .iter()
            .filter_map(|v| v["channel"].as_str().map(|s| s.to_string()))
            .collect()
    }

    fn sent_frames(&self, frame_type: &str) -> Vec<Value> {
        self.0
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter_map(|m| {
                let Message::Text(text) = m else { return None };
                let value: Value = serde_json::from_str(text).ok()?;
                (value["type"] == frame_type).then_some(value)
            })
            .collect()
    }
}

struct MockSession {
    codec: PelagosCodec,
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl WsSession<PelagosCodec> for MockSession {
    async fn connect(&mut self) -> Result<(), PelagosError> {
        let mut state = self.state.lock().unwrap();
        state.connect_attempts += 1;
        if state.fail_connects > 0 {
            state.fail_connects -= 1;
            return Err(PelagosError::Network("connection refused".to_string()));
        }
        state.connected = true;
        Ok(())
    }

    async fn send_raw(&mut self, msg: Message) -> Result<(), PelagosError> {
        let mut state = self.state.lock().unwrap();
        if !state.connected {
            return Err(PelagosError::Network("not connected".to_string()));
        }
        state.sent.push(msg);
        Ok(())
    }

    async fn next_raw(&mut self) -> Option<Result<Message, PelagosError>> {
        {
            let mut state = self.state.lock().unwrap();
            if !state.connected {
                return None;
            }
            if let Some(msg) = state.inbound.pop_front() {
                return Some(Ok(msg));
            }
            if !state.hang_when_empty {
                // script exhausted: behave like a server-side drop
                state.connected = false;
                return None;
            }
        }
        std::future::pending().await
    }

    async fn close(&mut self) -> Result<(), PelagosError> {
        self.state.lock().unwrap().connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    async fn subscribe(&mut self, channel: &str) -> Result<(), PelagosError> {
        let msg = self.codec.encode_subscribe(channel)?;
        self.send_raw(msg).await
    }

    async fn unsubscribe(&mut self, channel: &str) -> Result<(), PelagosError> {
        let msg = self.codec.encode_unsubscribe(channel)?;
        self.send_raw(msg).await
    }

    async fn next_message(
        &mut self,
    ) -> Option<Result<<PelagosCodec as WsCodec>::Message, PelagosError>> {
        loop {
            match self.next_raw().await {
                Some(Ok(msg)) => match self.codec.decode_message(msg) {
                    Ok(Some(decoded)) => return Some(Ok(decoded)),
                    Ok(None) => {}
                    Err(e) => return Some(Err(e)),
                },
                Some(Err(e)) => return Some(Err(e)),
                None => return None,
            }
        }
    }
}

fn ticker_frame(symbol: &str) -> Value {
    json!({
        "channel": "ticker",
        "data": {"symbol": symbol, "mark": "20.5", "timestamp": 1_700_000_000_000u64}
    })
}

fn trade_frame(symbol: &str) -> Value {
    json!({
        "channel": "trade",
        "data": {
            "symbol": symbol, "side": "bid", "price": "20.5",
            "amount": "1.5", "timestamp": 1_700_000_000_000u64
        }
    })
}

// --- ReconnectWs: subscription replay semantics ---

#[tokio::test]
async fn queued_subscriptions_are_sent_on_connect() {
    let mock = MockHandle::default();
    let mut ws = ReconnectWs::new(mock.session());

    ws.subscribe("ticker.SOL").await.unwrap();
    ws.subscribe("trade.ETH").await.unwrap();
    assert!(mock.sent_channels("subscribe").is_empty());

    ws.connect().await.unwrap();

    assert_eq!(
        mock.sent_channels("subscribe"),
        vec!["ticker.SOL".to_string(), "trade.ETH".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn reconnect_replays_exactly_the_live_subscription_set() {
    let mock = MockHandle::default();
    let mut ws = ReconnectWs::new(mock.session());

    ws.connect().await.unwrap();
    ws.subscribe("ticker.SOL").await.unwrap();
    ws.subscribe("trade.ETH").await.unwrap();

    mock.drop_connection();
    mock.clear_sent();
    mock.push_inbound(ticker_frame("SOL"));

    // receiving notices the drop, reconnects and replays before delivery
    let event = ws.next_message().await.unwrap().unwrap();
    assert!(matches!(
        event,
        pelagos::StreamEvent::Ticker(ref t) if t.symbol == "SOL"
    ));

    let mut replayed = mock.sent_channels("subscribe");
    replayed.sort();
    assert_eq!(
        replayed,
        vec!["ticker.SOL".to_string(), "trade.ETH".to_string()]
    );
    assert_eq!(mock.connect_attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn unsubscribe_while_disconnected_is_excluded_from_replay() {
    let mock = MockHandle::default();
    let mut ws = ReconnectWs::new(mock.session());

    ws.connect().await.unwrap();
    ws.subscribe("ticker.SOL").await.unwrap();
    ws.subscribe("trade.ETH").await.unwrap();

    mock.drop_connection();
    mock.clear_sent();

    ws.unsubscribe("trade.ETH").await.unwrap();
    mock.push_inbound(ticker_frame("SOL"));

    let _ = ws.next_message().await.unwrap().unwrap();

    assert_eq!(
        mock.sent_channels("subscribe"),
        vec!["ticker.SOL".to_string()]
    );
}

#[tokio::test]
async fn subscription_membership_is_idempotent() {
    let mock = MockHandle::default();
    let mut ws = ReconnectWs::new(mock.session());

    ws.subscribe("ticker.SOL").await.unwrap();
    ws.subscribe("ticker.SOL").await.unwrap();

    assert_eq!(ws.subscriptions().len(), 1);

    ws.connect().await.unwrap();
    assert_eq!(mock.sent_channels("subscribe").len(), 1);
}

#[tokio::test]
async fn explicit_close_clears_subscription_state() {
    let mock = MockHandle::default();
    let mut ws = ReconnectWs::new(mock.session());

    ws.connect().await.unwrap();
    ws.subscribe("ticker.SOL").await.unwrap();

    ws.close().await.unwrap();

    assert!(ws.subscriptions().is_empty());
    assert!(!ws.is_connected());
}

#[tokio::test(start_paused = true)]
async fn reconnect_gives_up_after_the_attempt_budget() {
    let mock = MockHandle::default();
    mock.0.lock().unwrap().fail_connects = 100;

    let mut ws = ReconnectWs::new(mock.session()).with_reconnect_policy(RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_secs(60),
    });

    let result = ws.next_message().await.unwrap();
    assert!(matches!(result, Err(PelagosError::Network(_))));
    assert_eq!(mock.connect_attempts(), 3);
}

// --- Stream actor: dispatch and signed actions ---

#[tokio::test(start_paused = true)]
async fn one_lagging_channel_does_not_stop_the_others() {
    let mock = MockHandle::default();
    mock.0.lock().unwrap().hang_when_empty = true;
    mock.push_inbound(ticker_frame("SOL"));
    mock.push_inbound(ticker_frame("SOL"));
    mock.push_inbound(ticker_frame("SOL"));
    mock.push_inbound(trade_frame("ETH"));

    let session = ReconnectWs::new(mock.session());
    let (_handle, mut events) = PelagosStream::spawn(session, None, 1);

    // the trade lands even though the ticker buffer (size 1) overflowed
    let trade = events.trades.recv().await.expect("trade delivered");
    assert_eq!(trade.symbol, "ETH");

    assert!(events.tickers.try_recv().is_ok());
    assert!(events.tickers.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn disconnect_command_shuts_the_stream_down() {
    let mock = MockHandle::default();
    mock.0.lock().unwrap().hang_when_empty = true;

    let session = ReconnectWs::new(mock.session());
    let (handle, mut events) = PelagosStream::spawn(session, None, 16);

    handle.subscribe("ticker.SOL").await.unwrap();
    handle.disconnect().await.unwrap();

    assert!(events.tickers.recv().await.is_none());
    assert!(!mock.0.lock().unwrap().connected);
}

#[tokio::test(start_paused = true)]
async fn signed_actions_are_transmitted_as_typed_frames() {
    let keys = KeyMaterial::from_bytes(&[9u8; 32]);
    let expected_account = keys.address().to_string();
    let signer = Arc::new(RequestSigner::new(keys));

    let mock = MockHandle::default();
    mock.0.lock().unwrap().hang_when_empty = true;

    let session = ReconnectWs::new(mock.session());
    let (handle, _events) = PelagosStream::spawn(session, Some(signer), 16);

    handle
        .send_signed(
            "create_order",
            &json!({"symbol": "SOL", "side": "bid", "price": "20.5", "amount": "1", "tif": "GTC"}),
            Some(30),
        )
        .await
        .unwrap();

    let mut frames = Vec::new();
    for _ in 0..1_000 {
        frames = mock.sent_frames("create_order");
        if !frames.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let frame = frames.first().expect("signed frame transmitted");
    assert_eq!(frame["account"], expected_account.as_str());
    assert_eq!(frame["symbol"], "SOL");
    assert_eq!(frame["expiry_window"], 30);
    assert!(frame["signature"].as_str().is_some());
    assert!(frame["timestamp"].as_u64().is_some());
    // the nested `data` form exists only in the signed bytes, never on the wire
    assert!(frame.get("data").is_none());
}

#[tokio::test(start_paused = true)]
async fn signed_actions_without_credentials_are_rejected() {
    let mock = MockHandle::default();
    mock.0.lock().unwrap().hang_when_empty = true;

    let session = ReconnectWs::new(mock.session());
    let (handle, _events) = PelagosStream::spawn(session, None, 16);

    let result = handle
        .send_signed("create_order", &json!({"symbol": "SOL"}), None)
        .await;

    assert!(matches!(result, Err(PelagosError::Authentication(_))));
}
