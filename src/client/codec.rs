use crate::core::errors::PelagosError;
use crate::core::kernel::WsCodec;
use crate::core::types::{
    OrderBookUpdate, OrderUpdate, StreamEvent, TickerUpdate, TradeUpdate,
};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

/// Pelagos WebSocket codec.
///
/// Outbound: `{"type": "subscribe"|"unsubscribe", "channel": "<name>"}`.
/// Inbound: `{"channel": "<discriminator>", "data": {...}}`; frames whose
/// discriminator is not one of the typed channels come back as
/// [`StreamEvent::Raw`] so nothing is silently dropped.
pub struct PelagosCodec;

impl PelagosCodec {
    pub fn new() -> Self {
        Self
    }

    fn parse_frame(&self, value: Value) -> Result<StreamEvent, PelagosError> {
        let Some(channel) = value.get("channel").and_then(|c| c.as_str()) else {
            return Ok(StreamEvent::Raw(value));
        };

        let Some(data) = value.get("data") else {
            return Ok(StreamEvent::Raw(value));
        };

        let event = match channel {
            "ticker" => StreamEvent::Ticker(decode_data::<TickerUpdate>(channel, data)?),
            "orderbook" => StreamEvent::OrderBook(decode_data::<OrderBookUpdate>(channel, data)?),
            "trade" => StreamEvent::Trade(decode_data::<TradeUpdate>(channel, data)?),
            "order_update" => StreamEvent::Order(decode_data::<OrderUpdate>(channel, data)?),
            _ => StreamEvent::Raw(value),
        };

        Ok(event)
    }
}

fn decode_data<T: serde::de::DeserializeOwned>(
    channel: &str,
    data: &Value,
) -> Result<T, PelagosError> {
    serde_json::from_value(data.clone()).map_err(|e| {
        PelagosError::Deserialization(format!("malformed '{}' frame: {}", channel, e))
    })
}

impl WsCodec for PelagosCodec {
    type Message = StreamEvent;

    fn encode_subscribe(&self, channel: &str) -> Result<Message, PelagosError> {
        let frame = json!({"type": "subscribe", "channel": channel});
        Ok(Message::Text(frame.to_string()))
    }

    fn encode_unsubscribe(&self, channel: &str) -> Result<Message, PelagosError> {
        let frame = json!({"type": "unsubscribe", "channel": channel});
        Ok(Message::Text(frame.to_string()))
    }

    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, PelagosError> {
        match message {
            Message::Text(text) => {
                let value: Value = serde_json::from_str(&text).map_err(|e| {
                    PelagosError::Deserialization(format!("JSON parse error: {}", e))
                })?;
                self.parse_frame(value).map(Some)
            }
            // binary and control frames are not part of the venue protocol
            _ => Ok(None),
        }
    }
}

impl Default for PelagosCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(codec: &PelagosCodec, raw: &str) -> StreamEvent {
        codec
            .decode_message(Message::Text(raw.to_string()))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn subscribe_frame_shape() {
        let codec = PelagosCodec::new();
        let Message::Text(text) = codec.encode_subscribe("ticker.SOL").unwrap() else {
            panic!("expected text frame");
        };
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"type": "subscribe", "channel": "ticker.SOL"}));
    }

    #[test]
    fn unsubscribe_frame_shape() {
        let codec = PelagosCodec::new();
        let Message::Text(text) = codec.encode_unsubscribe("trade.ETH").unwrap() else {
            panic!("expected text frame");
        };
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"type": "unsubscribe", "channel": "trade.ETH"}));
    }

    #[test]
    fn ticker_frames_decode_to_typed_events() {
        let codec = PelagosCodec::new();
        let event = decode(
            &codec,
            r#"{"channel":"ticker","data":{"symbol":"SOL","mark":"23.5","timestamp":1700000000000}}"#,
        );
        match event {
            StreamEvent::Ticker(ticker) => {
                assert_eq!(ticker.symbol, "SOL");
                assert_eq!(ticker.mark, "23.5".parse().unwrap());
            }
            other => panic!("expected ticker, got {:?}", other),
        }
    }

    #[test]
    fn unknown_discriminator_goes_raw() {
        let codec = PelagosCodec::new();
        let event = decode(
            &codec,
            r#"{"channel":"subscriptions","data":{"channels":["ticker.SOL"]}}"#,
        );
        assert!(matches!(event, StreamEvent::Raw(_)));
    }

    #[test]
    fn frame_without_channel_goes_raw() {
        let codec = PelagosCodec::new();
        let event = decode(&codec, r#"{"ack":true,"id":7}"#);
        assert!(matches!(event, StreamEvent::Raw(_)));
    }

    #[test]
    fn malformed_typed_frame_is_a_decode_error() {
        let codec = PelagosCodec::new();
        let result = codec.decode_message(Message::Text(
            r#"{"channel":"trade","data":{"symbol":"SOL"}}"#.to_string(),
        ));
        assert!(matches!(result, Err(PelagosError::Deserialization(_))));
    }
}
