use crate::core::errors::PelagosError;
use tokio_tungstenite::tungstenite::Message;

/// Codec contract for the venue's WebSocket frames.
///
/// Converts between raw WebSocket messages and typed inbound events, and
/// renders the outbound subscribe/unsubscribe frames. Control messages
/// (ping, pong, close) never reach the codec; the transport handles them.
pub trait WsCodec: Send + Sync + 'static {
    /// The type representing parsed inbound frames.
    type Message: Send;

    /// Encode a subscribe frame for a single channel.
    fn encode_subscribe(&self, channel: &str) -> Result<Message, PelagosError>;

    /// Encode an unsubscribe frame for a single channel.
    fn encode_unsubscribe(&self, channel: &str) -> Result<Message, PelagosError>;

    /// Decode a raw data message.
    ///
    /// # Returns
    /// - `Ok(Some(message))` - successfully decoded
    /// - `Ok(None)` - message ignored/filtered by the codec
    /// - `Err(error)` - malformed frame
    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, PelagosError>;
}
