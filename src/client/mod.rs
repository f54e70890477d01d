pub mod builder;
pub mod codec;
pub mod rest;
pub mod stream;

pub use builder::{build_client, build_stream, MAINNET_URL, MAINNET_WS_URL};
pub use codec::PelagosCodec;
pub use rest::PelagosRestClient;
pub use stream::{PelagosStream, StreamEvents, StreamHandle};
