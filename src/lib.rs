pub mod client;
pub mod core;

pub use crate::client::{
    build_client, build_stream, PelagosCodec, PelagosRestClient, PelagosStream, StreamEvents,
    StreamHandle,
};
pub use crate::core::{config::PelagosConfig, errors::PelagosError, types::*};
