// habsync-api: Async Rust client for the openHAB REST API and WebSocket event stream

pub mod error;
pub mod rest;
pub mod transport;
pub mod websocket;

pub use error::Error;
pub use rest::RestClient;
pub use rest::models::{ItemDescriptor, StateDescription};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{ItemStateEvent, PushConfig, ReconnectConfig, WebSocketHandle};
