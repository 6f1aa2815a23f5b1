pub mod health;
pub mod websocket;

pub use health::{health_handler, health_live_handler, health_ready_handler, metrics_handler};
pub use websocket::raw_websocket_handler;
