pub mod client;
pub mod config;
pub mod daemon;
pub mod dispatcher;
pub mod monitoring;
pub mod radio;
pub mod server;
pub mod transport;
pub mod util;
