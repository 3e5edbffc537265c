pub mod actor;
pub mod chunk;
mod collections;
pub mod command;
pub mod config;
pub mod error;
pub mod game;
pub mod metrics;
pub mod network;
pub mod player;
pub mod registry;
pub mod types;
pub mod window;
pub mod world;

pub use config::ServerConfig;
pub use game::{Game, GameHandle, Services};
pub use metrics::Metrics;
pub use network::Network;
pub use registry::Registry;

mod prelude {
    pub(crate) use crate::collections::*;
    pub(crate) use crate::types::*;
    pub(crate) use std::{io, time};
}
