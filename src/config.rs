use crate::error::ConfigError;
use crate::types::{AbsXyz, ChunkXz};
use serde::Deserialize;
use std::path::Path;

/// Whether a participant hears its own broadcasts.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct BroadcastPolicy {
    pub echo_movement: bool,
    pub echo_chat: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    /// Capacity of every actor's task queue. A participant's send queue also
    /// has room for one chunk of its initial view per streamed key.
    pub queue_capacity: usize,
    /// Chunks streamed around a spawning participant, in each direction.
    pub chunk_radius: i32,
    /// Chunks with `|x|` and `|z|` at most this far from the origin exist.
    pub world_radius: i32,
    pub max_move_distance: f64,
    pub max_chat_length: usize,
    pub spawn: AbsXyz,
    pub map_seed: i64,
    pub ground_level: i32,
    pub broadcast: BroadcastPolicy,
    pub command_prefix: String,
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:25565".to_owned(),
            queue_capacity: 128,
            chunk_radius: 5,
            world_radius: 32,
            max_move_distance: 10.0,
            max_chat_length: 100,
            spawn: AbsXyz::new(0.5, 65.0, 0.5),
            map_seed: 0,
            ground_level: 64,
            broadcast: BroadcastPolicy::default(),
            command_prefix: "/".to_owned(),
        }
    }
}
impl ServerConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
    pub fn in_bounds(&self, chunk: ChunkXz) -> bool {
        chunk.x.abs() <= self.world_radius && chunk.z.abs() <= self.world_radius
    }
    /// The most chunks a spawning participant is sent.
    pub fn streamed_chunks(&self) -> usize {
        let side = 2 * self.chunk_radius.max(0) as usize + 1;
        side * side
    }
    pub fn outbound_capacity(&self) -> usize {
        self.queue_capacity + self.streamed_chunks()
    }
}
