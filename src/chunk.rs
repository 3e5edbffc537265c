//! Chunk actors: each loaded column of the world lives on its own thread and
//! is only ever touched by tasks queued through its [`ChunkHandle`].

use crate::actor::{self, Mailbox};
use crate::config::ServerConfig;
use crate::network::Packet;
use crate::player::PlayerHandle;
use crate::prelude::*;
use crate::registry::{blocks, Registry};
use crate::world::{ChunkData, ChunkStore};
use crossbeam_channel::Sender;
use std::collections::HashMap;
use std::sync::Arc;

pub type ChunkHandle = Mailbox<Chunk>;

pub struct Chunk {
    key: ChunkXz,
    data: ChunkData,
    registry: Arc<Registry>,
    /// Participants that were sent this chunk and want its block changes.
    subscribers: Vec<PlayerHandle>,
}

impl Chunk {
    pub fn new(key: ChunkXz, data: ChunkData, registry: Arc<Registry>) -> Self {
        Self { key, data, registry, subscribers: vec![] }
    }
    pub fn key(&self) -> ChunkXz {
        self.key
    }
    pub fn block(&self, pos: SubChunkXyz) -> BlockId {
        self.data.block(pos)
    }
    pub fn subscribe(&mut self, player: PlayerHandle) {
        self.subscribers.retain(|p| !p.is_closed());
        if !self.subscribers.iter().any(|p| p.same_player(&player)) {
            self.subscribers.push(player);
        }
    }
    /// Sends the chunk's blocks to `player` and subscribes it to later
    /// changes. Data and changes share the participant's send queue, so the
    /// client always has the chunk before any change to it.
    pub fn stream_to(&mut self, player: PlayerHandle) -> bool {
        let packet = match self.produce_chunk_data() {
            Ok(packet) => packet,
            Err(e) => {
                log::error!("unable to compress chunk {:?}: {e}", self.key);
                return false;
            }
        };
        if !player.deliver(packet) {
            log::debug!("{} left before chunk {:?} was sent", player.name(), self.key);
            return false;
        }
        self.subscribe(player);
        true
    }
    /// Serializes the chunk's current blocks as a MapChunk packet.
    pub fn produce_chunk_data(&self) -> io::Result<Vec<u8>> {
        let origin = self.key.block_origin();
        Ok(Packet::MapChunk {
            x: origin.x,
            y: 0,
            z: origin.z,
            size_x: (CHUNK_WIDTH - 1) as i8,
            size_y: (CHUNK_HEIGHT - 1) as i8,
            size_z: (CHUNK_WIDTH - 1) as i8,
            data: self.data.compress()?,
        }
        .to_bytes())
    }
    /// Digs out a block. Air and indestructable blocks are left alone.
    pub fn destroy_block(&mut self, pos: SubChunkXyz) -> bool {
        let current = self.data.block(pos);
        let destructable = self.registry.block(current).map_or(false, |b| b.destructable);
        if current == blocks::AIR || !destructable {
            log::debug!("refusing to destroy block {current} at {pos:?} in {:?}", self.key);
            return false;
        }
        self.data.set_block(pos, blocks::AIR);
        self.notify(pos, blocks::AIR);
        true
    }
    /// Places `block` where the current block may be built over.
    pub fn place_block(&mut self, pos: SubChunkXyz, block: BlockId) -> bool {
        let current = self.data.block(pos);
        if !self.registry.block(current).map_or(false, |b| b.replaceable) || self.registry.block(block).is_none() {
            log::debug!("refusing to place block {block} over {current} at {pos:?} in {:?}", self.key);
            return false;
        }
        self.data.set_block(pos, block);
        self.notify(pos, block);
        true
    }
    fn notify(&mut self, pos: SubChunkXyz, block: BlockId) {
        let origin = self.key.block_origin();
        let world_pos = BlockXyz::new(origin.x + pos.x as i32, pos.y as i32, origin.z + pos.z as i32);
        let packet = Packet::block_change(world_pos, block, self.data.metadata(pos)).to_bytes();
        self.subscribers.retain(|p| p.deliver(packet.clone()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkReply {
    /// The chunk's data is queued for the participant.
    Sent(ChunkXz),
    Missing(ChunkXz),
}

/// One outstanding chunk request. Exactly one reply is sent per completion:
/// either `sent`, or `Missing` when it is dropped unanswered, which also
/// covers requests discarded with a dead chunk's queue.
pub struct Completion {
    key: ChunkXz,
    tx: Option<Sender<ChunkReply>>,
}
impl Completion {
    pub fn new(key: ChunkXz, tx: Sender<ChunkReply>) -> Self {
        Self { key, tx: Some(tx) }
    }
    pub fn sent(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.try_send(ChunkReply::Sent(self.key));
        }
    }
}
impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.try_send(ChunkReply::Missing(self.key));
        }
    }
}

/// The game's index of loaded chunks.
pub struct ChunkManager {
    chunks: HashMap<ChunkXz, ChunkHandle>,
    store: Box<dyn ChunkStore>,
    config: Arc<ServerConfig>,
    registry: Arc<Registry>,
}
impl ChunkManager {
    pub fn new(store: Box<dyn ChunkStore>, config: Arc<ServerConfig>, registry: Arc<Registry>) -> Self {
        Self { chunks: HashMap::new(), store, config, registry }
    }
    pub fn get(&self, key: ChunkXz) -> Option<&ChunkHandle> {
        self.chunks.get(&key)
    }
    pub fn loaded(&self) -> usize {
        self.chunks.len()
    }
    /// Returns the chunk actor for `key`, loading and starting it on first
    /// use. Chunks outside the world, or that the store can't produce, are
    /// not found.
    pub fn resolve(&mut self, key: ChunkXz) -> Option<&ChunkHandle> {
        if !self.config.in_bounds(key) {
            return None;
        }
        if !self.chunks.contains_key(&key) {
            let Some(data) = self.store.load_or_create(key) else {
                log::warn!("chunk store could not produce {key:?}");
                return None;
            };
            let chunk = Chunk::new(key, data, self.registry.clone());
            let name = format!("chunk {},{}", key.x, key.z);
            match actor::spawn(name, chunk, self.config.queue_capacity) {
                Ok(handle) => {
                    self.chunks.insert(key, handle);
                }
                Err(e) => {
                    log::error!("unable to start chunk {key:?}: {e}");
                    return None;
                }
            }
        }
        self.chunks.get(&key)
    }
}
