use crate::prelude::*;
use crate::registry::blocks;
use flate2::{write::ZlibEncoder, Compression};
use std::io::Write;

const BLOCKS_PER_CHUNK: usize = (CHUNK_WIDTH * CHUNK_WIDTH * CHUNK_HEIGHT) as usize;

// Where do chunks come from?
//   The game only ever asks for a chunk by key. Whether it was read off disk or
//   generated on the spot is up to the store, and a store may refuse a key
//   (corrupt region, generator failure). Refusals are not fatal: the chunk
//   simply isn't streamed.
pub trait ChunkStore: Send {
    fn load_or_create(&mut self, key: ChunkXz) -> Option<ChunkData>;
}

/// Block ids and metadata nibbles of one 16x128x16 column.
#[derive(Clone)]
pub struct ChunkData {
    blocks: Box<[BlockId; BLOCKS_PER_CHUNK]>,
    metadata: Box<[u8; BLOCKS_PER_CHUNK / 2]>,
}
impl std::fmt::Debug for ChunkData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let solid = self.blocks.iter().filter(|b| **b != blocks::AIR).count();
        f.debug_struct("ChunkData").field("solid_blocks", &solid).finish()
    }
}
impl ChunkData {
    pub fn empty() -> Self {
        Self {
            blocks: Box::new([blocks::AIR; BLOCKS_PER_CHUNK]),
            metadata: Box::new([0; BLOCKS_PER_CHUNK / 2]),
        }
    }
    pub fn block(&self, pos: SubChunkXyz) -> BlockId {
        self.blocks[pos.index()]
    }
    pub fn metadata(&self, pos: SubChunkXyz) -> u8 {
        let idx = pos.index();
        (self.metadata[idx / 2] >> (4 * (idx % 2))) & 0xF
    }
    /// Replaces a block, clearing its metadata, and returns the old id.
    pub fn set_block(&mut self, pos: SubChunkXyz, block: BlockId) -> BlockId {
        let idx = pos.index();
        self.metadata[idx / 2] &= !(0xF << (4 * (idx % 2)));
        core::mem::replace(&mut self.blocks[idx], block)
    }
    /// The MapChunk payload: block ids, metadata, block light and sky light,
    /// zlib compressed.
    pub fn compress(&self) -> io::Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(16 * 1024), Compression::default());
        encoder.write_all(&self.blocks[..])?;
        encoder.write_all(&self.metadata[..])?;
        // lighting isn't simulated: no block light, full sky light everywhere
        encoder.write_all(&[0x00; BLOCKS_PER_CHUNK / 2])?;
        encoder.write_all(&[0xFF; BLOCKS_PER_CHUNK / 2])?;
        encoder.finish()
    }
}

/// Generates an endless superflat world: bedrock, stone up to just below
/// `ground_level`, a layer of dirt and grass on top.
#[derive(Debug, Clone)]
pub struct FlatGenerator {
    pub ground_level: i32,
}
impl FlatGenerator {
    pub fn new(ground_level: i32) -> Self {
        Self { ground_level: ground_level.clamp(1, CHUNK_HEIGHT - 1) }
    }
    fn layer(&self, y: i32) -> BlockId {
        match y {
            0 => blocks::BEDROCK,
            y if y < self.ground_level - 3 => blocks::STONE,
            y if y < self.ground_level => blocks::DIRT,
            y if y == self.ground_level => blocks::GRASS,
            _ => blocks::AIR,
        }
    }
}
impl ChunkStore for FlatGenerator {
    fn load_or_create(&mut self, _key: ChunkXz) -> Option<ChunkData> {
        let mut data = ChunkData::empty();
        for x in 0..CHUNK_WIDTH as u8 {
            for z in 0..CHUNK_WIDTH as u8 {
                for y in 0..=self.ground_level as u8 {
                    data.set_block(SubChunkXyz { x, y, z }, self.layer(y as i32));
                }
            }
        }
        Some(data)
    }
}
