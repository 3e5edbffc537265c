//! Coordinate spaces and identifiers shared by every actor.
//!
//! Positions come in several flavours: `AbsXyz` is the continuous position a
//! client reports, `AbsIntXyz` is the same position in fixed-point 1/32 block
//! units used by entity packets, `BlockXyz` addresses a single block and
//! `ChunkXz` addresses a 16x128x16 column.

use serde::Deserialize;

pub type EntityId = i32;
pub type ItemId = i16;
pub type BlockId = u8;

pub const CHUNK_WIDTH: i32 = 16;
pub const CHUNK_HEIGHT: i32 = 128;
pub const PIXELS_PER_BLOCK: f64 = 32.0;
/// Height of a standing player's eyes above their feet.
pub const STANCE_NORMAL: f64 = 1.62;

pub const DIMENSION_NORMAL: i8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct AbsXyz {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}
impl AbsXyz {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
    pub fn distance_to(&self, other: &AbsXyz) -> f64 {
        let (dx, dy, dz) = (other.x - self.x, other.y - self.y, other.z - self.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
    pub fn to_chunk_xz(&self) -> ChunkXz {
        ChunkXz {
            x: (self.x / CHUNK_WIDTH as f64).floor() as i32,
            z: (self.z / CHUNK_WIDTH as f64).floor() as i32,
        }
    }
    pub fn to_block_xyz(&self) -> BlockXyz {
        BlockXyz {
            x: self.x.floor() as i32,
            y: self.y.floor() as i32,
            z: self.z.floor() as i32,
        }
    }
    pub fn to_abs_int_xyz(&self) -> AbsIntXyz {
        AbsIntXyz {
            x: (self.x * PIXELS_PER_BLOCK).floor() as i32,
            y: (self.y * PIXELS_PER_BLOCK).floor() as i32,
            z: (self.z * PIXELS_PER_BLOCK).floor() as i32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsIntXyz {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockXyz {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}
impl BlockXyz {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
    /// Splits a block position into its chunk and the offset inside it.
    /// Positions above or below the world have no chunk.
    pub fn to_chunk_local(&self) -> Option<(ChunkXz, SubChunkXyz)> {
        if !(0..CHUNK_HEIGHT).contains(&self.y) {
            return None;
        }
        let chunk = ChunkXz {
            x: self.x.div_euclid(CHUNK_WIDTH),
            z: self.z.div_euclid(CHUNK_WIDTH),
        };
        let sub = SubChunkXyz {
            x: self.x.rem_euclid(CHUNK_WIDTH) as u8,
            y: self.y as u8,
            z: self.z.rem_euclid(CHUNK_WIDTH) as u8,
        };
        Some((chunk, sub))
    }
    pub fn adjacent(&self, face: BlockFace) -> BlockXyz {
        let BlockXyz { x, y, z } = *self;
        match face {
            BlockFace::Bottom => BlockXyz::new(x, y - 1, z),
            BlockFace::Top => BlockXyz::new(x, y + 1, z),
            BlockFace::North => BlockXyz::new(x, y, z - 1),
            BlockFace::South => BlockXyz::new(x, y, z + 1),
            BlockFace::West => BlockXyz::new(x - 1, y, z),
            BlockFace::East => BlockXyz::new(x + 1, y, z),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkXz {
    pub x: i32,
    pub z: i32,
}
impl ChunkXz {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
    /// Every chunk in the square of side `2 * radius + 1` centred on `self`,
    /// row by row.
    pub fn within_radius(self, radius: i32) -> impl Iterator<Item = ChunkXz> {
        (-radius..=radius).flat_map(move |dx| {
            (-radius..=radius).map(move |dz| ChunkXz::new(self.x + dx, self.z + dz))
        })
    }
    pub fn block_origin(&self) -> BlockXyz {
        BlockXyz::new(self.x * CHUNK_WIDTH, 0, self.z * CHUNK_WIDTH)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubChunkXyz {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}
impl SubChunkXyz {
    /// Index into a column's block array (`y` varies fastest).
    pub fn index(&self) -> usize {
        self.y as usize + self.z as usize * CHUNK_HEIGHT as usize
            + self.x as usize * (CHUNK_HEIGHT * CHUNK_WIDTH) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LookDegrees {
    pub yaw: f32,
    pub pitch: f32,
}
impl LookDegrees {
    pub fn to_look_bytes(&self) -> LookBytes {
        fn angle(degrees: f32) -> i8 {
            (degrees.rem_euclid(360.0) * 256.0 / 360.0) as u8 as i8
        }
        LookBytes { yaw: angle(self.yaw), pitch: angle(self.pitch) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookBytes {
    pub yaw: i8,
    pub pitch: i8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFace {
    Bottom,
    Top,
    North,
    South,
    West,
    East,
}
impl BlockFace {
    pub fn from_id(id: i8) -> Option<Self> {
        Some(match id {
            0 => Self::Bottom,
            1 => Self::Top,
            2 => Self::North,
            3 => Self::South,
            4 => Self::West,
            5 => Self::East,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemStack {
    pub id: ItemId,
    pub count: i8,
    pub damage: i16,
}
impl ItemStack {
    pub const fn new(id: ItemId, count: i8) -> Self {
        Self { id, count, damage: 0 }
    }
    pub fn stacks_with(&self, other: &ItemStack) -> bool {
        self.id == other.id && self.damage == other.damage
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name(String);
impl Name {
    pub const MAX_LEN: usize = 16;
    pub fn from_username(name: &str) -> Option<Self> {
        let len = name.chars().count();
        let valid = (1..=Self::MAX_LEN).contains(&len)
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        valid.then(|| Self(name.to_owned()))
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
