use super::wire::{self, ToWire, Wire};
use crate::error::ProtocolError;
use crate::types::*;
use std::io::Read;

pub const PROTOCOL_VERSION: i32 = 14;

/// Digging status reported once the client has finished breaking a block.
pub const DIG_BLOCK_BROKE: i8 = 2;

macro_rules! packets {
    {$($name:ident { $($field:ident : $t:ty),* $(,)? } = $id:literal;)*} => {
        /// Every message either side may send, tagged by its leading id byte.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Packet {
            $($name { $($field: $t),* },)*
        }
        impl Packet {
            pub fn id(&self) -> u8 {
                match self {
                    $(Packet::$name { .. } => $id,)*
                }
            }
            pub fn name(&self) -> &'static str {
                match self {
                    $(Packet::$name { .. } => stringify!($name),)*
                }
            }
            /// Appends the packet to `buf`.
            pub fn write(&self, buf: &mut Vec<u8>) {
                match self {
                    $(Packet::$name { $($field),* } => {
                        buf.push($id);
                        $(ToWire::encode($field, buf);)*
                    })*
                }
            }
            /// Blocks until one whole packet has been read.
            pub fn read(r: &mut impl Read) -> Result<Self, ProtocolError> {
                let id = wire::packet_id(r)?;
                match id {
                    $($id => Ok(Packet::$name { $($field: Wire::decode(r)?),* }),)*
                    _ => Err(ProtocolError::UnknownPacket(id)),
                }
            }
        }
    };
}

packets! {
    KeepAlive {} = 0x00;
    Login { version_or_entity: i32, username: String, map_seed: i64, dimension: i8 } = 0x01;
    Handshake { username_or_hash: String } = 0x02;
    ChatMessage { message: String } = 0x03;
    SpawnPosition { x: i32, y: i32, z: i32 } = 0x06;
    UseEntity { user: i32, target: i32, left_click: bool } = 0x07;
    Respawn {} = 0x09;
    Player { on_ground: bool } = 0x0A;
    PlayerPosition { x: f64, y: f64, stance: f64, z: f64, on_ground: bool } = 0x0B;
    PlayerLook { yaw: f32, pitch: f32, on_ground: bool } = 0x0C;
    PlayerPositionLook {
        x: f64, y: f64, stance: f64, z: f64,
        yaw: f32, pitch: f32, on_ground: bool,
    } = 0x0D;
    PlayerDigging { status: i8, x: i32, y: i8, z: i32, face: i8 } = 0x0E;
    PlayerBlockPlacement { x: i32, y: i8, z: i32, face: i8, item: Option<ItemStack> } = 0x0F;
    HoldingChange { slot: i16 } = 0x10;
    Animation { entity_id: i32, animation: i8 } = 0x12;
    EntityAction { entity_id: i32, action: i8 } = 0x13;
    NamedEntitySpawn {
        entity_id: i32, name: String,
        x: i32, y: i32, z: i32,
        yaw: i8, pitch: i8, current_item: i16,
    } = 0x14;
    DestroyEntity { entity_id: i32 } = 0x1D;
    EntityLook { entity_id: i32, yaw: i8, pitch: i8 } = 0x20;
    EntityTeleport { entity_id: i32, x: i32, y: i32, z: i32, yaw: i8, pitch: i8 } = 0x22;
    PreChunk { x: i32, z: i32, init: bool } = 0x32;
    MapChunk {
        x: i32, y: i16, z: i32,
        size_x: i8, size_y: i8, size_z: i8,
        data: Vec<u8>,
    } = 0x33;
    BlockChange { x: i32, y: i8, z: i32, block_type: i8, metadata: i8 } = 0x35;
    OpenWindow { window_id: i8, inventory_type: i8, title: String, slots: i8 } = 0x64;
    WindowClose { window_id: i8 } = 0x65;
    WindowClick {
        window_id: i8, slot: i16, right_click: bool,
        transaction_id: i16, item: Option<ItemStack>,
    } = 0x66;
    WindowItems { window_id: i8, items: Vec<Option<ItemStack>> } = 0x68;
    Transaction { window_id: i8, transaction_id: i16, accepted: bool } = 0x6A;
    Disconnect { reason: String } = 0xFF;
}

impl Packet {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write(&mut buf);
        buf
    }
    pub fn chat(message: impl Into<String>) -> Self {
        Packet::ChatMessage { message: message.into() }
    }
    pub fn pre_chunk(chunk: ChunkXz, init: bool) -> Self {
        Packet::PreChunk { x: chunk.x, z: chunk.z, init }
    }
    pub fn entity_teleport(entity_id: EntityId, position: AbsIntXyz, look: LookBytes) -> Self {
        Packet::EntityTeleport {
            entity_id,
            x: position.x,
            y: position.y,
            z: position.z,
            yaw: look.yaw,
            pitch: look.pitch,
        }
    }
    pub fn block_change(pos: BlockXyz, block: BlockId, metadata: u8) -> Self {
        Packet::BlockChange {
            x: pos.x,
            y: pos.y as i8,
            z: pos.z,
            block_type: block as i8,
            metadata: metadata as i8,
        }
    }
    /// The server's PlayerPositionLook. Clients send y before stance; the
    /// server sends stance first, so the two fields trade places.
    pub fn position_look(position: AbsXyz, look: LookDegrees, stance: f64, on_ground: bool) -> Self {
        Packet::PlayerPositionLook {
            x: position.x,
            y: stance,
            stance: position.y,
            z: position.z,
            yaw: look.yaw,
            pitch: look.pitch,
            on_ground,
        }
    }
}
