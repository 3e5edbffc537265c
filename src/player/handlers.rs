use super::{Phase, Player};
use crate::error::{Disconnection, ProtocolError};
use crate::network::{Packet, DIG_BLOCK_BROKE};
use crate::prelude::*;

/// How far from a participant's eyes a block can be dug or built on.
const MAX_REACH: f64 = 6.0;

impl Player {
    pub(super) fn handle_packet(&mut self, packet: Packet) -> Result<(), Disconnection> {
        match packet {
            Packet::KeepAlive {} => Ok(()),
            Packet::ChatMessage { message } => self.chat(message),
            Packet::Player { on_ground } => {
                self.handle.lock().on_ground = on_ground;
                Ok(())
            }
            Packet::PlayerPosition { x, y, z, on_ground, .. } => {
                self.move_to(AbsXyz::new(x, y, z), None, on_ground)
            }
            Packet::PlayerLook { yaw, pitch, on_ground } => self.look(LookDegrees { yaw, pitch }, on_ground),
            Packet::PlayerPositionLook { x, y, z, yaw, pitch, on_ground, .. } => {
                self.move_to(AbsXyz::new(x, y, z), Some(LookDegrees { yaw, pitch }), on_ground)
            }
            Packet::PlayerDigging { status, x, y, z, .. } => self.dig(status, BlockXyz::new(x, y as i32, z)),
            Packet::PlayerBlockPlacement { x, y, z, face, item } => {
                self.place(BlockXyz::new(x, y as i32, z), face, item)
            }
            Packet::HoldingChange { slot } => self.hold(slot),
            Packet::WindowClick { window_id, slot, right_click, transaction_id, .. } => {
                self.click(window_id, slot, right_click, transaction_id)
            }
            Packet::WindowClose { window_id } => {
                let mut state = self.handle.lock();
                if state.window.id() == window_id {
                    state.close_window(&self.services.registry);
                }
                Ok(())
            }
            Packet::UseEntity { .. }
            | Packet::Respawn {}
            | Packet::Animation { .. }
            | Packet::EntityAction { .. }
            | Packet::Transaction { .. } => Ok(()),
            Packet::Disconnect { reason } => Err(Disconnection::Quit(reason)),
            other @ (Packet::Login { .. }
            | Packet::Handshake { .. }
            | Packet::SpawnPosition { .. }
            | Packet::NamedEntitySpawn { .. }
            | Packet::DestroyEntity { .. }
            | Packet::EntityLook { .. }
            | Packet::EntityTeleport { .. }
            | Packet::PreChunk { .. }
            | Packet::MapChunk { .. }
            | Packet::BlockChange { .. }
            | Packet::OpenWindow { .. }
            | Packet::WindowItems { .. }) => Err(ProtocolError::Unexpected(other.name()).into()),
        }
    }

    fn chat(&mut self, message: String) -> Result<(), Disconnection> {
        let limit = self.services.config.max_chat_length;
        if message.chars().count() > limit {
            log::warn!("dropped {} character chat line from {}", message.chars().count(), self.handle.name());
            return Ok(());
        }
        let handle = self.handle.clone();
        self.game.enqueue(move |game| game.chat(&handle, message))?;
        Ok(())
    }

    /// Moves the participant unless the jump from its last accepted position
    /// is implausible, in which case nothing changes and nobody is told.
    fn move_to(&mut self, position: AbsXyz, look: Option<LookDegrees>, on_ground: bool) -> Result<(), Disconnection> {
        if !self.spawned() {
            return Ok(());
        }
        let (snapshot, teleport) = {
            let mut state = self.handle.lock();
            let distance = state.position.distance_to(&position);
            // NaN compares false, so garbage coordinates are refused too
            if !(distance <= self.services.config.max_move_distance) {
                log::warn!(
                    "{} tried to move {distance:.1} blocks from {:?} to {position:?}",
                    self.handle.name(),
                    state.position
                );
                self.services.metrics.move_rejected();
                return Ok(());
            }
            state.position = position;
            state.on_ground = on_ground;
            if let Some(look) = look {
                state.look = look;
            }
            let snapshot = state.snapshot();
            let teleport = Packet::entity_teleport(
                self.handle.entity_id(),
                snapshot.position.to_abs_int_xyz(),
                snapshot.look.to_look_bytes(),
            );
            (snapshot, teleport.to_bytes())
        };
        let handle = self.handle.clone();
        self.game.enqueue(move |game| game.player_moved(&handle, snapshot, teleport))?;
        Ok(())
    }

    fn look(&mut self, look: LookDegrees, on_ground: bool) -> Result<(), Disconnection> {
        if !self.spawned() {
            return Ok(());
        }
        let snapshot = {
            let mut state = self.handle.lock();
            state.look = look;
            state.on_ground = on_ground;
            state.snapshot()
        };
        let bytes = snapshot.look.to_look_bytes();
        let packet = Packet::EntityLook { entity_id: self.handle.entity_id(), yaw: bytes.yaw, pitch: bytes.pitch };
        let handle = self.handle.clone();
        self.game.enqueue(move |game| game.player_moved(&handle, snapshot, packet.to_bytes()))?;
        Ok(())
    }

    /// Movement before the client has its position is left over from
    /// whatever it was doing before, and is dropped.
    fn spawned(&self) -> bool {
        if self.phase < Phase::Spawned {
            log::debug!("{} moved before spawning", self.handle.name());
            return false;
        }
        true
    }

    fn within_reach(&self, block: BlockXyz) -> bool {
        let state = self.handle.lock();
        let eyes = AbsXyz::new(state.position.x, state.position.y + STANCE_NORMAL, state.position.z);
        let centre = AbsXyz::new(block.x as f64 + 0.5, block.y as f64 + 0.5, block.z as f64 + 0.5);
        eyes.distance_to(&centre) <= MAX_REACH
    }

    fn dig(&mut self, status: i8, at: BlockXyz) -> Result<(), Disconnection> {
        if status != DIG_BLOCK_BROKE {
            return Ok(());
        }
        if !self.within_reach(at) {
            log::warn!("{} tried to dig out of reach at {at:?}", self.handle.name());
            return Ok(());
        }
        self.game.enqueue(move |game| game.destroy_block(at))?;
        Ok(())
    }

    fn place(&mut self, clicked: BlockXyz, face: i8, item: Option<ItemStack>) -> Result<(), Disconnection> {
        // face -1 is "use the held item" without pointing at a block
        let Some(face) = BlockFace::from_id(face) else {
            return Ok(());
        };
        if !self.within_reach(clicked) {
            log::warn!("{} tried to use a block out of reach at {clicked:?}", self.handle.name());
            return Ok(());
        }
        let held = self.handle.lock().held_item();
        let placing = match (item, held) {
            (Some(item), Some(held)) if item.id == held.id => {
                self.services.registry.block_for_item(item.id).map(|block| (item.id, block))
            }
            (Some(item), _) => {
                log::debug!("{} used item {} but holds {held:?}", self.handle.name(), item.id);
                None
            }
            (None, _) => None,
        };
        let handle = self.handle.clone();
        self.game.enqueue(move |game| game.use_block(handle, clicked, face, placing))?;
        Ok(())
    }

    fn hold(&mut self, slot: i16) -> Result<(), Disconnection> {
        let snapshot = {
            let mut state = self.handle.lock();
            match usize::try_from(slot) {
                Ok(slot) if slot < state.inventory.holding.len() => state.holding_slot = slot,
                _ => {
                    log::warn!("{} selected holding slot {slot}", self.handle.name());
                    return Ok(());
                }
            }
            state.snapshot()
        };
        let handle = self.handle.clone();
        self.game.enqueue(move |game| game.update_snapshot(&handle, snapshot))?;
        Ok(())
    }

    fn click(&mut self, window_id: i8, slot: i16, right_click: bool, transaction_id: i16) -> Result<(), Disconnection> {
        let mut reply = vec![];
        {
            let mut guard = self.handle.lock();
            let state = &mut *guard;
            let accepted = if state.window.id() == window_id {
                state.window.click(&mut state.inventory, slot, &mut state.cursor, right_click, false, &self.services.registry)
            } else {
                log::warn!("{} clicked in window {window_id} while {} is open", self.handle.name(), state.window.id());
                false
            };
            Packet::Transaction { window_id, transaction_id, accepted }.write(&mut reply);
            if !accepted && state.window.id() == window_id {
                let items = state.window.items(&state.inventory);
                Packet::WindowItems { window_id, items }.write(&mut reply);
            }
        }
        self.transmit(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Mailbox, Task};
    use crate::config::ServerConfig;
    use crate::game::{Game, Services};
    use crate::metrics::Metrics;
    use crate::player::Queues;
    use crate::registry::Registry;
    use crossbeam_channel::Receiver;
    use std::sync::Arc;

    /// A spawned participant at (0.5, 65, 0.5) whose game is just a queue.
    fn spawned_player() -> (Player, Queues, Receiver<Task<Game>>) {
        let services = Services {
            config: Arc::new(ServerConfig::default()),
            registry: Arc::new(Registry::default()),
            metrics: Arc::new(Metrics::new().unwrap()),
        };
        let (game, tasks) = Mailbox::bounded(8);
        let (mut player, queues) = Player::new(0, Name::from_username("alex").unwrap(), game, services);
        player.phase = Phase::Spawned;
        (player, queues, tasks)
    }

    fn step(x: f64, z: f64) -> Packet {
        Packet::PlayerPosition { x, y: 65.0, stance: 66.62, z, on_ground: true }
    }

    fn position(player: &Player) -> AbsXyz {
        player.handle.lock().position
    }

    #[test]
    fn short_moves_are_applied_and_reported() {
        let (mut player, _queues, game) = spawned_player();
        player.handle_packet(step(8.5, 0.5)).unwrap();
        assert_eq!(position(&player), AbsXyz::new(8.5, 65.0, 0.5));
        assert_eq!(game.try_iter().count(), 1);
    }

    #[test]
    fn implausible_moves_leave_the_position_alone() {
        let (mut player, _queues, game) = spawned_player();
        player.handle_packet(step(100.5, 0.5)).unwrap();
        assert_eq!(position(&player), AbsXyz::new(0.5, 65.0, 0.5));
        assert_eq!(game.try_iter().count(), 0);
        assert_eq!(player.services.metrics.snapshot().rejected_moves, 1);

        player.handle_packet(step(1.5, 0.5)).unwrap();
        assert_eq!(position(&player), AbsXyz::new(1.5, 65.0, 0.5));
    }

    #[test]
    fn nan_coordinates_are_rejected() {
        let (mut player, _queues, game) = spawned_player();
        player.handle_packet(step(f64::NAN, 0.5)).unwrap();
        assert_eq!(position(&player), AbsXyz::new(0.5, 65.0, 0.5));
        assert_eq!(game.try_iter().count(), 0);
        assert_eq!(player.services.metrics.snapshot().rejected_moves, 1);
    }

    #[test]
    fn movement_before_spawning_is_dropped() {
        let (mut player, _queues, game) = spawned_player();
        player.phase = Phase::ChunksSent;
        player.handle_packet(step(2.5, 0.5)).unwrap();
        player.handle_packet(Packet::PlayerLook { yaw: 90.0, pitch: 0.0, on_ground: true }).unwrap();
        assert_eq!(position(&player), AbsXyz::new(0.5, 65.0, 0.5));
        assert_eq!(game.try_iter().count(), 0);
        assert_eq!(player.services.metrics.snapshot().rejected_moves, 0);
    }

    #[test]
    fn a_disconnect_packet_ends_the_session() {
        let (mut player, _queues, _game) = spawned_player();
        let err = player.handle_packet(Packet::Disconnect { reason: "bye".into() }).unwrap_err();
        assert!(matches!(err, Disconnection::Quit(reason) if reason == "bye"));
    }
}
