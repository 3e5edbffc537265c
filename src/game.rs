//! The world coordinator.
//!
//! [`Game`] owns the table of participants and the index of loaded chunks.
//! It runs as an actor: every method here is called from a task on the game
//! thread, so none of it needs locking. It never takes a participant's lock;
//! what it knows about a participant comes from the snapshots participants
//! send it.

use crate::actor::{self, Mailbox};
use crate::chunk::{Chunk, ChunkManager, ChunkReply, Completion};
use crate::command::{builtin, CommandFramework};
use crate::config::ServerConfig;
use crate::metrics::Metrics;
use crate::network::Packet;
use crate::player::{Player, PlayerHandle, PlayerSnapshot};
use crate::prelude::*;
use crate::registry::{blocks, Registry};
use crate::world::ChunkStore;
use crossbeam_channel::Sender;
use std::net::TcpStream;
use std::sync::Arc;

pub type GameHandle = Mailbox<Game>;

/// Read-only collaborators shared by every actor.
#[derive(Debug, Clone)]
pub struct Services {
    pub config: Arc<ServerConfig>,
    pub registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
}

struct PlayerEntry {
    handle: PlayerHandle,
    snapshot: PlayerSnapshot,
    /// Set once the participant's client has its chunks and position, and so
    /// can be shown other entities.
    spawned: bool,
}

pub struct Game {
    players: SlotMap<PlayerEntry>,
    chunks: ChunkManager,
    commands: Arc<CommandFramework<Game>>,
    services: Services,
}

impl Game {
    pub fn new(services: Services, store: Box<dyn ChunkStore>) -> Self {
        let mut commands = CommandFramework::new(services.config.command_prefix.clone());
        builtin::register(&mut commands);
        Self {
            players: SlotMap::new(),
            chunks: ChunkManager::new(store, services.config.clone(), services.registry.clone()),
            commands: Arc::new(commands),
            services,
        }
    }
    /// Moves the game onto its own thread.
    pub fn start(self) -> io::Result<GameHandle> {
        let capacity = self.services.config.queue_capacity;
        actor::spawn("game".to_owned(), self, capacity)
    }

    pub fn services(&self) -> &Services {
        &self.services
    }
    pub fn commands(&self) -> &CommandFramework<Game> {
        &self.commands
    }
    pub fn player_names(&self) -> Vec<String> {
        self.players.iter().map(|(_, p)| p.handle.name().to_string()).collect()
    }

    fn entry(&mut self, handle: &PlayerHandle) -> Option<&mut PlayerEntry> {
        let entry = self.players.get_mut(handle.entity_id() as usize)?;
        entry.handle.same_player(handle).then_some(entry)
    }

    /// Admits a participant that has completed the login handshake.
    pub fn join(&mut self, conn: TcpStream, name: Name, game: GameHandle) {
        let entity_id = self.players.next_idx() as EntityId;
        let (player, queues) = Player::new(entity_id, name, game, self.services.clone());
        let handle = player.handle().clone();
        let idx = self.players.insert(PlayerEntry {
            handle: handle.clone(),
            snapshot: PlayerSnapshot::at(self.services.config.spawn),
            spawned: false,
        });
        if let Err(e) = player.start(queues, conn) {
            log::error!("unable to start {}: {e}", handle.name());
            self.players.release(idx);
            return;
        }
        self.services.metrics.player_connected();
        log::info!("{} joined as entity {entity_id}", handle.name());
        self.log_population();
    }

    /// Forgets a participant. Safe to call more than once, and after the
    /// entity id has been reused.
    pub fn remove_player(&mut self, handle: &PlayerHandle) {
        if self.entry(handle).is_none() {
            log::debug!("{} was already removed", handle.name());
            return;
        }
        let Some(entry) = self.players.release(handle.entity_id() as usize) else {
            return;
        };
        self.services.metrics.player_disconnected();
        if entry.spawned {
            self.broadcast(Packet::DestroyEntity { entity_id: handle.entity_id() }.to_bytes(), None);
            self.broadcast(Packet::chat(format!("{} left the game", handle.name())).to_bytes(), None);
        }
        log::info!("{} left", handle.name());
        self.log_population();
    }

    fn log_population(&self) {
        let metrics = self.services.metrics.snapshot();
        log::info!(
            "{} online ({} joins, {} leaves, {} rejected moves)",
            metrics.online(),
            metrics.connections,
            metrics.disconnections,
            metrics.rejected_moves
        );
    }

    /// Shows the newly spawned participant everyone else, and everyone else
    /// the new participant.
    pub fn player_spawned(&mut self, handle: &PlayerHandle) {
        let Some(entry) = self.entry(handle) else {
            return;
        };
        entry.spawned = true;
        let newcomer = spawn_packet(handle, &entry.snapshot).to_bytes();

        let mut others = vec![];
        for (_, other) in self.players.iter().filter(|(_, p)| p.spawned && !p.handle.same_player(handle)) {
            spawn_packet(&other.handle, &other.snapshot).write(&mut others);
        }
        handle.deliver(others);
        self.broadcast(newcomer, Some(handle.entity_id()));
        self.broadcast(Packet::chat(format!("{} joined the game", handle.name())).to_bytes(), None);
    }

    /// Records a participant's accepted movement and shows it to the others.
    pub fn player_moved(&mut self, handle: &PlayerHandle, snapshot: PlayerSnapshot, packet: Vec<u8>) {
        let Some(entry) = self.entry(handle) else {
            return;
        };
        entry.snapshot = snapshot;
        if !entry.spawned {
            return;
        }
        let except = (!self.services.config.broadcast.echo_movement).then_some(handle.entity_id());
        self.broadcast(packet, except);
    }

    pub fn update_snapshot(&mut self, handle: &PlayerHandle, snapshot: PlayerSnapshot) {
        if let Some(entry) = self.entry(handle) {
            entry.snapshot = snapshot;
        }
    }

    /// Sends `packet` to every spawned participant except `except`. Slow
    /// participants are disconnected rather than waited for.
    pub fn broadcast(&self, packet: Vec<u8>, except: Option<EntityId>) {
        for (_, entry) in self.players.iter() {
            if entry.spawned && Some(entry.handle.entity_id()) != except {
                entry.handle.deliver(packet.clone());
            }
        }
    }

    pub fn chat(&mut self, handle: &PlayerHandle, message: String) {
        if self.entry(handle).is_none() {
            return;
        }
        let commands = self.commands.clone();
        if commands.process(self, handle, &message) {
            return;
        }
        log::info!("<{}> {message}", handle.name());
        let line = Packet::chat(format!("<{}> {message}", handle.name())).to_bytes();
        let except = (!self.services.config.broadcast.echo_chat).then_some(handle.entity_id());
        self.broadcast(line, except);
    }

    /// Puts `handle` back at `position`, telling its client and everyone else.
    pub fn teleport(&mut self, handle: &PlayerHandle, position: AbsXyz) {
        let Some(entry) = self.entry(handle) else {
            return;
        };
        entry.snapshot.position = position;
        let snapshot = entry.snapshot;
        handle.deliver_task(move |state| {
            state.position = position;
            let look = state.look;
            state.send(&Packet::position_look(position, look, position.y + STANCE_NORMAL, false));
        });
        let teleport = Packet::entity_teleport(
            handle.entity_id(),
            position.to_abs_int_xyz(),
            snapshot.look.to_look_bytes(),
        );
        self.broadcast(teleport.to_bytes(), Some(handle.entity_id()));
    }

    /// Has each chunk in `keys` send its data to `player`. Every key gets
    /// exactly one reply on `done`, once the data is queued or known missing.
    pub fn request_chunks(&mut self, keys: Vec<ChunkXz>, player: PlayerHandle, done: Sender<ChunkReply>) {
        for key in keys {
            let completion = Completion::new(key, done.clone());
            let Some(chunk) = self.chunks.resolve(key) else {
                continue;
            };
            let player = player.clone();
            let queued = chunk.enqueue(move |chunk| {
                if chunk.stream_to(player) {
                    completion.sent();
                }
            });
            if let Err(e) = queued {
                log::error!("chunk {key:?} is not running: {e}");
            }
        }
    }

    pub fn destroy_block(&mut self, at: BlockXyz) {
        let Some((key, sub)) = at.to_chunk_local() else {
            return;
        };
        let Some(chunk) = self.chunks.get(key) else {
            log::debug!("dig in unloaded chunk {key:?}");
            return;
        };
        if let Err(e) = chunk.enqueue(move |chunk| {
            chunk.destroy_block(sub);
        }) {
            log::error!("chunk {key:?} is not running: {e}");
        }
    }

    /// Handles a participant using the block at `clicked`: a workbench opens
    /// its window, anything else gets `placing` built against `face`.
    pub fn use_block(
        &mut self,
        player: PlayerHandle,
        clicked: BlockXyz,
        face: BlockFace,
        placing: Option<(ItemId, BlockId)>,
    ) {
        let Some((key, sub)) = clicked.to_chunk_local() else {
            return;
        };
        let Some(chunk) = self.chunks.get(key).cloned() else {
            return;
        };
        let target = clicked.adjacent(face).to_chunk_local();
        let target_chunk = target.and_then(|(key, _)| self.chunks.get(key).cloned());
        let registry = self.services.registry.clone();
        let queued = chunk.enqueue(move |chunk| {
            if chunk.block(sub) == blocks::WORKBENCH {
                player.deliver_task(move |state| state.open_workbench(&registry));
                return;
            }
            let (Some((item, block)), Some((target_key, target_sub)), Some(target_chunk)) =
                (placing, target, target_chunk)
            else {
                return;
            };
            let place = move |chunk: &mut Chunk| {
                if chunk.place_block(target_sub, block) {
                    player.deliver_task(move |state| state.use_held(item));
                }
            };
            if target_key == chunk.key() {
                place(chunk);
            } else if let Err(e) = target_chunk.try_enqueue(place) {
                log::warn!("dropped block placement in {target_key:?}: {e}");
            }
        });
        if let Err(e) = queued {
            log::error!("chunk {key:?} is not running: {e}");
        }
    }
}

fn spawn_packet(handle: &PlayerHandle, snapshot: &PlayerSnapshot) -> Packet {
    let position = snapshot.position.to_abs_int_xyz();
    let look = snapshot.look.to_look_bytes();
    Packet::NamedEntitySpawn {
        entity_id: handle.entity_id(),
        name: handle.name().to_string(),
        x: position.x,
        y: position.y,
        z: position.z,
        yaw: look.yaw,
        pitch: look.pitch,
        current_item: snapshot.held_item,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{PlayerState, Queues};
    use crate::world::FlatGenerator;

    fn game(config: ServerConfig) -> Game {
        let services = Services {
            config: Arc::new(config),
            registry: Arc::new(Registry::default()),
            metrics: Arc::new(Metrics::new().unwrap()),
        };
        Game::new(services, Box::new(FlatGenerator::new(64)))
    }

    /// Adds a participant without a connection behind it.
    fn add(game: &mut Game, name: &str) -> (PlayerHandle, Queues) {
        let entity_id = game.players.next_idx() as EntityId;
        let name = Name::from_username(name).unwrap();
        let (handle, queues) = PlayerHandle::new(entity_id, name, PlayerState::new(AbsXyz::default()), 16, 64);
        game.players.insert(PlayerEntry { handle: handle.clone(), snapshot: PlayerSnapshot::at(AbsXyz::default()), spawned: false });
        (handle, queues)
    }

    fn received(queues: &Queues) -> Vec<Packet> {
        let mut packets = vec![];
        for bytes in queues.pending_outbound() {
            let mut reader = &bytes[..];
            while !reader.is_empty() {
                packets.push(Packet::read(&mut reader).unwrap());
            }
        }
        packets
    }

    #[test]
    fn spawning_exchanges_entities() {
        let mut game = game(ServerConfig::default());
        let (a, qa) = add(&mut game, "a");
        let (b, qb) = add(&mut game, "b");
        game.player_spawned(&a);
        received(&qa);
        game.player_spawned(&b);

        assert!(received(&qa).iter().any(|p| matches!(p, Packet::NamedEntitySpawn { entity_id, .. } if *entity_id == b.entity_id())));
        assert!(received(&qb).iter().any(|p| matches!(p, Packet::NamedEntitySpawn { entity_id, .. } if *entity_id == a.entity_id())));
    }

    #[test]
    fn chat_skips_the_sender_by_default() {
        let mut game = game(ServerConfig::default());
        let (a, qa) = add(&mut game, "a");
        let (b, qb) = add(&mut game, "b");
        game.player_spawned(&a);
        game.player_spawned(&b);
        received(&qa);
        received(&qb);

        game.chat(&a, "hello".to_owned());
        assert!(received(&qa).is_empty());
        assert_eq!(received(&qb), vec![Packet::chat("<a> hello")]);
    }

    #[test]
    fn echo_policy_includes_the_sender() {
        let mut config = ServerConfig::default();
        config.broadcast.echo_chat = true;
        let mut game = game(config);
        let (a, qa) = add(&mut game, "a");
        game.player_spawned(&a);
        received(&qa);
        game.chat(&a, "hello".to_owned());
        assert_eq!(received(&qa), vec![Packet::chat("<a> hello")]);
    }

    #[test]
    fn commands_are_not_broadcast() {
        let mut game = game(ServerConfig::default());
        let (a, qa) = add(&mut game, "a");
        let (b, qb) = add(&mut game, "b");
        game.player_spawned(&a);
        game.player_spawned(&b);
        received(&qa);
        received(&qb);

        game.chat(&a, "/list".to_owned());
        assert_eq!(received(&qa), vec![Packet::chat("Online: a, b")]);
        assert!(received(&qb).is_empty());
    }

    #[test]
    fn stale_handles_cannot_remove_a_reused_entity_id() {
        let mut game = game(ServerConfig::default());
        let (a, _qa) = add(&mut game, "a");
        game.remove_player(&a);
        let (b, _qb) = add(&mut game, "b");
        assert_eq!(a.entity_id(), b.entity_id());
        game.remove_player(&a);
        assert_eq!(game.player_names(), vec!["b"]);
    }

    #[test]
    fn removal_is_announced_to_the_rest() {
        let mut game = game(ServerConfig::default());
        let (a, _qa) = add(&mut game, "a");
        let (b, qb) = add(&mut game, "b");
        game.player_spawned(&a);
        game.player_spawned(&b);
        received(&qb);
        game.remove_player(&a);
        let packets = received(&qb);
        assert_eq!(packets[0], Packet::DestroyEntity { entity_id: a.entity_id() });
    }

    #[test]
    fn every_requested_chunk_is_answered() {
        let config = ServerConfig { world_radius: 1, ..Default::default() };
        let mut game = game(config);
        let (a, qa) = add(&mut game, "a");
        let keys: Vec<_> = ChunkXz::new(0, 0).within_radius(2).collect();
        let (tx, rx) = crossbeam_channel::bounded(keys.len());
        game.request_chunks(keys.clone(), a, tx);
        let replies: Vec<_> = (0..keys.len()).map(|_| rx.recv().unwrap()).collect();
        let sent = replies.iter().filter(|r| matches!(r, ChunkReply::Sent(_))).count();
        assert_eq!(sent, 9);
        assert_eq!(replies.len() - sent, 16);
        let map_chunks = received(&qa).iter().filter(|p| matches!(p, Packet::MapChunk { .. })).count();
        assert_eq!(map_chunks, 9);
    }

    /// Waits for everything already queued on the chunk at `key`.
    fn settle(game: &Game, key: ChunkXz) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        game.chunks.get(key).unwrap().enqueue(move |_| tx.send(()).unwrap()).unwrap();
        rx.recv().unwrap();
    }

    fn block_at(game: &Game, at: BlockXyz) -> BlockId {
        let (key, sub) = at.to_chunk_local().unwrap();
        let (tx, rx) = crossbeam_channel::bounded(1);
        game.chunks.get(key).unwrap().enqueue(move |chunk| tx.send(chunk.block(sub)).unwrap()).unwrap();
        rx.recv().unwrap()
    }

    #[test]
    fn chunk_data_is_queued_before_changes_to_it() {
        let mut game = game(ServerConfig { world_radius: 1, ..Default::default() });
        let (a, qa) = add(&mut game, "a");
        let key = ChunkXz::new(0, 0);
        let (tx, rx) = crossbeam_channel::bounded(1);
        game.request_chunks(vec![key], a, tx);
        game.destroy_block(BlockXyz::new(1, 64, 1));
        assert_eq!(rx.recv().unwrap(), ChunkReply::Sent(key));
        settle(&game, key);

        let packets = received(&qa);
        assert_eq!(packets.len(), 2);
        assert!(matches!(packets[0], Packet::MapChunk { x: 0, z: 0, .. }));
        assert_eq!(packets[1], Packet::block_change(BlockXyz::new(1, 64, 1), blocks::AIR, 0));
    }

    #[test]
    fn using_a_workbench_opens_its_window() {
        let mut game = game(ServerConfig::default());
        let (a, qa) = add(&mut game, "a");
        let bench = BlockXyz::new(2, 65, 2);
        let (key, sub) = bench.to_chunk_local().unwrap();
        game.chunks.resolve(key).unwrap().enqueue(move |chunk| {
            chunk.place_block(sub, blocks::WORKBENCH);
        }).unwrap();
        game.use_block(a.clone(), bench, BlockFace::Top, Some((blocks::GLASS as ItemId, blocks::GLASS)));
        settle(&game, key);

        let sent = qa.run_pending_tasks(&a);
        assert!(matches!(Packet::read(&mut &sent[..]).unwrap(), Packet::OpenWindow { window_id: 1, .. }));
        assert_eq!(a.lock().window.id(), 1);
        assert_eq!(block_at(&game, bench.adjacent(BlockFace::Top)), blocks::AIR);
    }

    #[test]
    fn placing_builds_against_the_clicked_face() {
        let mut game = game(ServerConfig::default());
        let (a, qa) = add(&mut game, "a");
        let glass = ItemStack::new(blocks::GLASS as ItemId, 2);
        a.lock().inventory.holding.set(0, Some(glass));
        let grass = BlockXyz::new(1, 64, 1);
        game.chunks.resolve(ChunkXz::new(0, 0));
        game.use_block(a.clone(), grass, BlockFace::Top, Some((glass.id, blocks::GLASS)));
        settle(&game, ChunkXz::new(0, 0));

        assert_eq!(block_at(&game, BlockXyz::new(1, 65, 1)), blocks::GLASS);
        qa.run_pending_tasks(&a);
        assert_eq!(a.lock().held_item().map(|i| i.count), Some(1));
    }

    #[test]
    fn placing_across_a_chunk_edge_goes_through_the_neighbour() {
        let mut game = game(ServerConfig::default());
        let (a, qa) = add(&mut game, "a");
        let glass = ItemStack::new(blocks::GLASS as ItemId, 1);
        a.lock().inventory.holding.set(0, Some(glass));
        let (here, there) = (ChunkXz::new(0, 0), ChunkXz::new(1, 0));
        game.chunks.resolve(here);
        game.chunks.resolve(there);
        game.use_block(a.clone(), BlockXyz::new(15, 64, 3), BlockFace::East, Some((glass.id, blocks::GLASS)));
        assert_eq!(block_at(&game, BlockXyz::new(16, 64, 3)), blocks::GRASS);

        game.use_block(a.clone(), BlockXyz::new(15, 65, 3), BlockFace::East, Some((glass.id, blocks::GLASS)));
        settle(&game, here);
        settle(&game, there);
        assert_eq!(block_at(&game, BlockXyz::new(16, 65, 3)), blocks::GLASS);
        qa.run_pending_tasks(&a);
        assert_eq!(a.lock().held_item(), None);
    }
}
