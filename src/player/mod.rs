//! Participant actors.
//!
//! Each connected client gets two threads. The receive thread reads packets
//! and runs their handlers; the dispatch thread runs closures queued by other
//! actors and writes outgoing bytes. The [`PlayerState`] lock is only ever
//! taken by these two threads. Everyone else talks to a participant through
//! its [`PlayerHandle`], and reads its position from the snapshots it
//! publishes to the game.

mod handlers;
mod streaming;

use crate::actor::Task;
use crate::error::{Disconnection, EnqueueError, ProtocolError};
use crate::game::{GameHandle, Services};
use crate::network::Packet;
use crate::prelude::*;
use crate::registry::Registry;
use crate::window::{PlayerInventory, Window};
use crossbeam_channel::{select, Receiver, Sender};
use parking_lot::{Mutex, MutexGuard};
use std::convert::Infallible;
use std::io::{BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub type PlayerTask = Task<PlayerState>;

/// How far a freshly connected client has got. A participant only exists
/// once its login handshake has succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Authenticated,
    ChunksSent,
    Spawned,
}

/// What other actors may know about a participant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSnapshot {
    pub position: AbsXyz,
    pub look: LookDegrees,
    pub held_item: ItemId,
}
impl PlayerSnapshot {
    pub fn at(position: AbsXyz) -> Self {
        Self { position, look: LookDegrees::default(), held_item: 0 }
    }
}

/// State guarded by the participant's lock.
#[derive(Debug)]
pub struct PlayerState {
    pub position: AbsXyz,
    pub look: LookDegrees,
    pub on_ground: bool,
    pub inventory: PlayerInventory,
    pub cursor: Option<ItemStack>,
    pub holding_slot: usize,
    pub window: Window,
    last_window_id: i8,
    outgoing: Vec<u8>,
}

impl PlayerState {
    pub fn new(position: AbsXyz) -> Self {
        Self {
            position,
            look: LookDegrees::default(),
            on_ground: true,
            inventory: PlayerInventory::new(),
            cursor: None,
            holding_slot: 0,
            window: Window::player(),
            last_window_id: 0,
            outgoing: vec![],
        }
    }
    /// Queues `packet` for the client. Bytes sent from a task are written as
    /// soon as the task returns.
    pub fn send(&mut self, packet: &Packet) {
        packet.write(&mut self.outgoing);
    }
    pub fn held_item(&self) -> Option<ItemStack> {
        self.inventory.held(self.holding_slot)
    }
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            position: self.position,
            look: self.look,
            held_item: self.held_item().map_or(0, |item| item.id),
        }
    }
    /// Opens a crafting table window in place of whatever was open.
    pub fn open_workbench(&mut self, registry: &Registry) {
        self.close_window(registry);
        self.last_window_id = self.last_window_id % 100 + 1;
        self.window = Window::workbench(self.last_window_id);
        if let Some(packet) = self.window.open_packet() {
            self.send(&packet);
        }
    }
    pub fn close_window(&mut self, registry: &Registry) {
        let lost = self.window.close(&mut self.inventory, &mut self.cursor, registry);
        if !lost.is_empty() {
            log::debug!("no room for {} stacks when closing a window", lost.len());
        }
    }
    /// Takes one of the held item after it has been placed in the world.
    pub fn use_held(&mut self, id: ItemId) {
        let slot = self.holding_slot;
        match self.inventory.holding.get(slot) {
            Some(item) if item.id == id => {
                let left = ItemStack { count: item.count - 1, ..item };
                self.inventory.holding.set(slot, (left.count > 0).then_some(left));
            }
            _ => log::debug!("held item changed before item {id} was placed"),
        }
    }
}

struct Shared {
    entity_id: EntityId,
    name: Name,
    state: Mutex<PlayerState>,
    tasks: Sender<PlayerTask>,
    outbound: Sender<Vec<u8>>,
    shutdown: Sender<()>,
    closed: AtomicBool,
}

/// A cloneable reference to a participant. Holding one does not keep the
/// connection open.
#[derive(Clone)]
pub struct PlayerHandle(Arc<Shared>);

impl std::fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerHandle")
            .field("entity_id", &self.0.entity_id)
            .field("name", &self.0.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// The receiving ends of a participant's queues, consumed by [`dispatch`].
pub struct Queues {
    tasks: Receiver<PlayerTask>,
    outbound: Receiver<Vec<u8>>,
    shutdown: Receiver<()>,
}

impl PlayerHandle {
    pub fn new(
        entity_id: EntityId,
        name: Name,
        state: PlayerState,
        capacity: usize,
        outbound_capacity: usize,
    ) -> (Self, Queues) {
        let (tasks_tx, tasks) = crossbeam_channel::bounded(capacity);
        let (outbound_tx, outbound) = crossbeam_channel::bounded(outbound_capacity);
        let (shutdown_tx, shutdown) = crossbeam_channel::bounded(1);
        let shared = Shared {
            entity_id,
            name,
            state: Mutex::new(state),
            tasks: tasks_tx,
            outbound: outbound_tx,
            shutdown: shutdown_tx,
            closed: AtomicBool::new(false),
        };
        (Self(Arc::new(shared)), Queues { tasks, outbound, shutdown })
    }
    pub fn entity_id(&self) -> EntityId {
        self.0.entity_id
    }
    pub fn name(&self) -> &Name {
        &self.0.name
    }
    pub fn is_closed(&self) -> bool {
        self.0.closed.load(Ordering::Acquire)
    }
    pub fn same_player(&self, other: &PlayerHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn check_open(&self) -> Result<(), EnqueueError> {
        if self.is_closed() {
            return Err(EnqueueError::Closed);
        }
        Ok(())
    }
    /// Queues `f` to run on the dispatch thread, waiting for room.
    pub fn enqueue(&self, f: impl FnOnce(&mut PlayerState) + Send + 'static) -> Result<(), EnqueueError> {
        self.check_open()?;
        Ok(self.0.tasks.send(Box::new(f))?)
    }
    pub fn try_enqueue(&self, f: impl FnOnce(&mut PlayerState) + Send + 'static) -> Result<(), EnqueueError> {
        self.check_open()?;
        Ok(self.0.tasks.try_send(Box::new(f))?)
    }
    /// Queues encoded packets for the client, waiting for room. Empty
    /// payloads are dropped.
    pub fn transmit(&self, bytes: Vec<u8>) -> Result<(), EnqueueError> {
        self.check_open()?;
        if bytes.is_empty() {
            return Ok(());
        }
        Ok(self.0.outbound.send(bytes)?)
    }
    pub fn try_transmit(&self, bytes: Vec<u8>) -> Result<(), EnqueueError> {
        self.check_open()?;
        if bytes.is_empty() {
            return Ok(());
        }
        Ok(self.0.outbound.try_send(bytes)?)
    }

    /// Sends without ever blocking the caller. A participant that can't keep
    /// up is disconnected. Returns whether the participant is still live.
    pub fn deliver(&self, bytes: Vec<u8>) -> bool {
        let result = self.try_transmit(bytes);
        self.after_delivery(result)
    }
    /// As [`deliver`](Self::deliver), for a task.
    pub fn deliver_task(&self, f: impl FnOnce(&mut PlayerState) + Send + 'static) -> bool {
        let result = self.try_enqueue(f);
        self.after_delivery(result)
    }
    fn after_delivery(&self, result: Result<(), EnqueueError>) -> bool {
        match result {
            Ok(()) => true,
            Err(EnqueueError::Full) => {
                log::warn!("{} is not keeping up, disconnecting", self.name());
                self.close();
                false
            }
            Err(EnqueueError::Closed) => false,
        }
    }

    /// Stops the participant. The dispatch thread writes out what was
    /// already queued, then closes the socket. Idempotent.
    pub fn close(&self) {
        if !self.0.closed.swap(true, Ordering::AcqRel) {
            let _ = self.0.shutdown.try_send(());
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, PlayerState> {
        self.0.state.lock()
    }

    #[cfg(test)]
    pub(crate) fn detached(entity_id: EntityId, name: &str) -> (Self, Queues) {
        let name = Name::from_username(name).expect("test names are valid");
        Self::new(entity_id, name, PlayerState::new(AbsXyz::default()), 128, 128)
    }
}

impl Queues {
    #[cfg(test)]
    pub(crate) fn pending_outbound(&self) -> Vec<Vec<u8>> {
        self.outbound.try_iter().collect()
    }
    /// Runs queued tasks the way [`dispatch`] would and returns what they sent.
    #[cfg(test)]
    pub(crate) fn run_pending_tasks(&self, player: &PlayerHandle) -> Vec<u8> {
        let mut state = player.lock();
        for task in self.tasks.try_iter() {
            task(&mut state);
        }
        std::mem::take(&mut state.outgoing)
    }
}

/// Runs queued tasks and writes queued bytes to `conn` until the participant
/// is closed, then writes whatever bytes are still queued.
pub fn dispatch(player: &PlayerHandle, queues: Queues, conn: &mut impl Write) {
    loop {
        let written = select! {
            recv(queues.tasks) -> task => match task {
                Ok(task) => {
                    let out = {
                        let mut state = player.lock();
                        task(&mut state);
                        std::mem::take(&mut state.outgoing)
                    };
                    conn.write_all(&out)
                }
                Err(_) => break,
            },
            recv(queues.outbound) -> bytes => match bytes {
                Ok(bytes) => conn.write_all(&bytes),
                Err(_) => break,
            },
            recv(queues.shutdown) -> _ => break,
        };
        if let Err(e) = written {
            log_write_error(player, &e);
            player.close();
            return;
        }
    }
    for bytes in queues.outbound.try_iter() {
        if let Err(e) = conn.write_all(&bytes) {
            log_write_error(player, &e);
            return;
        }
    }
    if let Err(e) = conn.flush() {
        log_write_error(player, &e);
    }
}

fn log_write_error(player: &PlayerHandle, e: &io::Error) {
    match e.kind() {
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset => {
            log::debug!("{} went away while being written to", player.name())
        }
        _ => log::error!("unable to write to {}: {e}", player.name()),
    }
}

/// The receive side of a participant, owned by its receive thread.
pub struct Player {
    handle: PlayerHandle,
    game: GameHandle,
    services: Services,
    phase: Phase,
}

impl Player {
    pub fn new(entity_id: EntityId, name: Name, game: GameHandle, services: Services) -> (Self, Queues) {
        let state = PlayerState::new(services.config.spawn);
        let config = &services.config;
        let (handle, queues) =
            PlayerHandle::new(entity_id, name, state, config.queue_capacity, config.outbound_capacity());
        (Self { handle, game, services, phase: Phase::Authenticated }, queues)
    }
    pub fn handle(&self) -> &PlayerHandle {
        &self.handle
    }
    /// Blocking transmit from the receive thread. Fails once the participant
    /// has been closed.
    fn transmit(&self, bytes: Vec<u8>) -> Result<(), Disconnection> {
        self.handle.transmit(bytes).map_err(|_| Disconnection::Closed)
    }

    /// Starts the dispatch and receive threads for `conn`.
    pub fn start(self, queues: Queues, conn: TcpStream) -> io::Result<()> {
        let name = self.handle.name().to_string();
        let handle = self.handle.clone();
        let mut writer = conn.try_clone()?;
        std::thread::Builder::new()
            .name(format!("player {name} dispatch"))
            .spawn(move || {
                dispatch(&handle, queues, &mut writer);
                match writer.shutdown(Shutdown::Both) {
                    Err(e) if e.kind() != io::ErrorKind::NotConnected => {
                        log::debug!("closing {}'s socket: {e}", handle.name())
                    }
                    _ => {}
                }
            })?;
        let handle = self.handle.clone();
        std::thread::Builder::new()
            .name(format!("player {name} receive"))
            .spawn(move || self.run(BufReader::new(conn)))
            .map_err(|e| {
                handle.close();
                e
            })?;
        Ok(())
    }

    fn run(mut self, mut conn: impl Read) {
        let err = match self.serve(&mut conn) {
            Ok(never) => match never {},
            Err(e) => e,
        };
        self.log_disconnection(&err);
        self.handle.close();
        let handle = self.handle.clone();
        if let Err(e) = self.game.enqueue(move |game| game.remove_player(&handle)) {
            log::error!("unable to remove {} from the game: {e}", self.handle.name());
        }
    }

    fn serve(&mut self, conn: &mut impl Read) -> Result<Infallible, Disconnection> {
        self.post_login()?;
        loop {
            let packet = Packet::read(conn)?;
            log::trace!("{} sent {packet:?}", self.handle.name());
            self.handle_packet(packet)?;
        }
    }

    fn log_disconnection(&self, err: &Disconnection) {
        let name = self.handle.name();
        match err {
            Disconnection::Protocol(ProtocolError::EndOfStream) => log::debug!("{name} closed the connection"),
            Disconnection::Protocol(ProtocolError::Io(e)) if !self.handle.is_closed() => {
                log::error!("lost connection to {name}: {e}")
            }
            Disconnection::Protocol(ProtocolError::Io(_)) | Disconnection::Closed => {
                log::debug!("{name} was disconnected by the server")
            }
            Disconnection::Protocol(e) => log::warn!("disconnecting {name}: {e}"),
            Disconnection::Quit(reason) => log::info!("{name} quit: {reason}"),
            Disconnection::Game(e) => log::warn!("disconnecting {name}: {e}"),
        }
    }
}
