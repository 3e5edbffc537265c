use super::{Phase, Player};
use crate::chunk::ChunkReply;
use crate::error::{Disconnection, EnqueueError};
use crate::network::Packet;
use crate::prelude::*;

impl Player {
    /// Brings a freshly logged in client to a playable view: login reply, the
    /// surrounding chunks, and only then its spawn point and position.
    pub(super) fn post_login(&mut self) -> Result<(), Disconnection> {
        let config = self.services.config.clone();
        self.transmit(
            Packet::Login {
                version_or_entity: self.handle.entity_id(),
                username: String::new(),
                map_seed: config.map_seed,
                dimension: DIMENSION_NORMAL,
            }
            .to_bytes(),
        )?;

        self.send_chunks()?;
        self.phase = Phase::ChunksSent;

        let (position, look) = {
            let state = self.handle.lock();
            (state.position, state.look)
        };
        let spawn = position.to_block_xyz();
        let mut buf = Packet::SpawnPosition { x: spawn.x, y: spawn.y, z: spawn.z }.to_bytes();
        Packet::position_look(position, look, position.y + STANCE_NORMAL, false).write(&mut buf);
        self.transmit(buf)?;
        self.phase = Phase::Spawned;

        let handle = self.handle.clone();
        self.game.enqueue(move |game| game.player_spawned(&handle))?;
        Ok(())
    }

    /// Streams every in-bounds chunk around the participant and waits until
    /// each one is queued or known missing. Chunks queue their own data, so
    /// the outbound queue is sized for the whole view. Returns how many were
    /// sent.
    fn send_chunks(&mut self) -> Result<usize, Disconnection> {
        let config = self.services.config.clone();
        let centre = self.handle.lock().position.to_chunk_xz();
        let keys: Vec<ChunkXz> = centre
            .within_radius(config.chunk_radius)
            .filter(|key| config.in_bounds(*key))
            .collect();

        let mut batch = vec![];
        for key in &keys {
            Packet::pre_chunk(*key, true).write(&mut batch);
        }
        self.transmit(batch)?;

        let requested = keys.len();
        let (done_tx, done_rx) = crossbeam_channel::bounded(requested.max(1));
        let handle = self.handle.clone();
        self.game.enqueue(move |game| game.request_chunks(keys, handle, done_tx))?;

        let mut sent = 0;
        for _ in 0..requested {
            match done_rx.recv() {
                Ok(ChunkReply::Sent(_)) => sent += 1,
                Ok(ChunkReply::Missing(key)) => {
                    log::warn!("chunk {key:?} could not be sent to {}", self.handle.name());
                    self.transmit(Packet::pre_chunk(key, false).to_bytes())?;
                }
                // every request was dropped along with the game
                Err(_) => return Err(EnqueueError::Closed.into()),
            }
        }
        log::debug!("sent {sent} of {requested} chunks to {}", self.handle.name());
        Ok(sent)
    }
}
