use crate::game::GameHandle;
use crate::prelude::*;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};

mod handshake;
mod packet;
pub mod wire;

pub use handshake::login;
pub use packet::{Packet, DIG_BLOCK_BROKE, PROTOCOL_VERSION};

/// The listening socket. Every accepted connection gets a thread of its own
/// for the login exchange, after which it belongs to the game.
#[derive(Debug)]
pub struct Network {
    listener: TcpListener,
}

impl Network {
    pub fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        Ok(Self { listener: TcpListener::bind(addr)? })
    }
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn serve(&self, game: GameHandle) -> ! {
        loop {
            let (conn, addr) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::error!("unable to accept a connection: {e}");
                    std::thread::sleep(time::Duration::from_millis(100));
                    continue;
                }
            };
            log::debug!("connection from {addr}");
            if let Err(e) = conn.set_nodelay(true) {
                log::warn!("unable to disable nagle for {addr}: {e}");
            }
            let game = game.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("login {addr}"))
                .spawn(move || handshake::admit(conn, &game));
            if let Err(e) = spawned {
                log::error!("unable to start login for {addr}: {e}");
            }
        }
    }
}
