// Loopback server and a small blocking client for integration tests.
#![allow(dead_code)]

use chunkserv::error::ProtocolError;
use chunkserv::network::{Packet, PROTOCOL_VERSION};
use chunkserv::world::FlatGenerator;
use chunkserv::{Game, Metrics, Network, Registry, ServerConfig, Services};
use std::io::{BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

// A world of 3x3 chunks, streamed with a radius that reaches past its edge.
pub fn small_world() -> ServerConfig {
    ServerConfig { world_radius: 1, chunk_radius: 2, ..Default::default() }
}

// Start a server on an ephemeral port; it runs until the test binary exits.
pub fn start_server(config: ServerConfig) -> SocketAddr {
    let store = FlatGenerator::new(config.ground_level);
    let services = Services {
        config: Arc::new(config),
        registry: Arc::new(Registry::default()),
        metrics: Arc::new(Metrics::new().expect("register metrics")),
    };
    let game = Game::new(services, Box::new(store)).start().expect("start game");
    let network = Network::bind("127.0.0.1:0").expect("bind ephemeral test port");
    let addr = network.local_addr().expect("get local addr");
    std::thread::spawn(move || network.serve(game));
    addr
}

pub struct TestClient {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    pub entity_id: i32,
    pub pre_chunks: usize,
    pub map_chunks: usize,
}

impl TestClient {
    pub fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("connect to test server");
        stream.set_read_timeout(Some(READ_TIMEOUT)).expect("set read timeout");
        let writer = stream.try_clone().expect("clone stream");
        Self { reader: BufReader::new(stream), writer, entity_id: -1, pre_chunks: 0, map_chunks: 0 }
    }

    // Log in and read everything up to the position packet that ends streaming.
    pub fn join(addr: SocketAddr, name: &str) -> Self {
        let mut client = Self::connect(addr);
        client.send(Packet::Handshake { username_or_hash: name.into() });
        assert_eq!(client.recv(), Packet::Handshake { username_or_hash: "-".into() });
        client.send(Packet::Login {
            version_or_entity: PROTOCOL_VERSION,
            username: name.into(),
            map_seed: 0,
            dimension: 0,
        });
        loop {
            match client.recv() {
                Packet::Login { version_or_entity, .. } => client.entity_id = version_or_entity,
                Packet::PreChunk { init: true, .. } => client.pre_chunks += 1,
                Packet::MapChunk { .. } => client.map_chunks += 1,
                Packet::PlayerPositionLook { .. } => break,
                _ => {}
            }
        }
        client
    }

    pub fn send(&mut self, packet: Packet) {
        self.writer.write_all(&packet.to_bytes()).expect("send packet");
    }

    pub fn recv(&mut self) -> Packet {
        Packet::read(&mut self.reader).expect("receive packet")
    }

    pub fn try_recv(&mut self) -> Result<Packet, ProtocolError> {
        Packet::read(&mut self.reader)
    }

    pub fn recv_until(&mut self, mut wanted: impl FnMut(&Packet) -> bool) -> Packet {
        loop {
            let packet = self.recv();
            if wanted(&packet) {
                return packet;
            }
        }
    }

    // Everything received until the connection has been quiet for `quiet`.
    pub fn drain(&mut self, quiet: Duration) -> Vec<Packet> {
        self.reader.get_ref().set_read_timeout(Some(quiet)).expect("set read timeout");
        let mut packets = vec![];
        while let Ok(packet) = Packet::read(&mut self.reader) {
            packets.push(packet);
        }
        self.reader.get_ref().set_read_timeout(Some(READ_TIMEOUT)).expect("set read timeout");
        packets
    }
}
