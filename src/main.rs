use chunkserv::world::FlatGenerator;
use chunkserv::{Game, Metrics, Network, Registry, ServerConfig, Services};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let config = match std::env::args_os().nth(1) {
        Some(path) => ServerConfig::from_path(path)?,
        None => ServerConfig::default(),
    };
    let services = Services {
        config: Arc::new(config),
        registry: Arc::new(Registry::default()),
        metrics: Arc::new(Metrics::new()?),
    };
    let store = FlatGenerator::new(services.config.ground_level);
    let game = Game::new(services.clone(), Box::new(store)).start()?;

    let network = Network::bind(services.config.address.as_str())?;
    log::info!("listening on {}", network.local_addr()?);
    network.serve(game)
}
