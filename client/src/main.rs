use clap::Parser;
use client::game::ClientGameState;
use client::input;
use client::map::{TileMap, DEFAULT_MAP_SIZE};
use client::network::{server_address, ServerLink, ServerTarget};
use client::rendering::Renderer;
use log::{error, info, warn};
use macroquad::prelude::*;
use shared::DEFAULT_PORT;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host or host:port; skips discovery
    #[arg(short, long)]
    server: Option<String>,

    /// Endpoint that answers with the server's address
    #[arg(short, long)]
    discovery_url: Option<String>,

    /// Server port, used when the host doesn't name one
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Map file, 50x50 digits
    #[arg(short, long, default_value = "client/assets/map.txt")]
    map: PathBuf,

    /// Pixels per tile
    #[arg(long, default_value_t = 24.0)]
    tile_size: f32,
}

impl Args {
    fn target(&self) -> ServerTarget {
        match (&self.server, &self.discovery_url) {
            (Some(host), _) => ServerTarget::Direct(server_address(host, self.port)),
            (None, Some(url)) => ServerTarget::Discover {
                url: url.clone(),
                port: self.port,
            },
            (None, None) => ServerTarget::Direct(server_address("127.0.0.1", self.port)),
        }
    }
}

fn window_conf() -> Conf {
    Conf {
        window_title: "Line of Sight".to_owned(),
        window_width: 1280,
        window_height: 720,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let map = match TileMap::load(&args.map, DEFAULT_MAP_SIZE, DEFAULT_MAP_SIZE) {
        Ok(map) => map,
        Err(e) => {
            warn!(
                "Could not load {}: {}; using the built-in arena",
                args.map.display(),
                e
            );
            TileMap::arena(DEFAULT_MAP_SIZE, DEFAULT_MAP_SIZE)
        }
    };

    let mut link = match ServerLink::connect(&args.target()) {
        Ok(link) => link,
        Err(e) => {
            error!("{}", e);
            return;
        }
    };

    info!("Controls: WASD or arrow keys to move, Escape to quit");

    let renderer = Renderer::new(args.tile_size);
    let mut game = ClientGameState::new();

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        if let Some(state) = link.latest() {
            game.apply_server_state(&state);
        }
        if link.is_closed() {
            warn!("Lost connection to server");
            break;
        }

        game.step(input::read_direction(), &map);
        link.send(game.client_state());

        renderer.render(&map, &game);
        next_frame().await;
    }
}
