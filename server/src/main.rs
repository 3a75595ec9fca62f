use std::path::Path;
use std::process;
use std::sync::Arc;

use common::protocol::{Frame, MessageType, PlayerRole, ServerShutdownPayload};
use log::LevelFilter;

use server::config::ServerConfig;
use server::context::ServerContext;
use server::map::MapManager;
use server::net;
use server::repository::Repository;
use server::spawn;
use server::store::StateStore;
use server::tick;

fn level_filter(name: &str) -> LevelFilter {
    match name.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}

/// Operator subcommands that run against the data stores and exit.
fn handle_command_line_args(args: &[String], config: &ServerConfig) -> Result<(), String> {
    if args.len() < 2 {
        return Ok(());
    }
    match args[1].as_str() {
        "create-player" => {
            let username = args
                .get(2)
                .ok_or("usage: server create-player <username>")?;
            let repo = Repository::open(Path::new(&config.database.path))?;
            repo.sync_items()?;
            let map_id = "overworld";
            let id = repo.create_player(username, "external-auth", map_id, 50, 50)?;
            println!("Created player '{username}' with id {id}");
            process::exit(0);
        }
        "grant-admin" => {
            let username = args.get(2).ok_or("usage: server grant-admin <username>")?;
            let repo = Repository::open(Path::new(&config.database.path))?;
            let row = repo
                .get_player_by_username(username)?
                .ok_or_else(|| format!("No such player '{username}'"))?;
            repo.set_player_role(row.player_id, PlayerRole::Admin)?;
            println!("'{username}' is now an admin");
            process::exit(0);
        }
        "issue-token" => {
            let username = args.get(2).ok_or("usage: server issue-token <username> <token>")?;
            let token = args.get(3).ok_or("usage: server issue-token <username> <token>")?;
            let repo = Repository::open(Path::new(&config.database.path))?;
            let row = repo
                .get_player_by_username(username)?
                .ok_or_else(|| format!("No such player '{username}'"))?;
            let store = StateStore::connect(&config.hot_store.url)?;
            store.issue_auth_token(token, row.player_id, 300)?;
            println!("Token for '{username}' valid for 300 s");
            process::exit(0);
        }
        other => Err(format!("Unknown subcommand '{other}'")),
    }
}

fn main() -> Result<(), String> {
    // .env first so config env overrides can come from it.
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().collect();
    let config_path =
        std::env::var("RPG_CONFIG").unwrap_or_else(|_| "server_config.toml".to_string());
    let config = ServerConfig::load(Path::new(&config_path))?;

    handle_command_line_args(&args, &config)?;

    common::initialize_logger(
        level_filter(&config.server.log_level),
        config.server.log_file.as_deref(),
    )
    .unwrap_or_else(|e| {
        eprintln!("Failed to initialize logger: {e}. Exiting.");
        process::exit(1);
    });

    log::info!("Starting game server (pid {})", process::id());

    let repo = Repository::open(Path::new(&config.database.path))?;
    repo.sync_items()?;
    repo.sync_entities()?;

    let store = StateStore::connect(&config.hot_store.url)?;

    let maps = MapManager::load_dir(Path::new(&config.maps.dir))
        .map_err(|e| format!("Loading maps: {e:#}"))?;
    if maps.is_empty() {
        return Err(format!(
            "No maps loaded from '{}'; the server needs at least one",
            config.maps.dir
        ));
    }

    let ctx = Arc::new(ServerContext::new(config, repo, store, maps));

    // Start each world from a clean slate, then populate from spawn points.
    let map_ids = ctx.maps.map_ids();
    ctx.store.clear_all_entities(&map_ids)?;
    for map_id in &map_ids {
        spawn::spawn_map_entities(&ctx, map_id);
    }

    {
        let ctx = Arc::clone(&ctx);
        ctrlc::set_handler(move || {
            if ctx.is_shutting_down() {
                log::info!("Second interrupt; exiting immediately");
                process::exit(1);
            }
            log::info!("Shutdown requested");
            ctx.request_shutdown();
        })
        .map_err(|e| format!("Failed to install signal handler: {e}"))?;
    }

    let tick_workers = tick::spawn_tick_workers(&ctx);
    log::info!(
        "World running: {} maps, {} tick workers",
        map_ids.len(),
        tick_workers.len()
    );

    // Blocks until shutdown is requested.
    net::run_listener(&ctx)?;

    log::info!("Shutting down: notifying {} sessions", ctx.sessions.len());
    if let Ok(frame) = Frame::event(
        MessageType::EventServerShutdown,
        &ServerShutdownPayload {
            reason: "Server is shutting down".to_string(),
        },
    ) {
        for session in ctx.sessions.all() {
            session.send(frame.clone());
        }
    }
    // Give writer threads a moment to flush the shutdown notice.
    std::thread::sleep(std::time::Duration::from_millis(250));

    for session in ctx.sessions.all() {
        ctx.logout_player(session.player_id, "server shutdown");
    }
    if let Err(e) = ctx.store.clear_all_entities(&map_ids) {
        log::error!("Clearing entities at shutdown: {e}");
    }

    for worker in tick_workers {
        if worker.join().is_err() {
            log::error!("A tick worker panicked during shutdown");
        }
    }

    log::info!("Server shutdown complete");
    Ok(())
}
