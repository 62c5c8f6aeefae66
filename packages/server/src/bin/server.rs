//! Room relay server.
//!
//! Groups WebSocket clients into rooms and relays JSON frames between the
//! devices of a room.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin roomrelay-server
//! cargo run --bin roomrelay-server -- --port 9000 --database-url memory
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use roomrelay_server::{
    domain::PersistenceGateway,
    infrastructure::{
        gateway::{InMemoryGateway, SqliteGateway},
        registry::{ConnectionRegistry, RoomRegistry},
    },
    ui::{Server, ServerConfig, state::AppState},
    usecase::{
        AssignRoomUseCase, ConnectDeviceUseCase, DisconnectDeviceUseCase, GetRoomsUseCase,
        RouteMessageUseCase,
    },
};
use roomrelay_shared::logger::setup_logger;

/// Value of `--database-url` that selects the in-process store.
const IN_MEMORY_DATABASE: &str = "memory";

#[derive(Parser, Debug)]
#[command(name = "roomrelay-server")]
#[command(about = "WebSocket room relay with persisted rooms and history", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8765")]
    port: u16,

    /// SQLite database URL, or `memory` to keep everything in process memory
    #[arg(long, default_value = "sqlite://relay.db?mode=rwc")]
    database_url: String,

    /// Seconds between status reports (0 disables them)
    #[arg(long, default_value = "60")]
    status_interval_secs: u64,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    // Initialize dependencies in order:
    // 1. PersistenceGateway
    // 2. Registries
    // 3. UseCases
    // 4. AppState
    // 5. Server

    // 1. Open the store; this is the only fatal failure
    let gateway: Arc<dyn PersistenceGateway> = if args.database_url == IN_MEMORY_DATABASE {
        tracing::info!("Using in-memory persistence; nothing survives a restart");
        Arc::new(InMemoryGateway::new())
    } else {
        match SqliteGateway::connect(&args.database_url).await {
            Ok(gateway) => Arc::new(gateway),
            Err(e) => {
                tracing::error!("Failed to open database {}: {}", args.database_url, e);
                std::process::exit(1);
            }
        }
    };

    // 2. Create in-memory registries
    let rooms = Arc::new(RoomRegistry::new());
    let connections = Arc::new(ConnectionRegistry::new());

    // 3. Create UseCases
    let assign_room_usecase = Arc::new(AssignRoomUseCase::new(gateway.clone(), rooms.clone()));
    let connect_device_usecase = Arc::new(ConnectDeviceUseCase::new(
        gateway.clone(),
        rooms.clone(),
        connections.clone(),
    ));
    let disconnect_device_usecase = Arc::new(DisconnectDeviceUseCase::new(
        gateway.clone(),
        rooms.clone(),
        connections.clone(),
    ));
    let route_message_usecase = Arc::new(RouteMessageUseCase::new(gateway.clone(), rooms.clone()));
    let get_rooms_usecase = Arc::new(GetRoomsUseCase::new(rooms, connections));

    // 4. Create AppState
    let app_state = AppState {
        assign_room_usecase,
        connect_device_usecase,
        disconnect_device_usecase,
        route_message_usecase,
        get_rooms_usecase,
    };

    // 5. Create and run the server
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        status_interval: (args.status_interval_secs > 0)
            .then(|| Duration::from_secs(args.status_interval_secs)),
    };
    if let Err(e) = Server::new(app_state).run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
