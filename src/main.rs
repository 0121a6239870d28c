use std::sync::Arc;

use tictactoe_server::room::manager::RoomManager;
use tictactoe_server::room::reaper;
use tictactoe_server::room::store::SqliteRoomStore;
use tictactoe_server::{build_router, config, telemetry, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let store = Arc::new(SqliteRoomStore::connect(&config::database_url()).await?);
    let rooms = Arc::new(RoomManager::new(
        store,
        config::board_size(),
        config::store_timeout(),
    ));
    reaper::spawn(rooms.clone(), config::sweep_period(), config::room_ttl());

    let app = build_router(AppState { rooms }, &config::static_dir());

    let addr = config::server_addr();
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
