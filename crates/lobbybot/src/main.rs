use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use lobbybot::{LobbybotError, RoomBot, Settings};
use lobbybot_transport::{RestClient, WebSocketHub};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let settings = Settings::parse();
    lobbybot::init_tracing(&settings.log_filter);

    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "lobbybot crashed");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: Settings) -> Result<(), LobbybotError> {
    settings.check()?;

    let rest = Arc::new(RestClient::new(&settings.api_url, &settings.access_token)?);
    let (hub, events) = WebSocketHub::connect(&settings.hub_url, &settings.access_token).await?;

    let bot = RoomBot::new(
        settings.to_lobby_config(),
        settings.room(),
        Arc::new(hub),
        Arc::clone(&rest),
        rest,
    );
    let running = bot.start(events).await?;
    info!(room = %running.room().id, "lobbybot is up");

    let handle = running.handle().clone();
    tokio::select! {
        () = running.wait() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
            if handle.shutdown().await.is_err() {
                info!("lobby already stopped");
            }
        }
    }
    Ok(())
}
