mod domain;
mod dsu;
mod infrastructure;

use domain::registry::ControllerRegistry;
use domain::settings::SettingsService;
use dsu::server::DsuServer;
use infrastructure::bridge::{EventBridge, TracingSink};
use infrastructure::logging;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = SettingsService::new();
    let _logging_guard = logging::init_logger(&settings.get().log_settings)?;
    info!("Starting GearVR DSU bridge");

    let registry = ControllerRegistry::new();

    // The platform BLE collaborator feeds this channel with connection,
    // report and battery events; the bridge keeps the registry current.
    let (events_tx, events_rx) = EventBridge::channel();
    let bridge = EventBridge::new(registry.clone(), Box::new(TracingSink));
    let bridge_task = tokio::spawn(bridge.run(events_rx));

    let mut server = DsuServer::new(registry);
    server.start(settings.get().dsu_port).await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    server.stop().await;
    drop(events_tx);
    bridge_task.await?;
    Ok(())
}
