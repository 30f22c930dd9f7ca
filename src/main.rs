use std::path::PathBuf;

use ptamlink::config::{BridgeConfig, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use ptamlink::engine::MainLoop;
use ptamlink::ipc::ExitSignal;
use ptamlink::tracking::PlaceholderTracker;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    ptamlink::init_tracing();

    info!("Loading configurations...");
    let path = std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = BridgeConfig::load_or_default(&path);
    ptamlink::console::apply_window_mode(config.start_hidden);

    info!(
        hub = %config.hub_channel,
        modeler = %config.modeler_channel,
        frame_buffer = %config.frame_buffer,
        "Now start processing"
    );

    let exit = ExitSignal::new();
    let mut main_loop = MainLoop::from_config(&config, Box::new(PlaceholderTracker::new()), exit);

    tokio::select! {
        _ = main_loop.run() => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("terminated");
        }
    }

    Ok(())
}
