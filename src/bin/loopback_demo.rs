//! Runs the relay against in-process HUB and Modeler peers.

#[cfg(unix)]
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    demo::run().await
}

#[cfg(not(unix))]
fn main() {
    eprintln!("loopback_demo needs Unix domain sockets");
}

#[cfg(unix)]
mod demo {
    use std::io::Cursor;
    use std::time::Duration;

    use anyhow::Result;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use ptamlink::config::BridgeConfig;
    use ptamlink::core::ReportPayload;
    use ptamlink::engine::MainLoop;
    use ptamlink::ipc::{ExitSignal, HubPeer, ModelerPeer};
    use ptamlink::observability::LoopMonitor;
    use ptamlink::shm::FrameBufferWriter;
    use ptamlink::tracking::PlaceholderTracker;

    fn solid_bmp(width: u32, height: u32, shade: u8) -> Result<Vec<u8>> {
        let img = RgbaImage::from_pixel(width, height, Rgba([shade, 96, 160, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Bmp)?;
        Ok(bytes)
    }

    pub async fn run() -> Result<()> {
        ptamlink::init_tracing();

        println!("PTAM Link - Loopback Demo");
        println!("=========================\n");

        let dir = std::env::temp_dir().join(format!("ptamlink-demo-{}", std::process::id()));
        std::fs::create_dir_all(&dir)?;
        let config = BridgeConfig {
            hub_channel: "DemoHub".to_string(),
            modeler_channel: "DemoModeler".to_string(),
            frame_buffer: "DemoFrames".to_string(),
            runtime_dir: dir.clone(),
            shm_dir: dir.clone(),
            wait_timeout_ms: Some(2000),
            metrics_log_interval: 0,
            ..BridgeConfig::default()
        };

        let mut segment = FrameBufferWriter::create(&config.shm_dir, &config.frame_buffer, 1 << 20)?;
        let mut modeler = ModelerPeer::bind(&config.modeler_addr()).await?;
        let hub = HubPeer::new(config.hub_addr());

        let exit = ExitSignal::new();
        let mut main_loop =
            MainLoop::from_config(&config, Box::new(PlaceholderTracker::new()), exit.clone());

        for (i, byte) in [b'y', b'n', b'y', b'n'].into_iter().enumerate() {
            if byte == b'y' {
                segment.write_image(&solid_bmp(64, 48, (i * 40) as u8)?)?;
            }

            let (outcome, hub_result) =
                tokio::join!(main_loop.tick(), hub.signal(byte, Duration::from_secs(2)));
            hub_result?;

            println!("--- Cycle {} (HUB sent '{}') ---", i + 1, byte as char);
            println!("outcome: {:?}", outcome);

            if outcome.is_completed() {
                let text = modeler.receive().await?;
                let report = ReportPayload::parse(&text)?;
                println!("report:  {}", text);
                println!("pose:    {:?}\n", report.pose);
            }
        }

        let monitor = LoopMonitor::new(main_loop.metrics().clone());
        println!("{}\n", monitor.generate_report(main_loop.frame_count()));

        exit.request_exit();
        println!("After exit request: {:?}", main_loop.tick().await);
        println!("Frames counted: {}", main_loop.frame_count());

        drop(segment);
        drop(modeler);
        let _ = std::fs::remove_dir_all(&dir);
        Ok(())
    }
}
