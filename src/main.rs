use color_eyre::{eyre::eyre, Result};
use mousemotion::config::MouseConfig;
use mousemotion::mouse::{Mouse, MouseButton, MouseSettings, SettingsPortal, BUTTON_COUNT};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let (config, portal) = setup_config().await?;

    info!("Initializing mouse with {}ms update interval", config.update_interval_ms);
    let mut mouse = Mouse::spawn(
        Some(MouseSettings::from(&config)),
        Some(Arc::new(portal)),
    )
    .map_err(|e| eyre!("Failed to spawn mouse: {}", e))?;

    replay_drag(&mouse, MouseButton::Left, (640, 360), (40, -25)).await;
    replay_drag(&mouse, MouseButton::Right, (200, 200), (-30, 10)).await;

    for index in 0..BUTTON_COUNT {
        if let Some(data) = mouse.mouse_state(index) {
            info!(
                "Slot {:?}: pressed={} axis={:?} rotation={:?} touch=({:.3}, {:.3})",
                MouseButton::ALL[index],
                data.pressed,
                data.axis,
                data.motion.rotation,
                data.touch.x,
                data.touch.y
            );
        }
    }

    for status in mouse.mouse_queue().drain() {
        info!("Press event: {:?}", status.button);
    }

    mouse
        .shutdown()
        .map_err(|e| eyre!("Failed to shut down mouse: {}", e))?;
    Ok(())
}

// Presses `button` at `start`, drags by `offset` in small steps and releases
async fn replay_drag(mouse: &Mouse, button: MouseButton, start: (i32, i32), offset: (i32, i32)) {
    const STEPS: i32 = 20;

    info!("Replaying drag on {:?} by {:?}", button, offset);
    mouse.press(start.0, start.1, button);
    for step in 1..=STEPS {
        let x = start.0 + offset.0 * step / STEPS;
        let y = start.1 + offset.1 * step / STEPS;
        mouse.mouse_move(x, y);
        tokio::time::sleep(Duration::from_millis(15)).await;
    }
    if let Some(index) = button.index() {
        debug!("Before release: {:?}", mouse.mouse_state(index));
    }
    mouse.release(button);
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

async fn setup_config() -> Result<(MouseConfig, SettingsPortal)> {
    let path = MouseConfig::default_path();
    MouseConfig::ensure_default_config(&path).await?;

    let portal = SettingsPortal::from_file(&path).await?;
    let config = portal
        .snapshot()
        .map_err(|e| eyre!("Failed to read mouse settings: {}", e))?;
    Ok((config, portal))
}
