//! 2D deferred lighting demo.
//!
//! Controls: `Escape` quits, `L` toggles the dense light grid, `Space`
//! pauses the light animation. A white light follows the cursor.

mod app;
mod config;
mod materials;
mod scene;

use anyhow::Result;
use winit::dpi::LogicalSize;

use penumbra_engine::device::GpuInit;
use penumbra_engine::logging::{init_logging, LoggingConfig};
use penumbra_engine::window::{Runtime, RuntimeConfig};

use crate::app::{DemoApp, WINDOW_TITLE};
use crate::config::SceneConfig;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let scene = SceneConfig::from_env();
    log::debug!("scene config: {scene:?}");

    let runtime = RuntimeConfig {
        title: WINDOW_TITLE.to_string(),
        initial_size: LogicalSize::new(1280.0, 960.0),
        ..Default::default()
    };

    let mut app = Runtime::run(runtime, GpuInit::default(), DemoApp::new(scene))?;
    match app.take_startup_error() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
