#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

#[cfg(not(feature = "camera-nokhwa"))]
compile_error!("starry-camera needs a camera backend; enable the `camera-nokhwa` feature");

mod config;
mod error;
mod model_download;
mod pipeline;
mod session;
mod types;
mod ui;

use anyhow::Result;
use gpui::Application;
use gpui_component;
use nokhwa::utils::CameraIndex;

use config::{AppConfig, USAGE};
use pipeline::{NokhwaOpener, StylePipeline, available_cameras};
use session::SessionController;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    if config.show_help {
        println!("{USAGE}");
        return Ok(());
    }
    if config.list_cameras {
        for camera in available_cameras()? {
            println!("{}: {}", camera.index, camera.label);
        }
        return Ok(());
    }

    log::info!(
        "starting with model {} at {}px, {} quality",
        config.model_path.display(),
        config.input_size,
        config.quality.label()
    );

    let pipeline = StylePipeline::load(&config);

    let opener = NokhwaOpener::new(CameraIndex::Index(config.camera_index));
    let controller = SessionController::new(opener, config.quality, pipeline);

    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            if let Err(err) = ui::launch_ui(app, controller) {
                log::error!("failed to launch ui: {err:?}");
            }
        });

    Ok(())
}
