mod gui;

use anyhow::Result;
use clap::Parser;
use eframe::egui;
use std::path::PathBuf;
use std::sync::Arc;
use stillcam::config::{PixelFormat, DEFAULT_FPS};
use stillcam::output::LoopbackOpener;
use stillcam::{probe, Controller};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Output v4l2loopback device path
    #[arg(short, long, default_value = "/dev/video10")]
    output_device: String,

    /// Image to select at startup
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Initial output resolution (WIDTHxHEIGHT)
    #[arg(short, long, default_value = "640x480")]
    resolution: String,

    /// Initial frames per second (1-60)
    #[arg(long, default_value_t = DEFAULT_FPS)]
    fps: u32,

    /// Pixel layout written to the device
    #[arg(long, value_enum, default_value_t = PixelFormat::Rgb24)]
    pixel_format: PixelFormat,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let opener = LoopbackOpener::new(&args.output_device);

    tracing::info!("stillcam starting");
    tracing::info!("Output device: {}", opener.device_path().display());
    tracing::info!("Pixel format: {}", args.pixel_format);

    let warnings = probe::check_environment(opener.device_path());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([800.0, 600.0])
            .with_min_inner_size([600.0, 400.0])
            .with_title("Virtual Camera Control Panel"),
        ..Default::default()
    };

    eframe::run_native(
        "stillcam",
        options,
        Box::new(move |cc| {
            let ctx = cc.egui_ctx.clone();
            let mut controller = Controller::new(Arc::new(opener))
                .with_notifier(Arc::new(move || ctx.request_repaint()))
                .with_pixel_format(args.pixel_format)
                .with_warnings(warnings);

            controller.set_resolution(args.resolution);
            controller.set_fps(args.fps);
            if let Some(path) = args.image {
                // Shown in the error dialog on the first frame
                let _ = controller.select_image(path);
            }

            Ok(Box::new(gui::StillcamApp::new(controller)))
        }),
    )
    .map_err(|e| anyhow::anyhow!("{}", e))
}
