#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

use std::process::ExitCode;

use clap::Parser;
use eframe::egui;

use thumbnail_composer::app::ComposerApp;
use thumbnail_composer::cli::{self, CliArgs};
use thumbnail_composer::config::Settings;
use thumbnail_composer::logging;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let settings = match Settings::load(&args.settings) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("warning: {err:#}; using default settings");
            Settings::default()
        }
    };
    logging::init(args.debug || settings.debug_logging);
    tracing::debug!("settings loaded from {}", args.settings.display());

    if args.is_headless() {
        return cli::run(&args, &settings);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 760.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };
    let result = eframe::run_native(
        "Thumbnail Composer",
        options,
        Box::new(move |cc| Ok(Box::new(ComposerApp::new(cc, settings)?))),
    );
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("window failed: {err}");
            ExitCode::FAILURE
        }
    }
}
