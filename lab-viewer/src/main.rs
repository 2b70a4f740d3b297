use clap::Parser;

use lab_viewer::config::{Cli, ViewerConfig};
use lab_viewer::engine::core::app_setup::create_app;

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let config = match ViewerConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("lab-viewer: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    let mut app = create_app(config);
    match app.run() {
        bevy::app::AppExit::Success => std::process::ExitCode::SUCCESS,
        bevy::app::AppExit::Error(code) => std::process::ExitCode::from(code.get()),
    }
}
