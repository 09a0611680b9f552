//! caseterm entrypoint: parses flags, wires the command-backed service and speech
//! devices into a conversation screen, and runs the terminal UI.

use anyhow::Result;
use caseterm::config::AppConfig;
use caseterm::devices::{CommandDevices, VoiceCatalog};
use caseterm::screen::ConversationScreen;
use caseterm::service::CommandService;
use caseterm::ui::{run_app, InterviewApp};
use caseterm::{init_logging, log_debug, log_file_path};
use clap::Parser;

fn list_voices(config: &AppConfig) -> Result<()> {
    let voices = VoiceCatalog::from_config(config)?
        .list_now()
        .unwrap_or_else(|err| {
            eprintln!("Failed to list synthesizer voices: {err:#}");
            Vec::new()
        });
    if voices.is_empty() {
        println!("No synthesizer voices detected.");
    } else {
        println!("Available synthesizer voices:");
        for voice in voices {
            println!("  - {} ({})", voice.name, voice.locale);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let mut config = AppConfig::parse();
    if config.list_voices {
        return list_voices(&config);
    }

    config.validate()?;
    init_logging(&config);
    log_debug("=== caseterm started ===");
    log_debug(&format!("Log file: {:?}", log_file_path()));

    let service = CommandService::from_config(&config)?;
    let devices = CommandDevices::from_config(&config)?;
    let start = config.start_request()?;

    let mut screen = ConversationScreen::new(service, devices, config.voice_settings());
    if let Some(request) = start {
        log_debug(&format!("starting interview from flags ({})", request.label()));
        screen.begin();
        screen.start(request);
    }

    let mut app = InterviewApp::new(screen);
    let result = run_app(&mut app);
    log_debug("=== caseterm exited ===");
    result
}
