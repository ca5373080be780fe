use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use voidline_app::bootstrap;
use voidline_app::cli::Args;
use voidline_app::game_loop::spawn_game_loop;
use voidline_app::script::KeyScript;
use voidline_app::state::TraceHandle;
use voidline_app::AppError;

fn main() -> ExitCode {
    let args = Args::parse();
    bootstrap::init_tracing();
    info!("=== VOIDLINE headless ===");

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "voidline_failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), AppError> {
    let config = args.load_config()?;
    let script = KeyScript::parse(&args.press)?;
    let traces = TraceHandle::new();

    let summary = spawn_game_loop(config, args.loop_config(), script, traces.clone())?.join()?;

    let latest = traces.latest();
    info!(
        generation = latest.generation(),
        traced_entities = latest.len(),
        "last_published_trace"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
