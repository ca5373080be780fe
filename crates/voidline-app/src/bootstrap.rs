//! Process setup: tracing and the default key bindings.

use std::cell::Cell;
use std::rc::Rc;

use tracing_subscriber::EnvFilter;

use voidline_core::commands::SimCommand;
use voidline_core::enums::Key;
use voidline_sim::{KeyHandler, SimulationEngine};

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

/// Handle to state the default bindings write to.
#[derive(Debug, Clone, Default)]
pub struct KeyBindings {
    quit: Rc<Cell<bool>>,
}

impl KeyBindings {
    pub fn quit_requested(&self) -> bool {
        self.quit.get()
    }
}

/// F1 pauses, F2 resumes, F5 resets, Escape asks the driver to stop.
pub fn install_key_bindings(engine: &SimulationEngine) -> KeyBindings {
    let bindings = KeyBindings::default();
    let input = engine.input();

    for (key, command) in [
        (Key::F1, SimCommand::Pause),
        (Key::F2, SimCommand::Resume),
        (Key::F5, SimCommand::Reset),
    ] {
        let sink = engine.command_sink();
        input.subscribe(key, KeyHandler::new(move || sink.push(command.clone())));
    }

    let quit = Rc::clone(&bindings.quit);
    input.subscribe(Key::Escape, KeyHandler::new(move || quit.set(true)));

    bindings
}
