//! Scripted key presses, standing in for a platform input layer.
//!
//! A script is a list of `FRAME:KEY` entries (`30:F1`, `90:Escape`). On
//! each frame the listed keys are tapped: pressed and released within the
//! frame, which yields exactly one press edge.

use std::collections::BTreeMap;

use thiserror::Error;

use voidline_core::enums::Key;
use voidline_sim::{KeyStateSource, KeyboardState};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("expected FRAME:KEY, got {0:?}")]
    MalformedEntry(String),
    #[error("invalid frame number in {0:?}")]
    InvalidFrame(String),
    #[error("unknown key {0:?}")]
    UnknownKey(String),
}

pub fn parse_key(raw: &str) -> Result<Key, ScriptError> {
    let key = match raw {
        "Escape" | "Esc" => Key::Escape,
        "Tab" => Key::Tab,
        "Space" => Key::Space,
        "Enter" | "Return" => Key::Enter,
        "Up" | "ArrowUp" => Key::ArrowUp,
        "Down" | "ArrowDown" => Key::ArrowDown,
        "Left" | "ArrowLeft" => Key::ArrowLeft,
        "Right" | "ArrowRight" => Key::ArrowRight,
        _ => {
            if let Some(n) = raw.strip_prefix('F').and_then(|n| n.parse::<u8>().ok()) {
                return function_key(n).ok_or_else(|| ScriptError::UnknownKey(raw.to_string()));
            }
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Char(c),
                _ => return Err(ScriptError::UnknownKey(raw.to_string())),
            }
        }
    };
    Ok(key)
}

fn function_key(n: u8) -> Option<Key> {
    const KEYS: [Key; 12] = [
        Key::F1,
        Key::F2,
        Key::F3,
        Key::F4,
        Key::F5,
        Key::F6,
        Key::F7,
        Key::F8,
        Key::F9,
        Key::F10,
        Key::F11,
        Key::F12,
    ];
    KEYS.get(usize::from(n).checked_sub(1)?).copied()
}

/// Frame-indexed key taps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyScript {
    presses: BTreeMap<u64, Vec<Key>>,
}

impl KeyScript {
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self, ScriptError> {
        let mut script = Self::default();
        for entry in entries {
            let entry = entry.as_ref().trim();
            let (frame, key) = entry
                .split_once(':')
                .ok_or_else(|| ScriptError::MalformedEntry(entry.to_string()))?;
            let frame = frame
                .trim()
                .parse::<u64>()
                .map_err(|_| ScriptError::InvalidFrame(entry.to_string()))?;
            script.press(frame, parse_key(key.trim())?);
        }
        Ok(script)
    }

    pub fn press(&mut self, frame: u64, key: Key) {
        self.presses.entry(frame).or_default().push(key);
    }

    pub fn keys_at(&self, frame: u64) -> &[Key] {
        self.presses.get(&frame).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn last_frame(&self) -> Option<u64> {
        self.presses.keys().next_back().copied()
    }

    /// The last scripted frame, if a run capped at `max_frames` never
    /// reaches it.
    pub fn last_frame_beyond(&self, max_frames: Option<u64>) -> Option<u64> {
        let last = self.last_frame()?;
        (last >= max_frames?).then_some(last)
    }
}

/// Replays a [`KeyScript`] through a [`KeyboardState`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedKeys {
    script: KeyScript,
    keyboard: KeyboardState,
}

impl ScriptedKeys {
    pub fn new(script: KeyScript) -> Self {
        Self {
            script,
            keyboard: KeyboardState::new(),
        }
    }

    /// Drop the previous frame's edges and tap this frame's keys.
    pub fn begin_frame(&mut self, frame: u64) {
        self.keyboard.end_frame();
        self.keyboard.release_all();
        for &key in self.script.keys_at(frame) {
            self.keyboard.handle_key(key, true);
            self.keyboard.handle_key(key, false);
        }
    }
}

impl KeyStateSource for ScriptedKeys {
    fn pressed_this_frame(&self, key: Key) -> bool {
        self.keyboard.pressed_this_frame(key)
    }
}
