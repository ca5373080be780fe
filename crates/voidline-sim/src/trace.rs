//! Substep trace buffer.
//!
//! Movement records several pose samples per entity inside one tick into a
//! working map. `publish` deep-copies the working map into a new
//! [`PublishedTraces`] and swaps it in whole, so a reader holding the
//! published value only ever sees one completed tick.

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Quat, Vec3};
use thiserror::Error;

use voidline_core::{SubstepSample, Uid};

pub type TraceMap = HashMap<Uid, Vec<SubstepSample>>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TraceError {
    #[error("trace written outside a tick; call begin_tick first")]
    NoOpenTick,
    #[error("time fraction {time_fraction} for {uid} is outside [0, 1]")]
    TimeFractionOutOfRange { uid: Uid, time_fraction: f32 },
    #[error("time fraction {time_fraction} for {uid} is earlier than previous sample {previous}")]
    NonMonotonicTimeFraction {
        uid: Uid,
        time_fraction: f32,
        previous: f32,
    },
}

/// Samples of the last completed tick. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct PublishedTraces {
    /// Number of publishes before and including this one; 0 = nothing yet.
    generation: u64,
    samples: TraceMap,
}

impl PublishedTraces {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, uid: &Uid) -> Option<&[SubstepSample]> {
        self.samples.get(uid).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Uid, &[SubstepSample])> {
        self.samples.iter().map(|(uid, s)| (uid, s.as_slice()))
    }

    /// Interpolated pose of `uid` at `fraction` of the published tick.
    /// Clamps to the first/last sample outside the recorded range.
    pub fn sample_at(&self, uid: &Uid, fraction: f32) -> Option<(Vec3, Quat)> {
        let samples = self.samples.get(uid)?;
        let first = samples.first()?;
        let last = samples.last()?;

        if fraction <= first.time_fraction {
            return Some((first.position, first.rotation));
        }
        if fraction >= last.time_fraction {
            return Some((last.position, last.rotation));
        }

        let window = samples
            .windows(2)
            .find(|w| fraction >= w[0].time_fraction && fraction <= w[1].time_fraction)?;
        let (a, b) = (&window[0], &window[1]);
        let span = b.time_fraction - a.time_fraction;
        if span <= f32::EPSILON {
            return Some((b.position, b.rotation));
        }
        let t = (fraction - a.time_fraction) / span;
        Some((a.position.lerp(b.position, t), a.rotation.slerp(b.rotation, t)))
    }
}

#[derive(Debug, Default)]
pub struct TraceBuffer {
    working: TraceMap,
    published: Arc<PublishedTraces>,
    tick_open: bool,
}

impl TraceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start recording a tick. Drops anything left in the working map.
    pub fn begin_tick(&mut self) {
        self.working.clear();
        self.tick_open = true;
    }

    pub fn add_sample(
        &mut self,
        uid: Uid,
        time_fraction: f32,
        position: Vec3,
        rotation: Quat,
    ) -> Result<(), TraceError> {
        if !self.tick_open {
            return Err(TraceError::NoOpenTick);
        }
        if !(0.0..=1.0).contains(&time_fraction) {
            return Err(TraceError::TimeFractionOutOfRange { uid, time_fraction });
        }

        let samples = self.working.entry(uid).or_default();
        if let Some(previous) = samples.last() {
            if time_fraction < previous.time_fraction {
                return Err(TraceError::NonMonotonicTimeFraction {
                    uid,
                    time_fraction,
                    previous: previous.time_fraction,
                });
            }
        }
        samples.push(SubstepSample::new(time_fraction, position, rotation));
        Ok(())
    }

    /// Replace the published view with a copy of the working map.
    pub fn publish(&mut self) -> Result<(), TraceError> {
        if !self.tick_open {
            return Err(TraceError::NoOpenTick);
        }
        self.published = Arc::new(PublishedTraces {
            generation: self.published.generation + 1,
            samples: self.working.clone(),
        });
        Ok(())
    }

    /// Empty both maps. Used on reset and teardown.
    pub fn clear(&mut self) {
        self.working.clear();
        self.published = Arc::new(PublishedTraces::default());
        self.tick_open = false;
    }

    pub fn published(&self) -> &PublishedTraces {
        &self.published
    }

    /// Shared handle to the current published view. Later publishes never
    /// modify what this handle points at.
    pub fn published_handle(&self) -> Arc<PublishedTraces> {
        Arc::clone(&self.published)
    }

    pub fn working_len(&self) -> usize {
        self.working.len()
    }

    pub fn is_tick_open(&self) -> bool {
        self.tick_open
    }
}
