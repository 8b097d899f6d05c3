//! Level command plumbing between producers and the output task.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};

/// Milliseconds between boot and the deferred handshake pass. Long enough
/// for supply rails to settle; a level command arriving earlier runs the
/// pass immediately instead.
pub const DEFER_HANDSHAKE_MS: u64 = 1_000;

/// Depth of the level command queue shared with the output task.
pub const LEVEL_QUEUE_DEPTH: usize = 4;

#[cfg(target_os = "none")]
type OutputMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type OutputMutex = NoopRawMutex;

/// Normalized output command delivered to the output task.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LevelCommand {
    level: f32,
}

impl LevelCommand {
    /// Wraps a command, clamping it into the unit range.
    #[must_use]
    pub fn new(level: f32) -> Self {
        Self {
            level: level.clamp(0.0, 1.0),
        }
    }

    #[must_use]
    pub fn level(self) -> f32 {
        self.level
    }
}

/// Queue carrying level commands to the output task.
pub type LevelQueue = Channel<OutputMutex, LevelCommand, LEVEL_QUEUE_DEPTH>;

/// Convenience sender type alias for the level queue.
pub type LevelSender<'a> = Sender<'a, OutputMutex, LevelCommand, LEVEL_QUEUE_DEPTH>;

/// Convenience receiver type alias for the level queue.
pub type LevelReceiver<'a> = Receiver<'a, OutputMutex, LevelCommand, LEVEL_QUEUE_DEPTH>;
