//! Emulation engine boundary and the Linux namespace engine.

pub mod engine;
pub mod netns;
pub mod runner;

pub use engine::{EmulatedHost, EmulationError, Emulator, SwitchSettings};
pub use netns::{NetnsEmulator, NetnsHost, REQUIRED_TOOLS};
pub use runner::{has_tool, CommandOutput, CommandRunner, SystemRunner};
