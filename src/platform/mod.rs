//! Platform abstraction layer
//!
//! Handles the outside world the simulation must not see directly:
//! - Motion input (serial reader thread, scripted replays)

pub mod input;

pub use input::{
    InputError, LineDecoder, MotionSlot, MotionSource, ScriptedMotionSource, SerialMotionSource,
    TransportDiagnostics,
};
