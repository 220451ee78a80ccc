//! Divan Engine — procedural sound for the divination ritual.
//!
//! Crate layout:
//! - [`graph`]    : the node graph with its clock
//! - [`nodes`]    : oscillators, buffer sources, filters, gains
//! - [`noise`]    : shared stereo white-noise buffer
//! - [`voices`]   : declarative one-shots (click, chime, reveal)
//! - [`ambient`]  : the drone pad on its own sub-bus
//! - [`breath`]   : press-and-hold gesture and its filtered-noise voice
//! - [`haptics`]  : vibration patterns behind an optional host capability
//! - [`context`]  : offline and cpal-driven audio contexts
//! - [`engine`]   : `SoundEngine` facade, live and silent implementations
//!
//! Rendering allocates nothing per sample. Block housekeeping reuses scratch
//! buffers held by the graph, so the audio thread allocates only when control
//! calls have grown it. Control calls lock the graph only to add nodes or
//! append automation.

pub mod ambient;
pub mod breath;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod graph;
pub mod haptics;
pub mod nodes;
pub mod noise;
pub mod voices;

// Re-export the common surface so hosts need a single import.
pub use config::{AmbientPreset, BreathPreset, EngineConfig};
pub use context::{AudioContext, ContextState};
pub use engine::{open, Engine, SilentEngine, SoundEngine};
pub use error::{EngineError, Result};
pub use graph::{Graph, NodeId};
pub use haptics::{HapticKind, Haptics, LogVibrator, Vibrator};
pub use nodes::{Frame, NodeKind, Param, Wave};
pub use noise::NoiseBuffer;

#[cfg(feature = "realtime")]
pub use context::output_device_names;
