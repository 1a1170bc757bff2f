//! Input actions: decoding a device's action table and mapping observed bus
//! commands back to the physical input that produced them.

pub mod correlator;
pub mod parser;
pub mod registry;

pub use correlator::{Attribution, InputCorrelator, InputEvent};
pub use parser::{CommandSignature, InputAction, InputState, PressType, derive_press_type, parse};
pub use registry::ActionRegistry;
