//! Session layer: the engine, the per-device projection, change events and
//! request debouncing.

pub mod debounce;
pub mod device;
pub mod engine;
pub mod events;

pub use debounce::{Debouncer, RequestGate};
pub use device::DeviceSession;
pub use engine::Engine;
pub use events::{EventBus, SessionEvent};
