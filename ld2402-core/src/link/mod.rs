//! Link lifecycle management

pub mod events;
pub mod machine;
pub mod supervisor;

pub use events::Event;
pub use machine::State;
pub use supervisor::{CalibrationStep, LinkError, LinkSupervisor, TickEffect};
