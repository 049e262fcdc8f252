// Frontends implementing the orchestrator's user-facing surface
pub mod console;

pub use console::ConsoleFrontend;
