// Process module - Spawning and supervising the single server backend

pub mod spawner;
mod supervisor;
mod types;

pub use spawner::spawn_backend;
pub use supervisor::{Outcome, RunReport, Supervisor};
pub use types::{ProcessState, ServerProcess};
