// Library exports for serve-warden

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod lock;
pub mod logs;
pub mod process;
pub mod signals;
