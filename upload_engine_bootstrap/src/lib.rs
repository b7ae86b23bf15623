//! Host-process plumbing for driving the upload engine from a CLI: argument
//! parsing, logging setup, and graceful-shutdown coordination. Sits outside
//! the engine's domain/application layers, the way a composition root wires
//! dependencies without becoming part of the thing it wires.

pub mod cli;
pub mod config;
pub mod logger;
pub mod shutdown;

pub use cli::{Cli, Command};
pub use config::load_engine_config;
pub use logger::{BootstrapLogger, ConsoleLogger, NoOpLogger};
pub use shutdown::ShutdownCoordinator;
