//! Command modules for the CppStep CLI

pub mod debug;
pub mod instrument;
pub mod replay;
pub mod shim;

pub use debug::debug_program;
pub use instrument::instrument_file;
pub use replay::replay_log;
pub use shim::write_shim;
