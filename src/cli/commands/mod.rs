//! Command implementations for the factprobe CLI

pub mod run;
pub mod suite;
pub mod validate;

pub use run::RunArgs;
pub use suite::SuiteArgs;
pub use validate::ValidateArgs;
