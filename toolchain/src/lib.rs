pub mod config;
pub mod go;
pub mod locate;
pub mod runner;
pub mod symbols;
pub mod types;

pub use config::GoConfig;
pub use go::GoToolchain;
pub use locate::{SourceScanLocator, TestLocator};
pub use runner::{TestRunner, ToolchainError, ToolchainResult};
pub use symbols::workspace_symbols;
pub use types::{
    CheckDiagnostic, CheckSeverity, Position, Range, RunOutcome, RunRequest, SymbolDeclaration,
    TestEntity, TestFlavor,
};

pub mod prelude {
    pub use crate::config::*;
    pub use crate::go::*;
    pub use crate::locate::*;
    pub use crate::runner::*;
    pub use crate::types::*;
}
