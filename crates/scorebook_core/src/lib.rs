//! Core sheet lifecycle and symbol-graph editing for scorebook.
//! This crate owns every invariant of stubs, sheets and the edit log.

pub mod book;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod sheet;
pub mod sig;

pub use book::sqlite_book::{BookDefaults, SqliteBook};
pub use book::{BookError, BookResult, Container, SheetStorage, StubEvent};
pub use config::{ConfigError, CoreConfig, EditConfig, LoggingConfig, ViewParameters};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::geometry::Rectangle;
pub use model::inter::{Inter, InterId, Shape};
pub use model::params::{FilterDescriptor, LiveParam};
pub use model::relation::{Partnership, Relation, RelationKind};
pub use model::step::Step;
pub use sheet::pipeline::{StepContext, StepError, StepRunner};
pub use sheet::stub::{SheetStub, StubError, StubResult};
pub use sheet::Sheet;
pub use sig::graph::{GraphError, SymbolGraph};
pub use sig::history::EditLog;
pub use sig::task::{AdditionTask, EditError, InterTask, ModificationTask, RemovalTask};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
