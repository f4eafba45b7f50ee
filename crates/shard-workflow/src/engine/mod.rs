pub mod executor;
pub mod state_machine;

pub use executor::MigrationExecutor;
pub use state_machine::{create_operation, remaining_plan, OperationKind, PlanEntry, MIGRATION_PLAN};
