pub mod context;
pub mod trait_step;

pub use context::{MigrationServices, StepContext};
pub use trait_step::MigrationOperation;
