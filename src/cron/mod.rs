mod expression;
pub mod scheduler;

pub use expression::{next_run_for, validate_schedule};
pub use scheduler::CompactionScheduler;
