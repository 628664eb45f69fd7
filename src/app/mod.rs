pub mod daemon;
pub mod dispatch;
pub mod runtime;

pub use dispatch::{dispatch, load_config};
pub use runtime::MemoryRuntime;
