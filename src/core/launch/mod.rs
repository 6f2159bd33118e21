pub mod arguments;
pub mod classpath;
pub mod task;

pub use arguments::{ArgumentContext, Identity};
pub use task::{launch, InProcessHost, LaunchMode, LaunchPlan};
