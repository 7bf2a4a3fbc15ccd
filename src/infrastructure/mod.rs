// Cross-cutting infrastructure
pub mod logging;
pub mod metrics;

pub use logging::*;
pub use metrics::*;
