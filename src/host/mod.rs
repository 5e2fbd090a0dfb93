//! Host-facing command contract and the stdio bridge a UI shell drives.

pub mod contract;
pub mod router;
pub mod stdio;

pub use contract::{CommandEnvelope, CommandName, EventEnvelope, ResponseEnvelope};
pub use router::HostRouter;
pub use stdio::{run_bridge, run_stdio_bridge};
