//! NDT v3.7.0 throughput-test protocol runner, the canonical driver for
//! this engine's protocol-composition framework.

pub mod context;
pub mod messages;
pub mod mlab_ns;
pub mod protocol;
mod test_c2s;
mod test_meta;
mod test_s2c;

pub use context::Context;
pub use protocol::{run, run_with_specific_server};
