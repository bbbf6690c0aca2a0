//! Placement-aware executor for resolved ortex graphs.
//!
//! # Architecture
//!
//! The runtime has three responsibilities:
//! 1. **Placement** - assign each node to exactly one execution provider and
//!    copy tensors across provider boundaries (`PlacementPolicy`)
//! 2. **Dispatch** - run the plan's kernels in order against a per-run
//!    register file (`Dispatcher`)
//! 3. **Sessions** - load = validate + resolve + plan + place;
//!    run = dispatch (`Session`)
//!
//! # Example
//!
//! ```no_run
//! use ortex_runtime::{ProviderId, Session, SessionConfig, Tensor};
//! # fn graph() -> ortex_graph::Graph { unimplemented!() }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ortex_operators::default_operator_registry()?;
//!     let config = SessionConfig::builder()
//!         .provider(ProviderId::MY_CPU)
//!         .build();
//!
//!     let session = Session::load(&graph(), registry, config)?;
//!     let input = Tensor::from_vec(vec![1.0f32, 0.5, -0.5, 2.0], &[1, 4]);
//!     let (outputs, stats) = session.run_with_stats(&[("input", input)])?;
//!
//!     println!("{:?} after {} transfers", outputs["output"], stats.transfers);
//!     Ok(())
//! }
//! ```

mod dispatcher;
mod error;
mod provider;
mod session;

// Public exports
pub use dispatcher::{CancellationFlag, Dispatcher, RunOptions, RunStats};
pub use error::{Result, RuntimeError};
pub use ortex_core::Tensor;
pub use provider::{Capability, ExecutionProvider, PlacementPolicy, PriorityPlacement, ProviderId};
pub use session::{Session, SessionConfig, SessionConfigBuilder};
