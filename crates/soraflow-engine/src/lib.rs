//! soraflow convergence engine
//!
//! The reusable core of soraflow's cloud resource management: everything a
//! provider needs to turn "issue a call, then wait for the cloud to settle"
//! into a deterministic, classifiable process.
//!
//! # Components
//!
//! - [`paginate`]: marker-based pagination aggregation
//! - [`retry`]: transient-vs-permanent retry classification
//! - [`wait`]: poll-until-target-state convergence
//! - [`identity`]: synthetic identity for id-less sub-resources
//!
//! Components compose bottom-up: a status probe is usually a
//! [`retry::with_retry`]-wrapped read (itself often built on
//! [`paginate::collect_all`] when listing is the only way to fetch current
//! state), and [`wait::wait_for_status`] drives that probe to a terminal
//! answer. Everything is expressed over caller-supplied async closures —
//! the engine holds no client handles and no shared mutable state, so
//! concurrent lifecycles are independent call stacks.

pub mod error;
pub mod identity;
pub mod paginate;
pub mod retry;
pub mod wait;

// Re-exports
pub use error::{ApiError, EngineError, Result};
pub use identity::{Direction, RuleDescriptor};
pub use paginate::{Page, PageCursor, collect_all};
pub use retry::{Backoff, RetryPolicy, with_retry};
pub use wait::{Observation, StatusSet, WaitConfig, wait_for_status};
