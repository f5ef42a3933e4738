#![allow(clippy::excessive_nesting)]

//! # Generic object pool
//!
//! A bounded, async object pool driven by a user-supplied [`Factory`].
//! Borrowed resources are handed out via an RAII [`Guard`]; idle
//! resources are tracked in a LIFO/FIFO deque and swept periodically by
//! a background maintenance task that evicts resources idle past a
//! configurable threshold and tops the idle count back up to
//! `min_idle`.
//!
//! ```no_run
//! use quarrypool::{Factory, Pool, PoolConfig};
//!
//! struct Connections;
//!
//! impl Factory for Connections {
//!     type Resource = String;
//!
//!     async fn create(&self) -> quarrypool::Result<String> {
//!         Ok("connection".to_string())
//!     }
//! }
//!
//! # async fn run() -> quarrypool::Result<()> {
//! let pool = Pool::new(Connections, PoolConfig::default())?;
//! let guard = pool.borrow().await?;
//! println!("{}", *guard);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod factory;
pub mod guard;
pub mod idle_queue;
pub mod pool;
pub mod registry;
pub mod slot;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{Error, FieldViolation, Result};
pub use factory::Factory;
pub use guard::Guard;
pub use pool::{Pool, PoolConfig};
pub use slot::SlotState;
