//! # Buildwatch Client
//!
//! Session establishment against a watchman-compatible file-watching daemon,
//! used by the build to learn about filesystem changes between runs.
//!
//! ## Pipeline
//!
//! ```text
//! get-sockname subprocess
//!     │
//!     ├──> Connector (unix socket)
//!     │      └─> version/capability negotiation
//!     │            └─> watch-project per root
//!     │                  └─> clock per root
//!     │
//!     └──> WatchSession (Established | Unavailable)
//! ```
//!
//! Every stage is bounded by one shared time budget, and every failure mode
//! collapses into [`WatchSession::Unavailable`]: if establishment did not
//! fully succeed, the build must never believe a working watch session
//! exists.
//!
//! ## Example
//!
//! ```no_run
//! use buildwatch_client::{establish_default, SessionOptions, WatchSession};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let options = SessionOptions::new("/usr/local/bin/watchman")
//!         .watch_root("/repo")
//!         .budget(Duration::from_secs(10));
//!
//!     match establish_default(&options).await {
//!         WatchSession::Established(session) => {
//!             println!("watching via {}", session.sockname.display());
//!         }
//!         WatchSession::Unavailable => {
//!             println!("building without file-watch acceleration");
//!         }
//!     }
//! }
//! ```

mod clock;
mod connect;
mod error;
mod establish;
mod process;
mod session;
pub mod testing;

pub use clock::{Clock, SystemClock, TimeBudget};
pub use connect::{Connector, DaemonClient, UnixConnector};
pub use error::{EstablishError, Result};
pub use establish::{discover_endpoint, establish, establish_default, DaemonEndpoint, SessionOptions};
pub use process::{ProcessOutput, ProcessRunner, SystemProcessRunner};
pub use session::{SessionDescriptor, WatchSession};

pub use buildwatch_protocol::Capability;
