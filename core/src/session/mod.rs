//! Sampling session lifecycle management
//!
//! The session coordinates the whole campaign:
//! - Discovering and caching targets
//! - Arming one deferred task per scheduled round
//! - Folding round outcomes into a single session state
//! - Stopping: cancelling pending rounds and joining running ones
//!
//! # Example
//!
//! ```ignore
//! use airq_core::{SamplingState, SessionBuilder};
//!
//! let session = SessionBuilder::new(bounds)
//!     .period_minutes(1)
//!     .rate_per_minute(5)
//!     .token(token)
//!     .discovery(client.clone())
//!     .fetcher(client)
//!     .build()?;
//!
//! if session.start_blocking().await? == SamplingState::Done {
//!     println!("average: {:?}", session.average_reading());
//! }
//! ```

mod aggregator;
mod builder;
mod controller;

pub use aggregator::{RoundSnapshot, SessionSnapshot, StateAggregator};
pub use builder::SessionBuilder;
pub use controller::SamplingSession;
