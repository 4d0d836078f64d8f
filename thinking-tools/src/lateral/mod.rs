//! Lateral synthesis
//!
//! Forces creative leaps: an origin concept is paired with randomly drawn,
//! unrelated concepts, each of which must be bridged back to the origin
//! before the session can be reflected on and closed.

pub mod config;
pub mod divergence;
pub mod error;
pub mod persistence;
pub mod tools;
pub mod types;

pub use config::LateralConfig;
pub use divergence::{DivergenceStrategy, RandomStrategy, StrategyRegistry};
pub use error::{LateralError, LateralResult};
pub use persistence::SessionHistory;
pub use tools::LateralTools;
pub use types::{ConnectionType, LateralSession};
