//! Transparency reporting: what the agent observed and what the privacy
//! policy suppressed.

pub mod log;

pub use log::{
    create_shared_log, create_shared_log_with_persistence, SharedTransparencyLog, TransparencyLog,
    TransparencyStats,
};
