//! `dutylog` - Duty and incident logging for security personnel
//!
//! Officers start a duty tied to a post, attach incident reports while the
//! duty is active, and end it when their shift is over. At most one duty per
//! officer name is active at a time.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod duty;
pub mod error;
pub mod http;
pub mod logging;
pub mod service;
pub mod storage;

pub use config::Config;
pub use duty::{DutyLog, DutyStatus, Incident, Post};
pub use error::{DutyError, DutyResult, Error, Result};
pub use logging::init_logging;
pub use service::DutyService;
pub use storage::{DutyFilter, DutyStore, DutySummary, Storage};
