//! # QuitBox Core Library
//!
//! This library provides the control logic for QuitBox, a lockable box
//! that rations access to cigarettes. The `quitbox` CLI and any device
//! host are thin layers over the same controller.
//!
//! ## Architecture
//!
//! - **Timer Engine**: lockout countdown on the uptime clock plus a
//!   recurring daily/weekly schedule on the wall clock. The caller
//!   invokes `tick()`; the engine never reads a clock itself
//! - **Emergency Admission**: daily budget of overrides, each adding a
//!   penalty to the next lockout
//! - **Gatekeeper**: timed chat and reflection sessions that must run
//!   their course before an override is granted
//! - **Storage**: SQLite key/value persistence and TOML host configuration
//!
//! ## Key Components
//!
//! - [`Controller`]: owns all box state, driven by `tick()`
//! - [`BoxService`]: async host running the control loop
//! - [`TimerEngine`]: countdown and schedule state machine
//! - [`AdmissionController`]: emergency budget bookkeeping
//! - [`Gatekeeper`]: AI gatekeeper sessions

pub mod api;
pub mod clock;
pub mod controller;
pub mod emergency;
pub mod error;
pub mod events;
pub mod gatekeeper;
pub mod hardware;
pub mod limits;
pub mod machine;
pub mod progress;
pub mod service;
pub mod settings;
pub mod storage;
pub mod timer;

pub use api::{ConfigResponse, ConfigUpdate, ScheduleUpdate, StatusResponse};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{AiSession, Controller, Hardware};
pub use emergency::{AdmissionController, Grant, GrantKind, NetworkPolicy};
pub use error::{ConfigError, CoreError, Denial, HardwareError, StoreError, ValidationError};
pub use events::{Cause, Event};
pub use gatekeeper::{Gatekeeper, Personality, ReflectionStep, Trigger};
pub use hardware::{Actuator, Screen, StatusDisplay};
pub use machine::{BoxState, BoxStateMachine};
pub use progress::Progress;
pub use service::BoxService;
pub use settings::BoxSettings;
pub use storage::{Config, KeyValueStore, MemoryStore, SqliteStore, StoreValue};
pub use timer::{RecurringSchedule, TimerEngine, TimerMode};
