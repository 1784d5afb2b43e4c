pub mod ai;
pub mod config;
pub mod control;
pub mod run;
pub mod schedule;
pub mod settings;
pub mod timer;
