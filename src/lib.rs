//! # todo-sync
//!
//! A two-category task tracker.
//!
//! - [`api`] and [`infrastructure`] make up the REST service, which keeps
//!   tasks in memory behind a [`infrastructure::TaskRepository`].
//! - [`client`] is the offline-first client: a persisted mirror, a remote
//!   API client, and a [`client::TaskBoard`] that mutates locally first and
//!   syncs in the background.
//! - [`domain`] holds the types both sides share.

pub mod api;
pub mod client;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod telemetry;
