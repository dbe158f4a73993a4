//! Revista - school magazine portal
//!
//! Client core (article review workflow, offline-first sync, notifications)
//! and the HTTP content service it talks to.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod remote;
pub mod services;
pub mod sync;
pub mod workflow;
