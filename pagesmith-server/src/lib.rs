//! pagesmith: turns task webhooks into published GitHub Pages sites.
//!
//! A round 1 request creates a repository named after the task, publishes a
//! generated `index.html` with README and LICENSE, and enables Pages. A
//! round 2 request revises the page in place. Either way the evaluator is
//! notified once, after a fixed delay, with the repository and Pages URLs.

pub mod config;
pub mod documents;
pub mod error;
pub mod generator;
pub mod host;
pub mod llm;
pub mod model;
pub mod notifier;
pub mod orchestrator;
pub mod repository;
pub mod supervisor;
pub mod sync;
pub mod web;
