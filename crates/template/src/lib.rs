//! Template engine glue for the tansu dotfile engine.
//!
//! Wraps minijinja with the configuration the engine needs: named partials
//! registered from `.chezmoitemplates/`, a caller-supplied function table,
//! and rendering over a JSON-like data context.

pub mod engine;

pub use engine::{Error, Result, TemplateEngine};
