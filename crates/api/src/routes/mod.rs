//! HTTP Route Handlers

pub mod recording;
pub mod settings;
pub mod stream;
pub mod system;
