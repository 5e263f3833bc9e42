//! ortograbot: finds common Spanish misspellings on Twitter and gently
//! corrects their authors.

pub mod channels;
pub mod config;
pub mod error;
pub mod lang;
pub mod pipeline;
pub mod scheduler;
pub mod store;
