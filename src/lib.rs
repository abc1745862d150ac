pub mod cli;
pub mod config;
pub mod consent;
pub mod engine;
pub mod environment;
pub mod pipeline;
pub mod report;
pub mod requirements;
pub mod submit;
pub mod util;
