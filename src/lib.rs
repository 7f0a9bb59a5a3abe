// Re-export modules for testing and external use
pub mod backends;
pub mod commands;
pub mod config;
pub mod resources;
pub mod synthesizer;
pub mod template;

pub mod formatters {
    pub mod output;

    pub use output::OutputFormatter;
}

pub mod shared {
    pub mod logging;
}

pub mod terraform {
    pub mod executor;
    pub mod model;
    pub mod output_parser;
}

pub mod core {
    pub mod application;
}

// Re-export commonly used types for easier testing and external use
pub use backends::{LocalBackend, S3Backend, StateBackend};
pub use config::Config;
pub use core::application::Application;
pub use resources::{ResourceError, ResourceReference};
pub use synthesizer::Synthesizer;
pub use template::TemplateFile;
