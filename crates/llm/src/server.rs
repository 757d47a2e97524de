mod content_cache;
mod handler;
mod models;

pub use handler::LlmHandler;
