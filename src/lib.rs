pub mod cli;
pub mod config;
pub mod engine;
pub mod extract;
pub mod mentor;
pub mod postprocess;
pub mod server;
pub mod textbook;
pub mod util;
pub mod vision;
