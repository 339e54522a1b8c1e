pub mod archive;
pub mod blob;
pub mod config;
pub mod domain;
pub mod download;
pub mod error;
pub mod figshare;
pub mod logging;
pub mod orchestrate;
pub mod output;
pub mod pipeline;
pub mod pool;
pub mod upload;
