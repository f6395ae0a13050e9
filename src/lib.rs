pub mod api;
pub mod blueprint;
pub mod config;
pub mod errors;
pub mod extension;
pub mod link;
pub mod materialize;
pub mod options;
pub mod patchers;
pub mod pipeline;
pub mod preview;
pub mod prompt;
pub mod resolve;
pub mod structure;
pub mod templates;
pub mod transactions;
