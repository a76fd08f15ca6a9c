pub mod batch;
pub mod cli;
pub mod config;
pub mod decode;
pub mod document;
pub mod normalize;
pub mod pipeline;
pub mod sink;
pub mod spool;
