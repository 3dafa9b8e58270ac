pub mod config;
pub mod context;
pub mod gateway;
pub mod handler;
pub mod http;
pub mod status;
pub mod supervisor;
