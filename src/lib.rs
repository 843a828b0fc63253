pub mod config;
pub mod error;
pub mod ipc;
pub mod poller;
pub mod window;
pub mod worker;
