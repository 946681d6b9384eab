pub mod config;
pub mod fetch;
pub mod manager;
pub mod window;
pub mod worker;
