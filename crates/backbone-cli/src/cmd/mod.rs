pub mod config;
pub mod init;
pub mod render;
pub mod run;
pub mod task;
