pub mod backend;
pub mod config;
pub mod debrid;
pub mod dispatch;
pub mod download;
pub mod feed;
pub mod webserver;
