//! Infrastructure concerns shared by the relay binary and its web layer:
//! environment-sourced configuration and logger setup.

pub mod config;
pub mod logging;
