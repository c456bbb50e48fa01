#![forbid(unsafe_code)]

pub mod aggregate;
pub mod app;
pub mod bootstrap;
pub mod cli;
pub mod collect;
pub mod config;
pub mod error;
pub mod formats;
pub mod logging;
pub mod mail;
pub mod seo;
pub mod spider;
pub mod store;
pub mod translate;
pub mod upload;
pub mod web_info;
pub mod writer;
