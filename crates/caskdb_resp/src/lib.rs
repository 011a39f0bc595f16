//! # CaskDB RESP Server
//!
//! A thin RESP-protocol TCP front-end over a CaskDB datastore.
//!
//! This crate provides:
//! - A minimal RESP codec (arrays of bulk strings in, simple
//!   strings / bulk strings / errors out)
//! - A thread-per-connection TCP server exposing `GET`, `SET`, `DEL`
//!   and `PING` over an exclusively held datastore

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod config;
pub mod error;
pub mod server;

pub use codec::Reply;
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::RespServer;
