//! In-memory online auctions engine and background session manager.
//!
//! The binary (`src/main.rs`) wires this library's pieces together into a
//! running service; everything here is usable standalone by an embedder
//! that wants the engine without the HTTP/CLI/config trappings.

#[macro_use]
extern crate lazy_static;

pub mod clock;
pub mod config;
pub mod domain;
pub mod http;
pub mod mq;
pub mod notifications;
pub mod repository;
pub mod service;
pub mod session;
