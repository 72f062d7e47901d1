//! Adapters: concrete implementations of the ports plus the HTTP surface.

pub mod auth;
pub mod http;
pub mod lightning;
pub mod lnurl;
pub mod memory;
pub mod postgres;
