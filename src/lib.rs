//! NymMarket - Payment & Settlement Engine
//!
//! This crate turns subscription and marketplace purchases on the NymMarket
//! identity platform into verified, exactly-once state transitions backed by
//! Lightning Network sats.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
