//! Remote policy-service protocol: wire types, dispatch, pool management

pub mod client;
pub mod pool;
pub mod types;

pub use client::CheckAccessClient;
