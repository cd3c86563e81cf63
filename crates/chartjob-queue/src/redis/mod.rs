//! Redis queue provider.

pub mod client;
pub mod queue;

pub use client::{RedisClient, RedisEndpoint};
pub use queue::RedisQueue;
