//! The LLM API gateway: one module per layer of the request pipeline
//! (auth -> admission -> rate limit -> cache -> A/B route -> dispatch ->
//! cost -> observability -> evaluation -> trace), plus the HTTP surface
//! tying them together.

pub mod admission;
pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod cost;
pub mod dispatch;
pub mod error;
pub mod evaluation;
pub mod http;
pub mod model;
pub mod observability;
pub mod ratelimit;
pub mod router_ab;
pub mod slack;
pub mod sse;
pub mod trace;
