//! HTTP middleware stack.

pub mod headers;
pub mod trace;
