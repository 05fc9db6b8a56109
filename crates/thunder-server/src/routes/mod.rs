//! HTTP route handlers (component C8). Each submodule owns one surface of
//! the façade; [`crate::build_router`] wires them onto a single `Router`.

pub mod flow;
pub mod oauth2;
pub mod wellknown;
