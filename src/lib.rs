//! Injects the Intercom messaging widget's install code into rendered pages
//! for logged-in visitors, driven by a small validated settings record.

pub mod admin;
pub mod config;
pub mod gate;
pub mod hooks;
pub mod install;
pub mod lifecycle;
pub mod payload;
pub mod render;
pub mod routing;
pub mod server;
pub mod session;
pub mod settings;
pub mod store;
pub mod viewer;
