//! Core types shared across the codebase.

mod mode;
mod state;

pub use mode::BuildMode;
pub use state::{
    is_healthy, is_serving, is_shutdown, register_server, set_healthy, set_serving,
    setup_shutdown_handler,
};
