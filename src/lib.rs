pub mod core {
    pub mod buffer;
    pub mod config;
    pub mod error;
    pub mod transport;
}

pub mod games;

// Re-export for convenience
pub use crate::core::error::{NetError, Result};
pub use crate::core::transport::{ConnectionState, LineStream};
