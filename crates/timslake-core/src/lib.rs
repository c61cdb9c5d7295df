pub mod clock;
pub mod config;
pub mod error;
pub mod journal;
pub mod layout;
pub mod pipeline;
pub mod retention;
pub mod snapshot;
pub mod store;
