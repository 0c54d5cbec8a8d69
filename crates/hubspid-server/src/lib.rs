pub mod config;
pub mod observability;
pub mod server;

pub use config::AppConfig;
pub use server::{
    HubspidServer, ServerBuilder, build_app, build_state, create_session_cache,
};
