#![doc = "The `taskvault` library crate."]
#![doc = ""]
#![doc = "Users, tasks and their image attachments behind a token-authenticated HTTP API."]
#![doc = "Persistence and blob storage sit behind traits so the binary (`main.rs`) wires"]
#![doc = "Postgres and S3 while the tests run on in-memory implementations."]

pub mod attachments;
pub mod auth;
pub mod blob;
pub mod config;
pub mod error;
pub mod form;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;

pub use crate::config::Config;
pub use crate::error::AppError;
pub use crate::state::AppState;
