pub mod api;
pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod errors;
pub mod logger;
pub mod models;
pub mod offline_queue;
pub mod poller;
pub mod token_storage;
pub mod traits;

pub use client::{ApiClient, RequestDescriptor, ReqwestTransport, Transport};
pub use config::{Config, load_config};
pub use errors::{ApiError, AppError};
pub use offline_queue::OfflineQueue;
pub use poller::{DesktopNotifier, IncomingCallWatcher, Notifier};
pub use token_storage::{KeyringTokenStore, MemoryTokenStore, TokenPair, TokenStore};
pub use traits::{LogSessionObserver, SessionObserver};
