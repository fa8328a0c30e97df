pub mod auth;
pub mod client;
pub mod error;
pub mod feed;
pub mod hub;

pub use client::StoreClient;
pub use error::StoreError;
pub use feed::EventFeed;
pub use hub::StoreHub;
