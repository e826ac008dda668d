mod async_client;

pub(crate) use async_client::Operation;
pub use async_client::{Client, ClientBuilder};
