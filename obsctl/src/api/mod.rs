mod client;

pub use client::AuthenticatedClientFactory;
