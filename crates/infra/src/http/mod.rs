//! HTTP transport adapter

mod transport;

pub use transport::RestTransport;
