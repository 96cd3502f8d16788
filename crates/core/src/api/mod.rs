//! API call execution: classification, retries, pagination

mod executor;
mod ports;

pub use executor::{ApiCallExecutor, CallPolicy};
pub use ports::{ApiRequest, ApiResponse, ApiTransport, HttpMethod, TransportError};
