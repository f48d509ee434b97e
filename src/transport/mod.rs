pub mod http_transport;
pub mod retry_policy;

pub use http_transport::{endpoint_url, HttpTransport};
pub use retry_policy::RetryPolicy;
