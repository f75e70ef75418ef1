// Hookline Infrastructure - HTTP Adapter
// Implements: HttpTransport

mod transport;

pub use transport::{ReqwestTransport, MAX_RESPONSE_BYTES, USER_AGENT};
