//! Provider access: transport, request lifecycle, and periodic refresh.

pub mod executor;
pub mod refresh;
pub mod transport;

pub use executor::{Completion, PendingRequest, RequestExecutor, RequestState, StateWatcher};
pub use refresh::RefreshHandle;
pub use transport::{HttpTransport, HttpTransportConfig, RawResponse, Transport};
