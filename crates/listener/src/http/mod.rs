mod executor;

pub use executor::{ApiRequest, ApiResponse, RequestExecutor};
