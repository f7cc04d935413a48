pub mod http;
pub mod memory;
pub mod provider;

pub use http::HttpAuthProvider;
pub use memory::MemoryAuthProvider;
pub use provider::{AuthError, AuthProvider};
