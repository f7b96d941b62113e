//! Authenticated calls to the vaccination backend REST API.
//!
//! Calls are independent: nothing is de-duplicated and failures are returned to
//! the caller as `AppError`, which renders as a transient notification.

mod cache;
mod client;
mod models;
mod retry;
mod token;

pub use cache::ResponseCache;
pub use client::{BackendClient, ForwardedResponse};
pub use models::{AccountTypeResponse, AdministerRequest, AuthResponse, LoginRequest, UserProfile};
pub use retry::{with_retry, with_retry_if, RetryPolicy};
pub use token::{CookieToken, NoToken, StorageToken, TokenSource};
