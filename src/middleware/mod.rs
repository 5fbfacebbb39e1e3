// Middleware for resilient service calls
//
// Provides per-service rate limiting and bounded retry

pub mod rate_limiter;
pub mod retry;

// Re-export commonly used types
pub use rate_limiter::{RateLimiter, WindowState};
pub use retry::retry_with_policy;
