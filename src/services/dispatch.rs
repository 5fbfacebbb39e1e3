// Single path for every backend call: rate limit, retry, metrics

use std::future::Future;
use std::time::Instant;
use tracing::trace;

use crate::core::backends::BackendKind;
use crate::core::errors::ServiceResult;
use crate::core::params::RetryPolicy;
use crate::middleware::{retry_with_policy, RateLimiter};
use crate::utils::Metrics;

#[derive(Clone)]
pub struct Dispatcher {
    limiter: RateLimiter,
    metrics: Metrics,
}

impl Dispatcher {
    pub fn new(limiter: RateLimiter, metrics: Metrics) -> Self {
        Self { limiter, metrics }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Call `backend` through `operation` with retries.
    ///
    /// Remote backends take a rate-limit slot under their service key before
    /// every attempt, so retries count against the budget like any other
    /// request. `budget` is requests per window, 0 for unlimited.
    pub async fn call<B, T, F, Fut>(
        &self,
        backend: B,
        budget: u32,
        policy: RetryPolicy,
        mut operation: F,
    ) -> ServiceResult<T>
    where
        B: BackendKind,
        F: FnMut() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        let service = backend.service_key();
        let service_key = service.as_str();
        let remote = backend.is_remote();
        let limiter = &self.limiter;
        let metrics = &self.metrics;

        retry_with_policy(service_key, policy, move |attempt| {
            if attempt > 1 {
                metrics.record_retry();
            }
            let request = operation();
            async move {
                if remote {
                    let waited = limiter.acquire(service_key, budget).await;
                    metrics.record_rate_limit_wait(waited);
                }
                trace!("{}: attempt {}", service_key, attempt);
                let started = Instant::now();
                let result = request.await;
                metrics.record_backend_call(service_key, result.is_ok(), started.elapsed());
                result
            }
        })
        .await
    }
}
