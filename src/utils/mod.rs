// Small helpers shared by the auth and document layers.

use std::future::Future;
use std::time::Duration;

use crate::error::{ServiceError, ServiceResult};

/// Run a store or cache call under the operation deadline.
///
/// When the deadline elapses the inner future is dropped, which aborts the
/// outstanding call, and `Cancelled` is returned instead of hanging.
pub async fn bounded<T, F>(
    op: &'static str,
    deadline: Duration,
    fut: F,
) -> ServiceResult<T>
where
    F: Future<Output = ServiceResult<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("{} did not complete within {:?}", op, deadline);
            Err(ServiceError::Cancelled(op))
        }
    }
}

/// Constant-time byte comparison to prevent timing attacks.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
