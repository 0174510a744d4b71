//! Async runtime utilities for chromasim.
//!
//! The public loader API is synchronous; it drives the async engine through a
//! multi-threaded Tokio runtime built per call.

use std::future::Future;

use common_error::{ChromaError, ChromaResult};
use tokio::runtime::{Builder, Runtime};

/// Build a multi-threaded Tokio runtime with the given number of worker threads.
pub fn get_runtime(worker_threads: usize) -> ChromaResult<Runtime> {
    Builder::new_multi_thread()
        .worker_threads(worker_threads.max(1))
        .enable_all()
        .build()
        .map_err(|e| ChromaError::internal(format!("Failed to create runtime: {e}")))
}

/// Block on a future using a fresh runtime.
///
/// Must not be called from inside an async context.
pub fn block_on<F: Future>(worker_threads: usize, future: F) -> ChromaResult<F::Output> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(ChromaError::internal(
            "blocking call issued from within an async runtime; use the async API instead",
        ));
    }
    let runtime = get_runtime(worker_threads)?;
    Ok(runtime.block_on(future))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_on() {
        let value = block_on(2, async { 40 + 2 }).unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_block_on_inside_runtime_is_rejected() {
        let err = block_on(1, async {}).unwrap_err();
        assert!(matches!(err, ChromaError::InternalError(_)));
    }
}
