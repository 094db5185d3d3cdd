//! Bounded rayon pools for per-file work.

use tracing::warn;

/// Run `op` on a pool of at most `workers` threads.
///
/// Falls back to the global pool if a dedicated one cannot be built.
pub fn install<R, F>(workers: usize, op: F) -> R
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    match rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("repointel-worker-{}", i))
        .build()
    {
        Ok(pool) => pool.install(op),
        Err(e) => {
            warn!(error = %e, "failed to build worker pool, using the global pool");
            op()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_install_preserves_order() {
        let input: Vec<usize> = (0..100).collect();
        let doubled: Vec<usize> = install(2, || input.par_iter().map(|n| n * 2).collect());
        assert_eq!(doubled[0], 0);
        assert_eq!(doubled[99], 198);
    }
}
