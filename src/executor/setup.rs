use crate::{
    config::{LARGE_DEPTH, RunConfig, Strategy},
    error::ConfigError,
    types::leaf_count,
};
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Validates `config` and starts the work-stealing pool every decomposition
/// task runs on.
pub(super) fn build_pool(config: &RunConfig) -> Result<ThreadPool, ConfigError> {
    config.validate()?;
    if config.depth >= LARGE_DEPTH {
        tracing::warn!(
            depth = config.depth,
            lines = config.encoding.expected_values(config.depth),
            "output grows tenfold per digit of depth"
        );
    }
    if config.strategy == Strategy::Queue {
        let leaves = leaf_count(config.depth);
        if u64::try_from(config.queue_capacity).is_ok_and(|capacity| capacity < leaves) {
            tracing::debug!(
                capacity = config.queue_capacity,
                leaves,
                "queue smaller than the output, producers will block on backpressure"
            );
        }
    }
    let pool = ThreadPoolBuilder::new()
        .num_threads(config.num_threads.unwrap_or(0))
        .thread_name(|idx| format!("combofork-worker-{idx}"))
        .build()?;
    tracing::debug!(threads = pool.current_num_threads(), "worker pool ready");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_honors_thread_count() {
        let pool = build_pool(&RunConfig::new(1).with_num_threads(3)).unwrap();
        assert_eq!(pool.current_num_threads(), 3);
        let name = pool.install(|| std::thread::current().name().map(str::to_owned));
        assert!(name.unwrap().starts_with("combofork-worker-"));
    }

    #[test]
    fn invalid_config_never_starts_a_pool() {
        assert!(matches!(
            build_pool(&RunConfig::new(1).with_num_threads(0)),
            Err(ConfigError::ZeroThreads)
        ));
    }
}
