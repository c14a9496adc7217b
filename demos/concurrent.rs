//! Multi-threaded hashing against a shared digest pool, with eviction

use cryptopool::{DigestSpec, MessageDigestFactory, PoolConfig};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cryptopool=debug")))
        .init();

    println!("=== cryptopool - Concurrent Hashing ===\n");

    let facade = Arc::new(MessageDigestFactory::new());
    let spec = DigestSpec::new("SHA-512");
    let config = PoolConfig::default()
        .with_max_total(4)
        .with_min_idle(1)
        .with_fairness(true)
        .with_eviction_interval_millis(100)
        .with_min_evictable_idle_millis(200);

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let facade = Arc::clone(&facade);
            let spec = spec.clone();
            let config = config.clone();
            thread::spawn(move || {
                for round in 0..50 {
                    let digest = facade.get_pooled_instance(&spec, &config).unwrap();
                    digest.update(format!("worker {worker} round {round}").as_bytes());
                    let _hash = digest.digest();
                    thread::sleep(Duration::from_millis(1));
                    facade.return_pooled_instance(&spec, digest).unwrap();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    let stats = facade.get_pool_stats(&spec).unwrap();
    println!("After the workers finished:");
    println!("   Borrowed: {}", stats.count_borrowed);
    println!("   Created: {}", stats.count_created);
    println!("   Idle: {}", stats.num_idle);
    println!("   Mean wait: {}ms", stats.mean_borrow_wait_time_millis);
    println!("   Mean active: {}ms", stats.mean_active_time_millis);

    thread::sleep(Duration::from_millis(600));

    let stats = facade.get_pool_stats(&spec).unwrap();
    println!("\nAfter idle eviction:");
    println!("   Idle: {}", stats.num_idle);
    println!("   Destroyed by evictor: {}", stats.count_destroyed_by_evictor);

    facade.reset();
}
