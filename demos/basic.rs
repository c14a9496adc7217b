//! Basic usage examples for ObjectPool and the primitive facades

use cryptopool::{
    digest_str, DigestSpec, FnFactory, KeyedPoolRegistry, MessageDigestFactory, ObjectPool, PoolConfig, PoolError,
    PrngSpec, SecureRandomFactory,
};

fn main() {
    println!("=== cryptopool - Basic Examples ===\n");

    // Example 1: Simple pool with a closure factory
    simple_pool();

    // Example 2: Bounded pool without waiting
    bounded_pool();

    // Example 3: Keyed registry
    keyed_registry();

    // Example 4: Digests and random generators
    primitives();
}

fn simple_pool() {
    println!("1. Simple Pool:");
    let pool = ObjectPool::new(FnFactory::new(|| Ok(String::with_capacity(64))), PoolConfig::default()).unwrap();

    {
        let mut buffer = pool.borrow().unwrap();
        buffer.push_str("hello");
        println!("   Got buffer #{}: {}", buffer.id(), *buffer);
        // Resource automatically returned when dropped
    }

    println!("   Idle after return: {}\n", pool.num_idle());
}

fn bounded_pool() {
    println!("2. Bounded Pool:");

    let config = PoolConfig::default().with_max_total(2).with_max_wait_millis(0);
    let pool = ObjectPool::new(FnFactory::new(|| Ok(0u64)), config).unwrap();

    let first = pool.borrow().unwrap();
    let _second = pool.borrow().unwrap();
    println!("   Active resources: {}", pool.num_active());

    match pool.borrow() {
        Err(PoolError::PoolExhausted) => println!("   Third borrow: pool exhausted"),
        other => println!("   Third borrow: unexpected {other:?}"),
    }

    let id = first.id();
    pool.return_object(first).unwrap();
    let third = pool.borrow().unwrap();
    println!("   After a return the same resource comes back: {}\n", third.id() == id);
}

fn keyed_registry() {
    println!("3. Keyed Registry:");
    let registry: KeyedPoolRegistry<&str, Vec<u8>> = KeyedPoolRegistry::new();
    let config = PoolConfig::default();

    for key in ["small", "large", "small"] {
        let size = if key == "small" { 16 } else { 4096 };
        let buffer = registry.borrow_from(&key, &config, || FnFactory::new(move || Ok(vec![0u8; size]))).unwrap();
        println!("   {key}: buffer of {} bytes", buffer.len());
        registry.return_to(&key, buffer).unwrap();
    }

    println!("   Pools: {}", registry.pool_count());
    println!("   small pool stats: {:?}\n", registry.stats_for(&"small").unwrap());
}

fn primitives() {
    println!("4. Digests and Random Generators:");
    let digests = MessageDigestFactory::new();
    let randoms = SecureRandomFactory::new();

    let hash = digest_str(&digests, "abc", &DigestSpec::default()).unwrap();
    let hex: String = hash.iter().map(|b| format!("{b:02x}")).collect();
    println!("   SHA-256(\"abc\") = {hex}");

    let random = randoms.get_pooled_instance(&PrngSpec::default(), &PoolConfig::default()).unwrap();
    println!("   {} says {}", random.algorithm(), random.next_u64());

    match digests.get_instance(&DigestSpec::new("MD5")) {
        Err(err) => println!("   MD5: {err}"),
        Ok(_) => println!("   MD5 is available"),
    }
}
