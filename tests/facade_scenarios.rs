use cryptopool::{
    digest_bytes, digest_str, DigestSpec, MessageDigestFactory, PoolConfig, PoolError, PrngSpec,
    SecureRandomFactory,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn non_blocking(max_total: i32) -> PoolConfig {
    PoolConfig::default().with_max_total(max_total).with_max_wait_millis(0)
}

#[test]
fn test_exhausted_pool_reuses_returned_digest() {
    let facade = MessageDigestFactory::new();
    let spec = DigestSpec::default();
    let config = non_blocking(2);

    let first = facade.get_pooled_instance(&spec, &config).unwrap();
    let second = facade.get_pooled_instance(&spec, &config).unwrap();
    assert_eq!(
        facade.get_pooled_instance(&spec, &config).unwrap_err(),
        PoolError::PoolExhausted
    );

    let returned_id = first.id();
    facade.return_pooled_instance(&spec, first).unwrap();

    let third = facade.get_pooled_instance(&spec, &config).unwrap();
    assert_eq!(third.id(), returned_id);
    assert_ne!(third.id(), second.id());
    assert_eq!(facade.get_pool_stats(&spec).unwrap().count_created, 2);
}

#[test]
fn test_algorithms_get_independent_pools() {
    let facade = MessageDigestFactory::new();
    let sha256 = DigestSpec::new("SHA-256");
    let sha512 = DigestSpec::new("SHA-512");
    let config = PoolConfig::default();

    let short = facade.get_pooled_instance(&sha256, &config).unwrap();
    let long = facade.get_pooled_instance(&sha512, &config).unwrap();
    assert_ne!(short.pool_id(), long.pool_id());
    assert_eq!(short.output_size(), 32);
    assert_eq!(long.output_size(), 64);

    assert_eq!(
        facade.return_pooled_instance(&sha512, short).unwrap_err(),
        PoolError::ForeignResource
    );
    facade.return_pooled_instance(&sha512, long).unwrap();

    // the rejected handle was dropped and went back to its own pool
    assert_eq!(facade.get_pool_stats(&sha256).unwrap().num_idle, 1);
    assert_eq!(facade.get_pool_stats(&sha512).unwrap().num_idle, 1);
}

#[test]
fn test_borrow_return_counts() {
    let facade = MessageDigestFactory::new();
    let spec = DigestSpec::new("SHA-384");
    let config = PoolConfig::default();

    let a = facade.get_pooled_instance(&spec, &config).unwrap();
    let b = facade.get_pooled_instance(&spec, &config).unwrap();
    facade.return_pooled_instance(&spec, a).unwrap();
    facade.return_pooled_instance(&spec, b).unwrap();

    let stats = facade.get_pool_stats(&spec).unwrap();
    assert_eq!(stats.count_borrowed, 2);
    assert_eq!(stats.count_returned, 2);
    assert_eq!(stats.num_active, 0);
    assert_eq!(stats.num_idle, 2);
}

#[test]
fn test_reset_forgets_pools_and_singletons() {
    let facade = MessageDigestFactory::new();
    let spec = DigestSpec::default();
    let config = PoolConfig::default();

    let before = facade.get_pooled_instance(&spec, &config).unwrap();
    let old_pool = before.pool_id();
    facade.return_pooled_instance(&spec, before).unwrap();
    let singleton = facade.get_singleton(&spec).unwrap();

    facade.reset();
    assert!(matches!(facade.get_pool_stats(&spec), Err(PoolError::UnknownPool(_))));
    assert_eq!(facade.registry().singleton_count(), 0);

    let after = facade.get_pooled_instance(&spec, &config).unwrap();
    assert_ne!(after.pool_id(), old_pool);
    assert_eq!(facade.get_pool_stats(&spec).unwrap().count_created, 1);
    assert!(!Arc::ptr_eq(&singleton, &facade.get_singleton(&spec).unwrap()));
}

#[test]
fn test_return_after_reset_is_unknown_pool() {
    let facade = MessageDigestFactory::new();
    let spec = DigestSpec::default();
    let digest = facade.get_pooled_instance(&spec, &PoolConfig::default()).unwrap();

    facade.reset();
    assert!(matches!(
        facade.return_pooled_instance(&spec, digest),
        Err(PoolError::UnknownPool(_))
    ));
}

#[test]
fn test_pool_config_is_fixed_by_first_use() {
    let facade = MessageDigestFactory::new();
    let spec = DigestSpec::default();

    let held = facade.get_pooled_instance(&spec, &non_blocking(1)).unwrap();
    assert_eq!(
        facade.get_pooled_instance(&spec, &non_blocking(10)).unwrap_err(),
        PoolError::PoolExhausted
    );
    drop(held);
}

#[test]
fn test_digest_utility_known_answers() {
    let facade = MessageDigestFactory::new();

    let sha256 = digest_str(&facade, "abc", &DigestSpec::default()).unwrap();
    assert_eq!(
        hex(&sha256),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );

    let sha512 = digest_bytes(&facade, b"abc", &DigestSpec::new("SHA-512")).unwrap();
    assert_eq!(
        hex(&sha512[..16]),
        "ddaf35a193617abacc417349ae204131"
    );

    // same result from the pooled digest on a second call
    assert_eq!(digest_str(&facade, "abc", &DigestSpec::default()).unwrap(), sha256);
    assert_eq!(facade.get_pool_stats(&DigestSpec::default()).unwrap().count_created, 1);
}

#[test]
fn test_digest_utility_uses_spec_pool_properties() {
    let mut props = HashMap::new();
    props.insert("algorithmName".to_string(), "SHA-224".to_string());
    props.insert("maxTotal".to_string(), "1".to_string());
    props.insert("maxWaitMillis".to_string(), "0".to_string());
    let spec = DigestSpec::from_properties(&props);

    let facade = MessageDigestFactory::new();
    assert_eq!(digest_bytes(&facade, b"payload", &spec).unwrap().len(), 28);

    let held = facade.get_pooled_instance(&spec, &PoolConfig::default()).unwrap();
    assert_eq!(digest_bytes(&facade, b"payload", &spec).unwrap_err(), PoolError::PoolExhausted);
    drop(held);
}

#[test]
fn test_unavailable_primitives() {
    let digests = MessageDigestFactory::new();
    assert_eq!(
        digests.get_instance(&DigestSpec::new("WHIRLPOOL")).unwrap_err(),
        PoolError::AlgorithmUnavailable("WHIRLPOOL".to_string())
    );
    assert_eq!(
        digests.get_singleton(&DigestSpec::default().with_provider("BC")).unwrap_err(),
        PoolError::ProviderUnavailable("BC".to_string())
    );

    let randoms = SecureRandomFactory::new();
    assert!(matches!(
        randoms.get_instance(&PrngSpec::new().with_algorithm("NativePRNG")),
        Err(PoolError::AlgorithmUnavailable(_))
    ));
}

#[test]
fn test_concurrent_singleton_creation_happens_once() {
    let facade = Arc::new(SecureRandomFactory::new());
    let spec = PrngSpec::new().with_algorithm("StdRng");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let facade = Arc::clone(&facade);
            let spec = spec.clone();
            thread::spawn(move || facade.get_singleton(&spec).unwrap())
        })
        .collect();
    let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(instances.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(facade.registry().singleton_count(), 1);
}

#[test]
fn test_concurrent_pooled_hashing_respects_max_total() {
    let facade = Arc::new(MessageDigestFactory::new());
    let spec = DigestSpec::default();
    let config = PoolConfig::default().with_max_total(3);

    let handles: Vec<_> = (0..12)
        .map(|i| {
            let facade = Arc::clone(&facade);
            let spec = spec.clone();
            let config = config.clone();
            thread::spawn(move || {
                for _ in 0..20 {
                    let digest = facade.get_pooled_instance(&spec, &config).unwrap();
                    digest.update(format!("worker {i}").as_bytes());
                    assert_eq!(digest.digest().len(), 32);
                    facade.return_pooled_instance(&spec, digest).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = facade.get_pool_stats(&spec).unwrap();
    assert_eq!(stats.count_borrowed, 240);
    assert_eq!(stats.count_returned, 240);
    assert!(stats.count_created <= 3);
    assert_eq!(stats.num_active, 0);
}
