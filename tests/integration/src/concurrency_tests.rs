//! Concurrent first access to loaders and instances
//!
//! Every test releases its threads through a barrier so that first lookups
//! race each other.

use spi_core::{ImplementationTable, ImplementationType, LoaderDirectory, StaticSource};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier, OnceLock, Weak};
use std::thread;
use std::time::Duration;

trait Cipher: Send + Sync {
    fn id(&self) -> usize;
}

trait Digest: Send + Sync {
    fn id(&self) -> usize;
}

spi_core::extension_point!(dyn Cipher, "org.acme.Cipher", default = "aes");
spi_core::extension_point!(dyn Digest, "org.acme.Digest");

struct Aes {
    id: usize,
}

impl Cipher for Aes {
    fn id(&self) -> usize {
        self.id
    }
}

impl Digest for Aes {
    fn id(&self) -> usize {
        self.id
    }
}

const THREADS: usize = 16;

/// Directory whose only implementation sleeps while being built and counts
/// its constructions.
fn slow_directory(built: &Arc<AtomicUsize>) -> LoaderDirectory {
    let counter = Arc::clone(built);
    let table = ImplementationTable::new();
    table.register(
        ImplementationType::with_constructor("crypto.Aes", move || {
            thread::sleep(Duration::from_millis(20));
            let id = counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, io::Error>(Aes { id })
        })
        .provides::<dyn Cipher>(|c| -> Arc<dyn Cipher> { c })
        .provides::<dyn Digest>(|c| -> Arc<dyn Digest> { c })
        .build(),
    );

    let source = StaticSource::new()
        .with_block("org.acme.Cipher", "aes=crypto.Aes\nrijndael=crypto.Aes")
        .with_block("org.acme.Digest", "aes-mac=crypto.Aes");
    LoaderDirectory::new(source, table)
}

fn race<R: Send + 'static>(work: impl Fn() -> R + Send + Sync + 'static) -> Vec<R> {
    let barrier = Arc::new(Barrier::new(THREADS));
    let work = Arc::new(work);

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            let work = Arc::clone(&work);
            thread::spawn(move || {
                barrier.wait();
                work()
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|handle| handle.join().expect("Thread should not panic"))
        .collect()
}

#[test]
fn test_concurrent_for_type_returns_one_loader() {
    let built = Arc::new(AtomicUsize::new(0));
    let dir = Arc::new(slow_directory(&built));

    let worker_dir = Arc::clone(&dir);
    let loaders = race(move || worker_dir.for_type::<dyn Cipher>().unwrap());

    for loader in &loaders[1..] {
        assert!(Arc::ptr_eq(&loaders[0], loader));
    }
    assert_eq!(dir.len(), 1);
}

#[test]
fn test_concurrent_get_constructs_once() {
    let built = Arc::new(AtomicUsize::new(0));
    let dir = Arc::new(slow_directory(&built));

    let worker_dir = Arc::clone(&dir);
    let ciphers = race(move || {
        worker_dir
            .for_type::<dyn Cipher>()
            .unwrap()
            .get_default()
            .unwrap()
    });

    for cipher in &ciphers[1..] {
        assert!(Arc::ptr_eq(&ciphers[0], cipher));
    }
    assert_eq!(built.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_access_across_names_and_points() {
    let built = Arc::new(AtomicUsize::new(0));
    let dir = Arc::new(slow_directory(&built));
    let next = Arc::new(AtomicUsize::new(0));

    let worker_dir = Arc::clone(&dir);
    let ids = race(move || match next.fetch_add(1, Ordering::SeqCst) % 3 {
        0 => worker_dir.for_type::<dyn Cipher>().unwrap().get("aes").unwrap().id(),
        1 => worker_dir
            .for_type::<dyn Cipher>()
            .unwrap()
            .get("rijndael")
            .unwrap()
            .id(),
        _ => worker_dir
            .for_type::<dyn Digest>()
            .unwrap()
            .get("aes-mac")
            .unwrap()
            .id(),
    });

    assert!(ids.iter().all(|&id| id == 0), "ids: {ids:?}");
    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(dir.instance_count(), 1);
}

#[test]
fn test_clear_during_lookups_keeps_loaders_usable() {
    let built = Arc::new(AtomicUsize::new(0));
    let dir = Arc::new(slow_directory(&built));

    let worker_dir = Arc::clone(&dir);
    let next = Arc::new(AtomicUsize::new(0));
    let results = race(move || {
        if next.fetch_add(1, Ordering::SeqCst) == 0 {
            worker_dir.clear();
            true
        } else {
            worker_dir
                .for_type::<dyn Cipher>()
                .unwrap()
                .get("aes")
                .is_ok()
        }
    });

    assert!(results.into_iter().all(|ok| ok));
    let cipher = dir.for_type::<dyn Cipher>().unwrap().get("aes").unwrap();
    assert!(cipher.id() < built.load(Ordering::SeqCst));
}

trait Transport: Send + Sync {
    fn scheme(&self) -> &'static str;
}

trait Endpoint: Send + Sync {
    fn scheme(&self) -> &'static str;
}

spi_core::extension_point!(dyn Transport, "org.acme.Transport");
spi_core::extension_point!(dyn Endpoint, "org.acme.Endpoint");

/// Provides both points; building it looks up another endpoint.
struct Tunnel {
    upstream: Arc<dyn Endpoint>,
}

impl Transport for Tunnel {
    fn scheme(&self) -> &'static str {
        "tunnel"
    }
}

impl Endpoint for Tunnel {
    fn scheme(&self) -> &'static str {
        "tunnel"
    }
}

#[derive(Default)]
struct Loopback;

impl Endpoint for Loopback {
    fn scheme(&self) -> &'static str {
        "loopback"
    }
}

#[test]
fn test_constructor_lookup_does_not_deadlock_with_other_loader() {
    let directory: Arc<OnceLock<Weak<LoaderDirectory>>> = Arc::new(OnceLock::new());
    let rendezvous = Arc::new(Barrier::new(2));

    let table = ImplementationTable::new();
    let ctor_directory = Arc::clone(&directory);
    let ctor_rendezvous = Arc::clone(&rendezvous);
    table.register(
        ImplementationType::with_constructor("net.Tunnel", move || {
            // Let the other thread start its own lookup of this type first.
            ctor_rendezvous.wait();
            thread::sleep(Duration::from_millis(50));
            let dir = ctor_directory
                .get()
                .and_then(Weak::upgrade)
                .ok_or_else(|| io::Error::other("directory gone"))?;
            let upstream = dir
                .for_type::<dyn Endpoint>()
                .and_then(|endpoints| endpoints.get("loopback"))
                .map_err(io::Error::other)?;
            Ok::<_, io::Error>(Tunnel { upstream })
        })
        .provides::<dyn Transport>(|c| -> Arc<dyn Transport> { c })
        .provides::<dyn Endpoint>(|c| -> Arc<dyn Endpoint> { c })
        .build(),
    );
    table.register(
        ImplementationType::of::<Loopback>("net.Loopback")
            .provides::<dyn Endpoint>(|c| -> Arc<dyn Endpoint> { c })
            .build(),
    );

    let source = StaticSource::new()
        .with_block("org.acme.Transport", "tunnel=net.Tunnel")
        .with_block("org.acme.Endpoint", "tunnel=net.Tunnel\nloopback=net.Loopback");
    let dir = Arc::new(LoaderDirectory::new(source, table));
    directory.set(Arc::downgrade(&dir)).unwrap();

    let (tx, rx) = mpsc::channel();

    let transport_dir = Arc::clone(&dir);
    let transport_tx = tx.clone();
    thread::spawn(move || {
        let transport = transport_dir
            .for_type::<dyn Transport>()
            .and_then(|transports| transports.get("tunnel"))
            .map(|t| t.scheme());
        let _ = transport_tx.send(("transport", transport.is_ok()));
    });

    let endpoint_dir = Arc::clone(&dir);
    thread::spawn(move || {
        rendezvous.wait();
        let endpoint = endpoint_dir
            .for_type::<dyn Endpoint>()
            .and_then(|endpoints| endpoints.get("tunnel"))
            .map(|e| e.scheme());
        let _ = tx.send(("endpoint", endpoint.is_ok()));
    });

    for _ in 0..2 {
        let (who, ok) = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("lookups should finish without deadlocking");
        assert!(ok, "{who} lookup failed");
    }

    let endpoints = dir.for_type::<dyn Endpoint>().unwrap();
    let tunnel = endpoints.get("tunnel").unwrap();
    let transport = dir.for_type::<dyn Transport>().unwrap().get("tunnel").unwrap();
    assert_eq!(
        Arc::as_ptr(&tunnel) as *const (),
        Arc::as_ptr(&transport) as *const ()
    );
    assert_eq!(dir.instance_count(), 2);
}

#[test]
fn test_tunnel_keeps_its_upstream() {
    let tunnel = Tunnel {
        upstream: Arc::new(Loopback),
    };
    assert_eq!(Endpoint::scheme(&tunnel), "tunnel");
    assert_eq!(tunnel.upstream.scheme(), "loopback");
}
