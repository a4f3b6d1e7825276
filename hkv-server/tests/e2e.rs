//! End-to-end scenarios driven over a real TCP loopback connection,
//! through the actual accept loop in `hkv_server::server::serve`, using
//! `hkv-client` exactly as a real caller would.

use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use hkv_client::{ClientConfig, KVClient};
use hkv_engine::Cache;

fn spawn_server(capacity_bytes: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();
    let cache = Cache::new(capacity_bytes);
    thread::spawn(move || {
        let _ = hkv_server::server::serve(listener, cache);
    });
    addr
}

fn client_for(addr: &str) -> KVClient {
    KVClient::with_config(ClientConfig {
        addr: addr.to_string(),
        max_idle: 2,
        max_total: 4,
        read_timeout: Some(Duration::from_secs(2)),
        write_timeout: Some(Duration::from_secs(2)),
        connect_timeout: Some(Duration::from_secs(2)),
    })
    .expect("client")
}

#[test]
fn round_trip_over_real_socket() {
    let addr = spawn_server(1024);
    let client = client_for(&addr);

    client.set("greeting", b"hello").expect("set");
    assert_eq!(client.get("greeting").expect("get"), Some(b"hello".to_vec()));
    assert!(client.delete("greeting").expect("delete"));
    assert_eq!(client.get("greeting").expect("get"), None);
}

#[test]
fn expiry_over_real_socket() {
    let addr = spawn_server(1024);
    let client = client_for(&addr);

    client
        .set_with_ttl("k", b"x", Duration::from_millis(50))
        .expect("set with ttl");
    assert_eq!(client.get("k").expect("get"), Some(b"x".to_vec()));
    thread::sleep(Duration::from_millis(120));
    assert_eq!(client.get("k").expect("get"), None);

    let stats_json = client.stats().expect("stats");
    assert!(stats_json.contains("\"expired\""));
}

#[test]
fn lru_eviction_with_promotion_over_real_socket() {
    let addr = spawn_server(16);
    let client = client_for(&addr);

    client.set("a", b"x").expect("set a");
    client.set("b", b"x").expect("set b");
    assert_eq!(client.get("a").expect("get a"), Some(b"x".to_vec()));
    client.set("c", b"xxxxxxxxxxxx").expect("set c");

    assert_eq!(client.get("b").expect("get b"), None);
    assert_eq!(client.get("a").expect("get a"), Some(b"x".to_vec()));
    assert_eq!(client.get("c").expect("get c"), Some(b"xxxxxxxxxxxx".to_vec()));
}

#[test]
fn many_clients_hit_disjoint_key_families() {
    let addr = spawn_server(1024 * 1024);
    let families = 4;
    let per_family = 50;

    let handles: Vec<_> = (0..families)
        .map(|family| {
            let addr = addr.clone();
            thread::spawn(move || {
                let client = client_for(&addr);
                for i in 0..per_family {
                    let key = format!("family{family}-key{i}");
                    client.set(&key, b"v").expect("set");
                }
                for i in 0..per_family {
                    let key = format!("family{family}-key{i}");
                    assert_eq!(client.get(&key).expect("get"), Some(b"v".to_vec()));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("client thread panicked");
    }

    let client = client_for(&addr);
    let stats_json = client.stats().expect("stats");
    assert!(stats_json.contains(&format!("\"sets\":{}", families * per_family)));
}
