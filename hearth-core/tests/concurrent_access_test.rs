//! Concurrent key store access tests
//!
//! The shell and the CLI may run at the same time against one keys directory,
//! and the core types may be shared across threads. These tests check that
//! mutations serialize and that readers never observe a half-written key.
//!
//! Run with: cargo test --test concurrent_access_test -- --nocapture
//! Run specific test: cargo test --test concurrent_access_test test_name -- --nocapture

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;
use tempfile::TempDir;

use hearth_core::adapters::FileKeyStore;
use hearth_core::domain::{Address, Argon2Params, SecretBytes};
use hearth_core::ports::KeyStore;
use hearth_core::services::{
    CredentialController, NoActivity, Plugin, PluginHandle, PluginHost, SettingsRegistry,
    ShellLog,
};
use hearth_core::Error;

/// Number of concurrent threads for stress tests.
/// Realistic contention is the shell plus one or two CLI invocations.
const THREAD_COUNT: usize = 6;

/// Number of iterations per thread
const ITERATIONS_PER_THREAD: usize = 4;

fn open_store(dir: &Path) -> FileKeyStore {
    FileKeyStore::with_params(dir, Argon2Params::light()).expect("Failed to open key store")
}

fn secret(seed: usize) -> SecretBytes {
    SecretBytes::new((0..32).map(|i| (seed * 7 + i) as u8).collect())
}

/// Test: several store instances (separate processes in practice) rotating
/// their own account's password on one keys directory at the same time.
#[test]
fn test_concurrent_store_instances_reencrypting() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().to_path_buf();

    let addresses: Vec<Address> = {
        let store = open_store(&dir);
        (0..THREAD_COUNT)
            .map(|t| {
                store
                    .insert(&format!("t{}", t), &secret(t), "pw-0", None)
                    .unwrap()
                    .address
            })
            .collect()
    };

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let error_count = Arc::new(AtomicUsize::new(0));
    let mut handles = vec![];

    for (thread_id, address) in addresses.iter().copied().enumerate() {
        let barrier = Arc::clone(&barrier);
        let error_count = Arc::clone(&error_count);
        let dir = dir.clone();

        handles.push(thread::spawn(move || {
            let store = open_store(&dir);
            barrier.wait();
            let start = Instant::now();

            for i in 0..ITERATIONS_PER_THREAD {
                let old = format!("pw-{}", i);
                let new = format!("pw-{}", i + 1);
                if let Err(e) = store.reencrypt(&address, &old, &new) {
                    eprintln!("Thread {}: reencrypt error at iteration {}: {}", thread_id, i, e);
                    error_count.fetch_add(1, Ordering::SeqCst);
                }
            }
            println!("Thread {}: done in {:?}", thread_id, start.elapsed());
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(error_count.load(Ordering::SeqCst), 0);

    let store = open_store(&dir);
    let final_password = format!("pw-{}", ITERATIONS_PER_THREAD);
    for (t, address) in addresses.iter().enumerate() {
        assert!(store.verify(address, &final_password).unwrap());
        assert_eq!(store.export_secret(address, &final_password).unwrap(), secret(t));
    }

    // Only key files and the lock file remain, no stray temp files
    let stray: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| name != ".lock" && !name.ends_with(".json"))
        .collect();
    assert!(stray.is_empty(), "unexpected files: {:?}", stray);
}

/// Test: every thread tries to rotate the same account away from the same
/// old password. Exactly one wins; the rest see WrongPassword; the stored key
/// opens with the winner's password only.
#[test]
fn test_racing_rotations_of_one_account() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().to_path_buf();
    let address = open_store(&dir)
        .insert("shared", &secret(99), "start", None)
        .unwrap()
        .address;

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let mut handles = vec![];

    for thread_id in 0..THREAD_COUNT {
        let barrier = Arc::clone(&barrier);
        let dir = dir.clone();
        handles.push(thread::spawn(move || {
            let store = open_store(&dir);
            barrier.wait();
            let result = store.reencrypt(&address, "start", &format!("winner-{}", thread_id));
            (thread_id, result)
        }));
    }

    let results: Vec<(usize, Result<(), Error>)> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners: Vec<usize> = results
        .iter()
        .filter(|(_, r)| r.is_ok())
        .map(|(t, _)| *t)
        .collect();
    assert_eq!(winners.len(), 1, "results: {:?}", results);
    for (_, result) in &results {
        if let Err(e) = result {
            assert!(matches!(e, Error::WrongPassword(_)), "unexpected error: {}", e);
        }
    }

    let store = open_store(&dir);
    assert!(store
        .verify(&address, &format!("winner-{}", winners[0]))
        .unwrap());
    assert!(!store.verify(&address, "start").unwrap());
}

/// Test: readers enumerating while writers rotate never miss an account.
#[test]
fn test_enumeration_during_rotation_sees_every_account() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(open_store(temp_dir.path()));
    let credentials = Arc::new(CredentialController::new(
        Arc::clone(&store) as Arc<dyn KeyStore>,
        Arc::new(NoActivity),
    ));

    let writers = THREAD_COUNT / 2;
    let addresses: Vec<Address> = (0..writers)
        .map(|t| {
            credentials
                .import_secret(&format!("w{}", t), &secret(t), "pw-0", None)
                .unwrap()
                .address
        })
        .collect();

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let short_reads = Arc::new(AtomicUsize::new(0));
    let mut handles = vec![];

    for (t, address) in addresses.iter().copied().enumerate() {
        let barrier = Arc::clone(&barrier);
        let credentials = Arc::clone(&credentials);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for i in 0..ITERATIONS_PER_THREAD {
                credentials
                    .reencrypt(&address, &format!("pw-{}", i), &format!("pw-{}", i + 1))
                    .unwrap_or_else(|e| panic!("writer {} failed: {}", t, e));
            }
        }));
    }

    for _ in writers..THREAD_COUNT {
        let barrier = Arc::clone(&barrier);
        let credentials = Arc::clone(&credentials);
        let short_reads = Arc::clone(&short_reads);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for _ in 0..ITERATIONS_PER_THREAD * 5 {
                let seen = credentials.accounts().unwrap().len();
                if seen != writers {
                    short_reads.fetch_add(1, Ordering::SeqCst);
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(short_reads.load(Ordering::SeqCst), 0);
}

struct Idle;

impl Plugin for Idle {
    fn name(&self) -> &str {
        "idle"
    }

    fn initialize(&mut self, _handle: PluginHandle) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Test: racing unloads of one plugin finalize it exactly once.
#[test]
fn test_racing_unloads_finalize_once() {
    let host = Arc::new(PluginHost::new(
        Arc::new(SettingsRegistry::new()),
        Arc::new(ShellLog::default()),
    ));
    host.load_boxed(Box::new(Idle)).unwrap();

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let mut handles = vec![];
    for _ in 0..THREAD_COUNT {
        let barrier = Arc::clone(&barrier);
        let host = Arc::clone(&host);
        handles.push(thread::spawn(move || {
            barrier.wait();
            host.unload("idle")
        }));
    }

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().all(|r| matches!(
        r,
        Ok(()) | Err(Error::NotFound(_)) | Err(Error::ResourceBusy(_))
    )));
    assert!(host.is_empty());
}
