//! Integration tests for sliding-window admission.
//!
//! Time is injected through `admit_at`, so nothing here sleeps.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use socialnet_node::admission::{AdmissionConfig, AdmissionController, Decision};
use socialnet_types::{ClientKey, Result};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn controller() -> AdmissionController {
    AdmissionController::new(AdmissionConfig::default())
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

// ===========================================================================
// Scenarios
// ===========================================================================

#[test]
fn limit_two_per_minute_scenario() -> Result<()> {
    let limiter = controller();
    let key = ClientKey::from("203.0.113.7");
    let base = Instant::now();
    let window = secs(60);

    let outcomes: Vec<bool> = [0, 10, 20, 61]
        .into_iter()
        .map(|t| {
            limiter
                .admit_at(&key, 2, window, base + secs(t))
                .map(|d| d.is_allowed())
        })
        .collect::<Result<_>>()?;

    assert_eq!(outcomes, vec![true, true, false, true]);
    Ok(())
}

#[test]
fn retry_after_points_at_oldest_expiry() -> Result<()> {
    let limiter = controller();
    let key = ClientKey::from("203.0.113.7");
    let base = Instant::now();

    limiter.admit_at(&key, 2, secs(60), base)?;
    limiter.admit_at(&key, 2, secs(60), base + secs(10))?;
    let denied = limiter.admit_at(&key, 2, secs(60), base + secs(20))?;
    assert_eq!(
        denied,
        Decision::RateLimited {
            retry_after: secs(40)
        }
    );
    Ok(())
}

// ===========================================================================
// Properties
// ===========================================================================

#[test]
fn trailing_window_never_exceeds_limit() -> Result<()> {
    let limiter = controller();
    let key = ClientKey::from("198.51.100.1");
    let base = Instant::now();
    let limit = 5u32;
    let window = secs(30);

    // Irregular arrival pattern over ten minutes.
    let mut admitted = Vec::new();
    let mut t = 0u64;
    for step in 0..400u64 {
        t += (step * 7 + 3) % 5;
        let now = base + secs(t);
        if limiter.admit_at(&key, limit, window, now)?.is_allowed() {
            admitted.push(t);
        }
    }
    assert!(!admitted.is_empty());

    for (i, start) in admitted.iter().enumerate() {
        let in_window = admitted[i..]
            .iter()
            .take_while(|t| **t < start + window.as_secs())
            .count();
        assert!(
            in_window <= limit as usize,
            "{in_window} admissions within {window:?} starting at {start}"
        );
    }
    Ok(())
}

#[test]
fn concurrent_callers_share_one_budget() {
    let limiter = Arc::new(AdmissionController::new(AdmissionConfig {
        limit: 25,
        ..AdmissionConfig::default()
    }));
    let allowed = Arc::new(AtomicUsize::new(0));
    let key = ClientKey::from("192.0.2.10");

    thread::scope(|scope| {
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            let allowed = Arc::clone(&allowed);
            let key = key.clone();
            scope.spawn(move || {
                for _ in 0..20 {
                    if limiter.check(&key).is_ok() {
                        allowed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    assert_eq!(allowed.load(Ordering::Relaxed), 25);
}

#[test]
fn eviction_never_resets_a_live_budget() -> Result<()> {
    // Tiny table and short idle TTL, but the caller asks for a long window.
    let limiter = AdmissionController::new(AdmissionConfig {
        limit: 3,
        window: secs(10),
        idle_ttl: secs(10),
        sweep_interval: secs(5),
        max_clients: 4,
    });
    let victim = ClientKey::from("203.0.113.7");
    let base = Instant::now();
    let limit = 3u32;
    let window = secs(300);

    let mut admitted = Vec::new();
    for t in 0..900u64 {
        let now = base + secs(t);
        // Fresh keys keep the table at its cap.
        let churn = ClientKey::from(format!("churn-{t}").as_str());
        limiter.admit_at(&churn, 1, secs(1), now)?;

        if t % 20 == 0 && limiter.admit_at(&victim, limit, window, now)?.is_allowed() {
            admitted.push(t);
        }
    }

    for (i, start) in admitted.iter().enumerate() {
        let in_window = admitted[i..]
            .iter()
            .take_while(|t| **t < start + window.as_secs())
            .count();
        assert!(
            in_window <= limit as usize,
            "{in_window} admissions within {window:?} starting at {start}"
        );
    }
    assert_eq!(admitted.len(), 9);
    Ok(())
}

#[test]
fn distinct_clients_do_not_interfere() -> Result<()> {
    let limiter = controller();
    let base = Instant::now();

    for n in 0..50u8 {
        let key = ClientKey::from(format!("10.0.0.{n}").as_str());
        assert!(limiter.admit_at(&key, 1, secs(60), base)?.is_allowed());
        assert!(!limiter.admit_at(&key, 1, secs(60), base)?.is_allowed());
    }
    assert_eq!(limiter.tracked_clients(), 50);
    Ok(())
}
