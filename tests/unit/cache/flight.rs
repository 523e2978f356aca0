use super::*;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Barrier, mpsc};
use std::thread;
use std::time::Duration;

#[test]
fn single_caller_leads() {
    let gate = FlightGate::new();
    assert_eq!(gate.run("a", || 7), Flown::Led(7));
    assert_eq!(gate.in_flight(), 0);
}

#[test]
fn concurrent_callers_on_one_key_run_once() {
    let gate = Arc::new(FlightGate::new());
    let runs = Arc::new(AtomicUsize::new(0));
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let leader = {
        let gate = Arc::clone(&gate);
        let runs = Arc::clone(&runs);
        thread::spawn(move || {
            gate.run("k", || {
                runs.fetch_add(1, Ordering::SeqCst);
                started_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            })
        })
    };
    started_rx.recv().unwrap();
    assert_eq!(gate.in_flight(), 1);

    let followers: Vec<_> = (0..4)
        .map(|_| {
            let gate = Arc::clone(&gate);
            let runs = Arc::clone(&runs);
            thread::spawn(move || {
                gate.run("k", || {
                    runs.fetch_add(1, Ordering::SeqCst);
                })
            })
        })
        .collect();

    // Give followers time to park on the flight.
    thread::sleep(Duration::from_millis(50));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    release_tx.send(()).unwrap();

    assert_eq!(leader.join().unwrap(), Flown::Led(()));
    for f in followers {
        f.join().unwrap();
    }
    assert_eq!(gate.in_flight(), 0);
}

#[test]
fn distinct_keys_do_not_block_each_other() {
    let gate = Arc::new(FlightGate::new());
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = ["x", "y"]
        .into_iter()
        .map(|key| {
            let gate = Arc::clone(&gate);
            let barrier = Arc::clone(&barrier);
            // Both closures must be running at once for the barrier to release.
            thread::spawn(move || gate.run(key, || barrier.wait().is_leader()))
        })
        .collect();

    let leaders = handles
        .into_iter()
        .map(|h| match h.join().unwrap() {
            Flown::Led(is_leader) => is_leader,
            Flown::Joined => panic!("distinct keys must not join"),
        })
        .filter(|l| *l)
        .count();
    assert_eq!(leaders, 1);
}

#[test]
fn panicking_leader_still_releases_followers() {
    let gate = Arc::new(FlightGate::new());
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let leader = {
        let gate = Arc::clone(&gate);
        thread::spawn(move || {
            gate.run("p", || {
                started_tx.send(()).unwrap();
                release_rx.recv().unwrap();
                panic!("leader failed");
            })
        })
    };
    started_rx.recv().unwrap();

    let follower = {
        let gate = Arc::clone(&gate);
        thread::spawn(move || gate.run("p", || 1))
    };
    thread::sleep(Duration::from_millis(20));
    release_tx.send(()).unwrap();

    assert!(leader.join().is_err());
    let outcome = follower.join().unwrap();
    assert!(matches!(outcome, Flown::Joined | Flown::Led(1)));
    assert_eq!(gate.in_flight(), 0);
    assert_eq!(gate.run("p", || 2), Flown::Led(2));
}
