//! End-to-end scenarios: a real device with its worker thread, clients
//! submitting through shared-memory rings.

use accel_core::{AccelError, ControlEntry, OutputEntry, SessionId, CAPACITY};
use accel_executor::{init_logging, Device, DeviceConfig, WorkerState};
use accel_core::handler::ReferenceHandler;

use std::sync::Arc;
use std::thread;

fn device() -> Device {
    init_logging();
    Device::start(DeviceConfig::default(), ReferenceHandler).unwrap()
}

fn commands(range: std::ops::Range<u32>) -> Vec<ControlEntry> {
    range.map(ControlEntry::with_command).collect()
}

#[test]
fn test_sample_usage() {
    let device = device();
    let mut acc = device.attach(SessionId::current()).unwrap();

    acc.submit(&[ControlEntry::new(3, [3, 3, 0, 0])]).unwrap();
    let outs = acc.wait_for_completion().unwrap();

    assert_eq!(outs, vec![OutputEntry::new(3, [8])]);
    acc.detach();
    assert_eq!(device.sessions(), 0);
}

#[test]
fn test_full_ring_round_trip() {
    let device = device();
    let mut acc = device.attach(SessionId::new(1)).unwrap();

    acc.submit(&commands(0..CAPACITY)).unwrap();
    assert_eq!(acc.remaining_slots(), 0);

    let outs = acc.wait_for_completion().unwrap();
    assert_eq!(outs.len(), CAPACITY as usize);
    for (i, out) in outs.iter().enumerate() {
        assert_eq!(out.command, i as u32);
        assert_eq!(out.outputs[0], 5 + i as u64);
    }
    assert_eq!(acc.remaining_slots(), CAPACITY);
}

#[test]
fn test_seventeenth_entry_rejected() {
    let device = device();
    let mut acc = device.attach(SessionId::new(1)).unwrap();

    acc.submit(&commands(0..CAPACITY)).unwrap();
    let err = acc.submit_one(&ControlEntry::with_command(16)).unwrap_err();
    assert!(matches!(
        err,
        AccelError::CapacityExceeded {
            requested: 1,
            available: 0
        }
    ));
    assert_eq!(
        err.to_string(),
        "at most 0 commands can be enqueued - wait for some completion before enqueuing new commands"
    );
    assert_eq!(acc.submit_counter(), CAPACITY);

    // Retrieving frees the ring again.
    assert_eq!(acc.wait_for_completion().unwrap().len(), CAPACITY as usize);
    acc.submit_one(&ControlEntry::with_command(16)).unwrap();
    assert_eq!(acc.wait_for_completion().unwrap()[0].outputs[0], 21);
}

#[test]
fn test_partial_retrieval_keeps_order() {
    let device = device();
    let mut acc = device.attach(SessionId::new(1)).unwrap();

    acc.submit(&commands(0..10)).unwrap();
    let mut first = [OutputEntry::default(); 4];
    assert_eq!(acc.wait_for_completion_into(&mut first).unwrap(), 4);
    assert_eq!(acc.remaining_slots(), CAPACITY - 6);

    acc.submit(&commands(10..20)).unwrap();
    let rest = acc.wait_for_completion().unwrap();

    let seen: Vec<u32> = first.iter().chain(rest.iter()).map(|o| o.command).collect();
    assert_eq!(seen, (0..20).collect::<Vec<_>>());
}

#[test]
fn test_two_sessions_isolated() {
    let device = device();
    let mut a = device.attach(SessionId::new(1)).unwrap();
    let mut b = device.attach(SessionId::new(2)).unwrap();

    a.submit(&commands(0..3)).unwrap();
    b.submit(&commands(100..103)).unwrap();

    let out_a: Vec<_> = a.wait_for_completion().unwrap().iter().map(|o| o.outputs[0]).collect();
    let out_b: Vec<_> = b.wait_for_completion().unwrap().iter().map(|o| o.outputs[0]).collect();
    assert_eq!(out_a, vec![5, 6, 7]);
    assert_eq!(out_b, vec![105, 106, 107]);
}

#[test]
fn test_sessions_on_separate_threads() {
    let device = Arc::new(device());

    let clients: Vec<_> = (0..4u32)
        .map(|t| {
            let device = Arc::clone(&device);
            thread::spawn(move || {
                let mut acc = device.attach(SessionId::new(10 + t)).unwrap();
                let mut results = Vec::new();
                for round in 0..20u32 {
                    let base = t * 1000 + round * 8;
                    acc.submit(&commands(base..base + 8)).unwrap();
                    results.extend(acc.wait_for_completion().unwrap());
                }
                (t, results)
            })
        })
        .collect();

    for handle in clients {
        let (t, results) = handle.join().unwrap();
        assert_eq!(results.len(), 160);
        for (i, out) in results.iter().enumerate() {
            let expected = t * 1000 + i as u32;
            assert_eq!(out.command, expected);
            assert_eq!(out.outputs[0], 5 + expected as u64);
        }
    }
    assert_eq!(device.stats().entries, 4 * 160);
}

#[test]
fn test_duplicate_attach_rejected() {
    let device = device();
    let _acc = device.attach(SessionId::new(7)).unwrap();
    let err = device.attach(SessionId::new(7)).unwrap_err();
    assert_eq!(err.to_string(), "attach failed: pid 7 already attached");
    assert_eq!(device.sessions(), 1);
}

#[test]
fn test_custom_handler() {
    init_logging();
    let handler = |c: &ControlEntry| OutputEntry::new(c.command, [c.params.iter().sum()]);
    let device = Device::start(DeviceConfig::new().worker_name("accel-sum"), handler).unwrap();
    let mut acc = device.attach(SessionId::new(1)).unwrap();

    acc.submit(&[ControlEntry::new(1, [1, 2, 3, 4]), ControlEntry::new(2, [10, 0, 0, 0])])
        .unwrap();
    let sums: Vec<_> = acc.wait_for_completion().unwrap().iter().map(|o| o.outputs[0]).collect();
    assert_eq!(sums, vec![10, 10]);
}

#[test]
fn test_shutdown_drains_and_stops() {
    let device = device();
    let mut acc = device.attach(SessionId::new(1)).unwrap();
    acc.submit(&commands(0..5)).unwrap();
    device.shutdown();

    assert_eq!(device.worker_state(), WorkerState::Stopped);
    // Either a regular pass or the final pass completed them.
    assert_eq!(acc.ready(), 5);
    assert_eq!(acc.wait_for_completion().unwrap().len(), 5);
}
