use std::{
    str::from_utf8,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use serial_ledger::{Ledger, LedgerError, bin_utils::Service};

const OPERATIONS: &str = "\
op,account,target,amount
create,p1,A,100
create,p2,B,0
transfer,p1,B,150
create,p1,Z,5
alert,p2,,120
create,p3,C,200
balance,p3
transfer,p3,A,100
transfer,p2,A,0
transfer,p2,C,500
balance,ghost
";

#[test]
fn replay_operations() {
    let mut output = Vec::new();
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    let service = Service {
        input: OPERATIONS.as_bytes(),
        output: &mut output,
        settle: Duration::from_millis(200),
        error_printer: Box::new(move |line, err| {
            sink.lock().unwrap().push((line, err.to_string()));
        }),
    };
    service.run().unwrap();

    let lines: Vec<&str> = from_utf8(&output).unwrap().lines().collect();
    assert_eq!(
        lines,
        ["account,balance", "p1,50", "p2,150", "p3,100"]
    );

    let errors = errors.lock().unwrap();
    let failed_lines: Vec<u64> = errors.iter().map(|(line, _)| *line).collect();
    // duplicate create, zero amount, unknown balance, then the transfer that
    // never got funded
    assert_eq!(failed_lines, [5, 10, 12, 11]);
    assert_eq!(errors[3].1, "Gave up waiting for the reply");
}

#[test]
fn parked_withdrawal_waits_for_funds() {
    let ledger = Ledger::new().unwrap();
    ledger.create("p1", "A", 100).unwrap();
    ledger.create("p2", "B", 0).unwrap();

    thread::scope(|s| {
        let withdraw = s.spawn(|| ledger.transfer("p1", "B", 150));
        let empty = s.spawn(|| ledger.transfer("p2", "A", 10));

        ledger.create("p3", "C", 200).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(!withdraw.is_finished());
        assert!(!empty.is_finished());
        assert_eq!(ledger.balance_of("p1").unwrap(), 100);

        ledger.transfer("p3", "A", 100).unwrap();
        withdraw.join().unwrap().unwrap();
        empty.join().unwrap().unwrap();
    });

    assert_eq!(ledger.balance_of("p1").unwrap(), 60);
    assert_eq!(ledger.balance_of("p2").unwrap(), 140);
    assert_eq!(ledger.balance_of("p3").unwrap(), 100);
}

#[test]
fn alert_fires_once_balance_exceeds_threshold() {
    let ledger = Ledger::new().unwrap();
    ledger.create("p1", "A", 10).unwrap();
    ledger.create("p2", "B", 100).unwrap();

    // already above: returns straight away
    ledger.set_alert("p1", 9).unwrap();

    thread::scope(|s| {
        let alert = s.spawn(|| ledger.set_alert("p1", 10));
        thread::sleep(Duration::from_millis(50));
        assert!(!alert.is_finished());

        ledger.transfer("p2", "A", 1).unwrap();
        alert.join().unwrap().unwrap();
    });
}

#[test]
fn concurrent_transfers_conserve_funds() {
    let ledger = Ledger::new().unwrap();
    let accounts = [("p0", "A"), ("p1", "B"), ("p2", "C"), ("p3", "D")];
    for (private_id, public_id) in accounts {
        ledger.create(private_id, public_id, 1_000).unwrap();
    }

    // each account sends 10 to the next one 50 times; every transfer is
    // coverable so all callers return
    thread::scope(|s| {
        for (idx, (private_id, _)) in accounts.iter().enumerate() {
            let (_, next) = accounts[(idx + 1) % accounts.len()];
            let ledger = &ledger;
            s.spawn(move || {
                for _ in 0..50 {
                    ledger.transfer(private_id, next, 10).unwrap();
                    let balance = ledger.balance_of(private_id).unwrap();
                    assert!(balance >= 0);
                }
            });
        }
    });

    let total: i64 = accounts
        .iter()
        .map(|(private_id, _)| ledger.balance_of(private_id).unwrap())
        .sum();
    assert_eq!(total, 4_000);
    for (private_id, _) in accounts {
        assert_eq!(ledger.balance_of(private_id).unwrap(), 1_000);
    }
}

#[test]
fn invalid_calls_fail_without_blocking() {
    let ledger = Ledger::new().unwrap();
    ledger.create("p1", "A", 5).unwrap();
    ledger.create("p2", "B", 0).unwrap();

    assert!(matches!(
        ledger.transfer("p2", "A", 0),
        Err(LedgerError::InvalidArgument(_))
    ));
    assert!(matches!(
        ledger.create("p3", "A", 1),
        Err(LedgerError::InvalidArgument(_))
    ));
    assert!(matches!(
        ledger.create("p3", "C", -1),
        Err(LedgerError::InvalidArgument(_))
    ));
    assert!(matches!(
        ledger.transfer("p1", "nowhere", 1),
        Err(LedgerError::InvalidArgument(_))
    ));
    assert!(matches!(ledger.balance_of("p3"), Err(LedgerError::NotFound(_))));
    assert_eq!(ledger.balance_of("p1").unwrap(), 5);
}
