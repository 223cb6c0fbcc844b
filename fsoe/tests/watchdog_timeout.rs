//! Watchdog expiry on a silent peer, and subsequent re-establishment

mod common;

use common::{establish, link_pair, master_config, slave_config};
use embassy_time::{Duration, MockDriver};
use fsoe::core::{ResetEvent, ResetInitiator, ResetReason, State};
use fsoe::{Master, Slave};

// One test function: the mock clock is process-global.
#[test]
fn test_watchdog_timeout() {
    let (master_link, slave_link, _m2s, _s2m) = link_pair();
    let mut master = Master::new(&master_config(), master_link).unwrap();
    let mut slave = Slave::new(&slave_config(), slave_link).unwrap();
    establish(&mut master, &mut slave);

    let outputs = [0u8; 2];
    let inputs = [0u8; 2];
    let mut master_inputs = [0u8; 2];
    let mut slave_outputs = [0u8; 2];

    // the slave stops being scheduled; twice the watchdog timeout passes
    MockDriver::get().advance(Duration::from_millis(200));

    let status = master.sync_with_slave(&outputs, &mut master_inputs).unwrap();
    assert_eq!(
        status.reset_event,
        Some(ResetEvent {
            initiator: ResetInitiator::ByMaster,
            reason: ResetReason::WatchdogExpired,
        })
    );
    assert_eq!(status.state, State::Reset);
    assert!(!status.is_process_data_received);
    assert_eq!(master.state(), State::Reset);

    // the suspended slave notices its own watchdog when scheduled again
    let status = slave.sync_with_master(&inputs, &mut slave_outputs).unwrap();
    assert_eq!(
        status.reset_event,
        Some(ResetEvent {
            initiator: ResetInitiator::BySlave,
            reason: ResetReason::WatchdogExpired,
        })
    );

    // both endpoints recover on their own
    let mut reached_data = false;
    for _ in 0..20 {
        master.sync_with_slave(&outputs, &mut master_inputs).unwrap();
        slave.sync_with_master(&inputs, &mut slave_outputs).unwrap();
        if master.state() == State::Data && slave.state() == State::Data {
            reached_data = true;
            break;
        }
    }
    assert!(reached_data);
}
