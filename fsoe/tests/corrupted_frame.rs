//! Corruption and replay on the black channel

mod common;

use common::{establish, link_pair, master_config, slave_config};
use fsoe::core::{ResetEvent, ResetInitiator, ResetReason, State};
use fsoe::{Master, Slave};

#[test]
fn test_corrupted_frame_detected_by_receiver() {
    let (master_link, slave_link, m2s, s2m) = link_pair();
    let mut master = Master::new(&master_config(), master_link).unwrap();
    let mut slave = Slave::new(&slave_config(), slave_link).unwrap();
    establish(&mut master, &mut slave);

    let outputs = [0u8; 2];
    let inputs = [0u8; 2];
    let mut master_inputs = [0u8; 2];
    let mut slave_outputs = [0u8; 2];

    // flip one bit of a CRC byte in the frame waiting for the master
    s2m.borrow_mut().frame.as_mut().unwrap()[3] ^= 0x04;

    let status = master.sync_with_slave(&outputs, &mut master_inputs).unwrap();
    assert_eq!(
        status.reset_event,
        Some(ResetEvent {
            initiator: ResetInitiator::ByMaster,
            reason: ResetReason::InvalidCrc,
        })
    );
    assert_eq!(master.state(), State::Reset);

    // the frame now on the wire is a Reset frame carrying the reason code
    let announced = m2s.borrow().frame.clone().unwrap();
    assert_eq!(announced[0], 0x2A);
    assert_eq!(announced[1], ResetReason::InvalidCrc.into_u8());

    // the slave observes the master's reset announcement with the same code
    let status = slave.sync_with_master(&inputs, &mut slave_outputs).unwrap();
    assert_eq!(
        status.reset_event,
        Some(ResetEvent {
            initiator: ResetInitiator::ByMaster,
            reason: ResetReason::InvalidCrc,
        })
    );
    assert_eq!(slave.state(), State::Reset);
}

#[test]
fn test_replayed_old_frame_rejected() {
    let (master_link, slave_link, _m2s, s2m) = link_pair();
    let mut master = Master::new(&master_config(), master_link).unwrap();
    let mut slave = Slave::new(&slave_config(), slave_link).unwrap();
    establish(&mut master, &mut slave);

    let outputs = [0u8; 2];
    let inputs = [0u8; 2];
    let mut master_inputs = [0u8; 2];
    let mut slave_outputs = [0u8; 2];

    // record a valid slave frame, then let the exchange move on
    let old_frame = s2m.borrow().frame.clone().unwrap();
    for _ in 0..2 {
        master.sync_with_slave(&outputs, &mut master_inputs).unwrap();
        slave.sync_with_master(&inputs, &mut slave_outputs).unwrap();
    }

    // an attacker (or a confused channel) replays the recorded frame
    s2m.borrow_mut().frame = Some(old_frame);
    let status = master.sync_with_slave(&outputs, &mut master_inputs).unwrap();
    assert_eq!(
        status.reset_event,
        Some(ResetEvent {
            initiator: ResetInitiator::ByMaster,
            reason: ResetReason::InvalidCrc,
        })
    );
}

#[test]
fn test_exact_redelivery_is_silence() {
    let (master_link, slave_link, _m2s, _s2m) = link_pair();
    let mut master = Master::new(&master_config(), master_link).unwrap();
    let mut slave = Slave::new(&slave_config(), slave_link).unwrap();
    establish(&mut master, &mut slave);

    let outputs = [0u8; 2];
    let mut master_inputs = [0u8; 2];

    // the slave is not scheduled, so its last frame stays in the channel and
    // is re-delivered on every cycle; the master must treat that as silence
    for _ in 0..3 {
        let status = master.sync_with_slave(&outputs, &mut master_inputs).unwrap();
        assert_eq!(status.reset_event, None);
        assert_eq!(status.state, State::Data);
    }
}
