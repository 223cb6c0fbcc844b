//! Connection refusal by the slave-side parameter verification

mod common;

use common::{link_pair, master_config, slave_config, TestLink, TestSlaveLink};
use fsoe::core::{ParameterVerdict, ResetEvent, ResetInitiator, ResetReason, State};
use fsoe::{Master, Slave};

fn run_refusal(verdict: ParameterVerdict, expected: ResetReason) {
    let (master_link, mut slave_link, _m2s, _s2m) = link_pair();
    slave_link.verdict = verdict;

    let mut master: Master<TestLink> = Master::new(&master_config(), master_link).unwrap();
    let mut slave: Slave<TestSlaveLink> = Slave::new(&slave_config(), slave_link).unwrap();

    let outputs = [0u8; 2];
    let inputs = [0u8; 2];
    let mut master_inputs = [0u8; 2];
    let mut slave_outputs = [0u8; 2];

    let refusal = Some(ResetEvent {
        initiator: ResetInitiator::BySlave,
        reason: expected,
    });
    let mut slave_refused = false;
    let mut master_observed = false;
    for _ in 0..20 {
        let master_status = master.sync_with_slave(&outputs, &mut master_inputs).unwrap();
        if master_status.reset_event == refusal {
            master_observed = true;
        }
        let slave_status = slave.sync_with_master(&inputs, &mut slave_outputs).unwrap();
        if slave_status.reset_event == refusal {
            slave_refused = true;
        }
        assert_ne!(master.state(), State::Data);
        assert_ne!(slave.state(), State::Data);
    }
    assert!(slave_refused);
    assert!(master_observed);
}

#[test]
fn test_device_specific_parameter_error() {
    run_refusal(ParameterVerdict::Device(0x80), ResetReason::Device(0x80));
}

#[test]
fn test_bad_timeout_refusal() {
    run_refusal(ParameterVerdict::BadTimeout, ResetReason::InvalidCommParameter);
}

#[test]
fn test_bad_application_parameter_refusal() {
    run_refusal(
        ParameterVerdict::BadApplicationParameter,
        ResetReason::InvalidUserParameter,
    );
}
