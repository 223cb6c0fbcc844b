#![allow(dead_code)]

//! In-memory black channel and endpoint fixtures shared by the scenario tests
//!
//! Each direction of the channel is a single frame slot, modelling an
//! EtherCAT process data image: sending overwrites the slot, receiving
//! re-delivers whatever the slot currently holds. Tests reach into the slots
//! through the shared handles to corrupt or replay frames.

use std::cell::RefCell;
use std::rc::Rc;

use fsoe::core::{ConnectionId, DataSize, ParameterVerdict, SlaveAddress, State};
use fsoe::link::{Link, SlaveLink};
use fsoe::{Master, MasterConfig, Slave, SlaveConfig};

#[derive(Default)]
pub struct Wire {
    pub frame: Option<Vec<u8>>,
}

pub type SharedWire = Rc<RefCell<Wire>>;

pub struct TestLink {
    tx: SharedWire,
    rx: SharedWire,
    next_session_id: u16,
}

impl Link for TestLink {
    fn send(&mut self, frame: &[u8]) {
        self.tx.borrow_mut().frame = Some(frame.to_vec());
    }

    fn recv(&mut self, frame: &mut [u8]) -> usize {
        match &self.rx.borrow().frame {
            Some(bytes) if bytes.len() == frame.len() => {
                frame.copy_from_slice(bytes);
                frame.len()
            }
            _ => 0,
        }
    }

    fn generate_session_id(&mut self) -> u16 {
        // arbitrary but distinct per connection attempt
        self.next_session_id = self.next_session_id.wrapping_mul(31).wrapping_add(0x5FD3);
        self.next_session_id
    }
}

pub struct TestSlaveLink {
    inner: TestLink,
    pub verdict: ParameterVerdict,
}

impl Link for TestSlaveLink {
    fn send(&mut self, frame: &[u8]) {
        self.inner.send(frame)
    }

    fn recv(&mut self, frame: &mut [u8]) -> usize {
        self.inner.recv(frame)
    }

    fn generate_session_id(&mut self) -> u16 {
        self.inner.generate_session_id()
    }
}

impl SlaveLink for TestSlaveLink {
    fn verify_parameters(&mut self, _watchdog_timeout_ms: u16, _app_parameters: &[u8])
        -> ParameterVerdict {
        self.verdict
    }
}

/// Two crossed links plus handles on both wire directions
/// (master-to-slave, slave-to-master).
pub fn link_pair() -> (TestLink, TestSlaveLink, SharedWire, SharedWire) {
    let m2s: SharedWire = Default::default();
    let s2m: SharedWire = Default::default();
    let master_link = TestLink {
        tx: m2s.clone(),
        rx: s2m.clone(),
        next_session_id: 7,
    };
    let slave_link = TestSlaveLink {
        inner: TestLink {
            tx: s2m.clone(),
            rx: m2s.clone(),
            next_session_id: 1931,
        },
        verdict: ParameterVerdict::Ok,
    };
    (master_link, slave_link, m2s, s2m)
}

pub fn master_config() -> MasterConfig<'static> {
    MasterConfig {
        slave_address: SlaveAddress::new(0x0304),
        connection_id: ConnectionId::new(8).unwrap(),
        watchdog_timeout_ms: 100,
        application_parameters: &[],
        outputs_size: DataSize::new(2).unwrap(),
        inputs_size: DataSize::new(2).unwrap(),
    }
}

pub fn slave_config() -> SlaveConfig {
    SlaveConfig {
        slave_address: SlaveAddress::new(0x0304),
        application_parameters_size: 0,
        inputs_size: DataSize::new(2).unwrap(),
        outputs_size: DataSize::new(2).unwrap(),
    }
}

/// Drives both endpoints in alternation until both reach Data state,
/// asserting that no reset happens on the way.
pub fn establish(master: &mut Master<TestLink>, slave: &mut Slave<TestSlaveLink>) {
    let outputs = [0u8; 2];
    let inputs = [0u8; 2];
    let mut master_inputs = [0u8; 2];
    let mut slave_outputs = [0u8; 2];
    for _ in 0..20 {
        let master_status = master.sync_with_slave(&outputs, &mut master_inputs).unwrap();
        assert_eq!(master_status.reset_event, None);
        let slave_status = slave.sync_with_master(&inputs, &mut slave_outputs).unwrap();
        assert_eq!(slave_status.reset_event, None);
    }
    assert_eq!(master.state(), State::Data);
    assert_eq!(slave.state(), State::Data);
}
