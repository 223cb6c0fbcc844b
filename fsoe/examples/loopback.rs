//! A master and a slave joined by an in-memory black channel.
//!
//! Walks through connection establishment, enables process data on both
//! sides and exchanges a few values, mimicking what a real integration does
//! against an EtherCAT process data image.
//!
//! Run with `cargo run --example loopback`.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use embassy_time::{Duration, MockDriver};
use fsoe::core::{ConnectionId, DataSize, ParameterVerdict, SlaveAddress, State};
use fsoe::link::{Link, SlaveLink};
use fsoe::{Master, MasterConfig, Slave, SlaveConfig};

/// One direction of the black channel: a frame slot that behaves like a
/// region of EtherCAT process data: writing overwrites it, reading
/// re-delivers whatever it currently holds.
type Wire = Rc<RefCell<Option<Vec<u8>>>>;

struct MemoryLink {
    tx: Wire,
    rx: Wire,
}

impl Link for MemoryLink {
    fn send(&mut self, frame: &[u8]) {
        *self.tx.borrow_mut() = Some(frame.to_vec());
    }

    fn recv(&mut self, frame: &mut [u8]) -> usize {
        match &*self.rx.borrow() {
            Some(bytes) if bytes.len() == frame.len() => {
                frame.copy_from_slice(bytes);
                frame.len()
            }
            _ => 0,
        }
    }

    fn generate_session_id(&mut self) -> u16 {
        // a real device must use an entropy source that survives power
        // cycles; the system clock is good enough for a demo
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before epoch")
            .subsec_nanos();
        (nanos ^ (nanos >> 16)) as u16
    }
}

impl SlaveLink for MemoryLink {
    fn verify_parameters(&mut self, watchdog_timeout_ms: u16, app_parameters: &[u8])
        -> ParameterVerdict {
        println!(
            "slave: verifying parameters (watchdog {watchdog_timeout_ms} ms, {} application bytes)",
            app_parameters.len()
        );
        ParameterVerdict::Ok
    }
}

fn main() {
    let master_to_slave: Wire = Default::default();
    let slave_to_master: Wire = Default::default();

    let mut master = Master::new(
        &MasterConfig {
            slave_address: SlaveAddress::new(0x0304),
            connection_id: ConnectionId::new(8).expect("nonzero"),
            watchdog_timeout_ms: 100,
            application_parameters: &[0x01, 0x00, 0x02, 0x00],
            outputs_size: DataSize::new(2).expect("valid size"),
            inputs_size: DataSize::new(2).expect("valid size"),
        },
        MemoryLink {
            tx: master_to_slave.clone(),
            rx: slave_to_master.clone(),
        },
    )
    .expect("valid master configuration");

    let mut slave = Slave::new(
        &SlaveConfig {
            slave_address: SlaveAddress::new(0x0304),
            application_parameters_size: 4,
            inputs_size: DataSize::new(2).expect("valid size"),
            outputs_size: DataSize::new(2).expect("valid size"),
        },
        MemoryLink {
            tx: slave_to_master,
            rx: master_to_slave,
        },
    )
    .expect("valid slave configuration");

    let outputs = [0xAB, 0xCD];
    let inputs = [0x12, 0x34];
    let mut master_inputs = [0u8; 2];
    let mut slave_outputs = [0u8; 2];

    let mut states = (State::Reset, State::Reset);
    for tick in 0..100 {
        // a 10 ms cycle, well within the 100 ms watchdog
        MockDriver::get().advance(Duration::from_millis(10));

        let master_status = master
            .sync_with_slave(&outputs, &mut master_inputs)
            .expect("buffer sizes match the configuration");
        let slave_status = slave
            .sync_with_master(&inputs, &mut slave_outputs)
            .expect("buffer sizes match the configuration");

        if let Some(event) = master_status.reset_event.or(slave_status.reset_event) {
            println!("tick {tick:2}: connection reset: {event:?}");
        }
        if states != (master_status.state, slave_status.state) {
            states = (master_status.state, slave_status.state);
            println!(
                "tick {tick:2}: master {:?}, slave {:?}",
                states.0, states.1
            );
        }

        if master_status.state == State::Data && slave_status.state == State::Data {
            if !master.is_sending_process_data_enabled() {
                println!("tick {tick:2}: connection up, enabling process data");
                master.enable_sending_process_data();
                slave.enable_sending_process_data();
            } else if master_status.is_process_data_received
                && slave_status.is_process_data_received
            {
                println!("tick {tick:2}: master received {master_inputs:02X?}");
                println!("tick {tick:2}: slave received {slave_outputs:02X?}");
                break;
            }
        }
    }
}
