//! Process data / fail-safe data alternation in Data state

mod common;

use common::{establish, link_pair, master_config, slave_config};
use fsoe::core::{Command, State};
use fsoe::{Master, Slave};

#[test]
fn test_toggling_process_data_enable() {
    let (master_link, slave_link, m2s, _s2m) = link_pair();
    let mut master = Master::new(&master_config(), master_link).unwrap();
    let mut slave = Slave::new(&slave_config(), slave_link).unwrap();
    establish(&mut master, &mut slave);

    let outputs = [0xAB, 0xCD];
    let inputs = [0x12, 0x21];
    let mut master_inputs = [0u8; 2];
    let mut slave_outputs = [0u8; 2];

    slave.enable_sending_process_data();

    // toggle the master's enable flag every 5 cycles; the transmitted command
    // must follow and nothing may reset
    for round in 0..4 {
        let enabled = round % 2 == 0;
        if enabled {
            master.enable_sending_process_data();
        } else {
            master.disable_sending_process_data();
        }
        assert_eq!(master.is_sending_process_data_enabled(), enabled);

        for cycle in 0..5 {
            let master_status = master.sync_with_slave(&outputs, &mut master_inputs).unwrap();
            assert_eq!(master_status.reset_event, None);
            assert_eq!(master_status.state, State::Data);

            let sent_frame = m2s.borrow().frame.clone().unwrap();
            let expected = if enabled {
                Command::ProcessData
            } else {
                Command::FailSafeData
            };
            assert_eq!(sent_frame[0], expected.into_u8());
            if !enabled {
                // fail-safe frames carry an all-zero payload
                assert_eq!(&sent_frame[1..3], &[0, 0]);
            }

            let slave_status = slave.sync_with_master(&inputs, &mut slave_outputs).unwrap();
            assert_eq!(slave_status.reset_event, None);
            assert_eq!(slave_status.state, State::Data);
            assert_eq!(slave_status.is_process_data_received, enabled);
            if enabled {
                assert_eq!(slave_outputs, outputs);
            } else {
                assert_eq!(slave_outputs, [0, 0]);
            }

            // the slave keeps sending its process data regardless: after one
            // full round trip the master sees it
            if round > 0 || cycle > 0 {
                assert!(master_status.is_process_data_received);
                assert_eq!(master_inputs, inputs);
            }
        }
    }
}
