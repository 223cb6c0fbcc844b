//! Safety PDU CRC-16 engine
//!
//! Every 16 bit data word of a safety PDU is followed by a CRC over that word
//! and everything that authenticates it. The first CRC of a frame
//! ([`crc16_step`]) additionally covers the command byte, the connection ID
//! and the virtual sequence number, seeded with the rolling value carried
//! over from the previous frame in the conversation; each further CRC
//! ([`crc16_word`]) continues from its predecessor.
//!
//! The seed is not a constant. A Reset frame and the first Session frame of a
//! connection start from zero; every later frame is seeded with the first CRC
//! of the most recently observed frame in the authenticating direction. Since
//! the Session frames carry both endpoints' random session IDs, the whole
//! chain descends from both nonces and a frame recorded before a restart
//! cannot pass verification afterwards.
//!
//! The sequence number never appears on the wire. It only enters the CRC
//! input here, so a stale frame replayed by the black channel fails
//! verification against the advanced expected number.

use crc::{Crc, CRC_16_IBM_3740};

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// CRC over the first data word of a frame and the fields authenticating it
pub fn crc16_step(seed: u16, command: u8, connection_id: u16, seqno: u16, word: [u8; 2]) -> u16 {
    let mut digest = CRC16.digest_with_initial(seed);
    digest.update(&[command]);
    digest.update(&connection_id.to_le_bytes());
    digest.update(&seqno.to_le_bytes());
    digest.update(&word);
    digest.finalize()
}

/// CRC over a subsequent data word, seeded by the preceding CRC
pub fn crc16_word(seed: u16, word: [u8; 2]) -> u16 {
    let mut digest = CRC16.digest_with_initial(seed);
    digest.update(&word);
    digest.finalize()
}
