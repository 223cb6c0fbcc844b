//! SRA CRC over application parameters [ETG.5120]
//!
//! An optional CRC-32 an application may compute over its parameter set and
//! prepend to it. The protocol core treats the result as part of the opaque
//! application parameter blob; it is never mixed into the safety PDU CRCs.

use crc::{Algorithm, Crc};

// The ETG.5120 polynomial, bit-forward with no init or final xor, so that a
// running value can be fed back in to extend the checksum over further data.
const SRA_ALGORITHM: Algorithm<u32> = Algorithm {
    width: 32,
    poly: 0xF4AC_FB13,
    init: 0x0000_0000,
    refin: false,
    refout: false,
    xorout: 0x0000_0000,
    check: 0x0000_0000,
    residue: 0x0000_0000,
};

const SRA_CRC: Crc<u32> = Crc::<u32>::new(&SRA_ALGORITHM);

/// Extends a running SRA CRC over `data`.
///
/// Start from 0 and chain calls for parameter sets assembled in pieces;
/// feeding the parts one by one equals checksumming the concatenation.
pub fn update_sra_crc(crc: u32, data: &[u8]) -> u32 {
    let mut digest = SRA_CRC.digest_with_initial(crc);
    digest.update(data);
    digest.finalize()
}
