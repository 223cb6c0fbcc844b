//! Stack side of the black channel
//!
//! Owns the frame buffers of one endpoint and hides the transport's permitted
//! misbehaviour: a link re-delivering the previous frame looks like silence,
//! and short reads look like no frame at all. Everything else (corruption,
//! reordering, cross-connection replay) is left for the CRC and sequence
//! checks in the state machines, which are the components that know the
//! expected chain values.

use crate::core::DataSize;
use fsoe_driver::frame::Pdu;
use fsoe_driver::link::Link;

pub(crate) struct Channel<L> {
    link: L,
    received_frame: Pdu,
    last_received_frame: Pdu,
    sent_frame: Pdu,
}

impl<L: Link> Channel<L> {
    pub fn new(link: L, send_size: DataSize, recv_size: DataSize) -> Self {
        Self {
            link,
            received_frame: Pdu::for_data_size(recv_size),
            last_received_frame: Pdu::for_data_size(recv_size),
            sent_frame: Pdu::for_data_size(send_size),
        }
    }

    /// The frame under construction for the next transmission
    pub fn sent_frame_mut(&mut self) -> &mut Pdu {
        &mut self.sent_frame
    }

    /// Hands the prepared frame to the black channel.
    pub fn transmit(&mut self) {
        self.link.send(&self.sent_frame);
    }

    /// Polls the black channel. Returns true when a frame arrived that was
    /// not seen before; it is then available through [`Self::received_frame`].
    pub fn poll(&mut self) -> bool {
        let filled = self.link.recv(&mut self.received_frame[..]);
        if filled != self.received_frame.length() {
            return false;
        }
        debug_assert!(self.received_frame.sentinel_intact());
        if self.received_frame[..] == self.last_received_frame[..] {
            // the link re-delivered the previous frame
            return false;
        }
        self.last_received_frame.copy_from(&self.received_frame);
        true
    }

    /// The most recently accepted frame
    pub fn received_frame(&self) -> &Pdu {
        &self.last_received_frame
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn generate_session_id(&mut self) -> u16 {
        self.link.generate_session_id()
    }
}
