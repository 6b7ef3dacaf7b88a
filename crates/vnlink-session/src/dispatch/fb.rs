use bytes::BytesMut;
use tracing::{debug, trace};
use vnlink_frame::crc::crc16_ring;
use vnlink_frame::{
    find_fb_packet, FbHeader, FbMetadata, FindResult, FrameConfig, RingByteBuffer, Validity,
    FA_SYNC, FB_SYNC,
};

use super::{Dispatcher, FaDispatcher};

/// Reassembles FB segments into an FA frame and hands it to an FA dispatcher.
pub struct FbDispatcher {
    config: FrameConfig,
    fa: FaDispatcher,
    pending: Option<FbMetadata>,
    previous: Option<FbHeader>,
    assembly: RingByteBuffer,
    scratch: BytesMut,
}

impl FbDispatcher {
    /// `fa` receives reassembled frames; usually a fork of the stream's own
    /// FA dispatcher.
    pub fn new(config: FrameConfig, fa: FaDispatcher) -> Self {
        let capacity = config.max_fa_length;
        Self {
            config,
            fa,
            pending: None,
            previous: None,
            assembly: RingByteBuffer::new(capacity),
            scratch: BytesMut::new(),
        }
    }

    /// True while a multi-segment message is partly assembled.
    pub fn in_progress(&self) -> bool {
        self.previous.is_some()
    }

    fn reset(&mut self) {
        self.previous = None;
        self.assembly.clear();
    }

    fn append_segment(&mut self, buf: &RingByteBuffer, offset: usize, header: &FbHeader) -> bool {
        let len = usize::from(header.payload_length);
        self.scratch.clear();
        self.scratch.resize(len, 0);
        if buf
            .peek(&mut self.scratch, offset + FbMetadata::PAYLOAD_OFFSET)
            .is_err()
        {
            return false;
        }
        self.assembly.put(&self.scratch).is_ok()
    }

    fn forward(&mut self) {
        let body = self.assembly.len().saturating_sub(1);
        let crc = match crc16_ring(&self.assembly, 1, body) {
            Ok(crc) => crc,
            Err(_) => return,
        };
        if self.assembly.put(&crc.to_be_bytes()).is_err() {
            debug!("reassembled frame too long for CRC");
            return;
        }

        let found = self.fa.find_packet(&self.assembly, 0);
        if found.validity == Validity::Valid {
            trace!(length = found.length, "forwarding reassembled frame");
            self.fa.dispatch_packet(&self.assembly, 0);
        } else {
            debug!(validity = ?found.validity, "reassembled frame rejected");
        }
    }
}

impl Dispatcher for FbDispatcher {
    fn sync_byte(&self) -> u8 {
        FB_SYNC
    }

    fn find_packet(&mut self, buf: &RingByteBuffer, offset: usize) -> FindResult {
        let found = find_fb_packet(buf, offset, &self.config);
        let result = found.find_result();
        self.pending = found.into_valid();
        result
    }

    fn dispatch_packet(&mut self, buf: &RingByteBuffer, offset: usize) {
        let Some(meta) = self.pending.take() else {
            return;
        };
        let header = meta.header;

        if header.is_first() {
            self.reset();
            // Seeded sync byte makes the assembly a native FA frame.
            if self.assembly.put(&[FA_SYNC]).is_err() {
                return;
            }
        } else if !self.previous.is_some_and(|prev| header.continues(&prev)) {
            debug!(
                id = header.message_id,
                current = header.current,
                total = header.total,
                "out-of-sequence segment; resetting reassembly"
            );
            self.reset();
            return;
        }

        if !self.append_segment(buf, offset, &header) {
            debug!(id = header.message_id, "reassembly overflow; resetting");
            self.reset();
            return;
        }
        self.previous = Some(header);

        if header.is_last() {
            self.forward();
            self.reset();
        }
    }
}
