/// RTP fixed header reader (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |            CSRC list (CC entries), optional extension          |
/// ```
///
/// Wi-Fi Display sources send an MPEG-TS payload (PT 33) behind this header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    pub marker: bool,
    /// RTP payload type (7-bit, RFC 3551).
    pub payload_type: u8,
    pub sequence: u16,
    pub timestamp: u32,
    /// Synchronization source identifier (RFC 3550 §8.1).
    pub ssrc: u32,
    /// Offset of the payload within the packet.
    pub payload_offset: usize,
    /// Payload length after removing padding.
    pub payload_len: usize,
}

const FIXED_LEN: usize = 12;

impl RtpHeader {
    /// Parse the header of a complete RTP packet.
    ///
    /// Returns `None` for anything that is not version 2 or whose CSRC
    /// list, extension, or padding runs past the end of the packet.
    pub fn parse(packet: &[u8]) -> Option<Self> {
        if packet.len() < FIXED_LEN || packet[0] >> 6 != 2 {
            return None;
        }

        let padding = packet[0] & 0x20 != 0;
        let extension = packet[0] & 0x10 != 0;
        let csrc_count = (packet[0] & 0x0f) as usize;

        let mut offset = FIXED_LEN + 4 * csrc_count;
        if extension {
            let ext = packet.get(offset..offset + 4)?;
            let words = u16::from_be_bytes([ext[2], ext[3]]) as usize;
            offset += 4 + 4 * words;
        }
        if offset > packet.len() {
            return None;
        }

        let mut end = packet.len();
        if padding {
            let pad = *packet.last()? as usize;
            if pad == 0 || offset + pad > end {
                return None;
            }
            end -= pad;
        }

        Some(RtpHeader {
            marker: packet[1] & 0x80 != 0,
            payload_type: packet[1] & 0x7f,
            sequence: u16::from_be_bytes([packet[2], packet[3]]),
            timestamp: u32::from_be_bytes([packet[4], packet[5], packet[6], packet[7]]),
            ssrc: u32::from_be_bytes([packet[8], packet[9], packet[10], packet[11]]),
            payload_offset: offset,
            payload_len: end - offset,
        })
    }
}
