//! AIVDM fragmentation: splitting armored payloads that exceed the
//! per-sentence capacity into numbered fragments tied together by a group
//! sequence id.
//!
//! The per-fragment payload capacity is derived from the 82-character NMEA
//! envelope rather than hardcoded: with single-digit count/index/group/fill
//! fields the fixed overhead is `!AIVDM,c,i,g,A,` (15) plus `,f*hh` (5) plus
//! CRLF (2), leaving 60 payload characters.

use crate::bits::BitBuffer;
use crate::sentence::{AivdmSentence, Channel, MAX_SENTENCE_LEN};

/// Armored payload characters that fit in one AIVDM sentence.
pub const MAX_FRAGMENT_PAYLOAD: usize =
    MAX_SENTENCE_LEN - "!AIVDM,c,i,g,A,".len() - ",f*hh".len() - "\r\n".len();

/// Allocates group sequence ids 0–9 per channel, round-robin.
///
/// Every multi-part message on a channel takes the next id; ten concurrent
/// groups per channel is the AIVDM addressing limit.
#[derive(Debug, Clone, Default)]
pub struct GroupIdAllocator {
    next: [u8; 2],
}

impl GroupIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, channel: Channel) -> u8 {
        let slot = match channel {
            Channel::A => &mut self.next[0],
            Channel::B => &mut self.next[1],
        };
        let id = *slot;
        *slot = (*slot + 1) % 10;
        id
    }
}

/// Wrap an encoded payload into one or more AIVDM sentences.
///
/// Single-fragment messages carry an empty group id. Multi-part messages
/// share one allocated group id; every fragment except the last is a whole
/// number of 6-bit characters, so only the last carries the fill count.
pub fn fragment(
    bits: &BitBuffer,
    channel: Channel,
    groups: &mut GroupIdAllocator,
) -> Vec<AivdmSentence> {
    let (payload, fill_bits) = bits.to_payload();
    if payload.len() <= MAX_FRAGMENT_PAYLOAD {
        return vec![AivdmSentence {
            fragment_count: 1,
            fragment_index: 1,
            group_id: None,
            channel,
            payload,
            fill_bits,
        }];
    }

    let group_id = Some(groups.allocate(channel));
    let chunks: Vec<&str> = payload
        .as_bytes()
        .chunks(MAX_FRAGMENT_PAYLOAD)
        .map(|c| std::str::from_utf8(c).expect("armor alphabet is ASCII"))
        .collect();
    let count = chunks.len() as u8;
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| AivdmSentence {
            fragment_count: count,
            fragment_index: i as u8 + 1,
            group_id,
            channel,
            payload: chunk.to_string(),
            fill_bits: if i as u8 + 1 == count { fill_bits } else { 0 },
        })
        .collect()
}

/// Reassemble fragments (in index order) back into the payload bit vector.
/// Used by tests and stream consumers.
pub fn reassemble(
    fragments: &[AivdmSentence],
) -> Result<BitBuffer, crate::error::SentenceError> {
    let mut payload = String::new();
    let mut fill = 0;
    for f in fragments {
        payload.push_str(&f.payload);
        fill = f.fill_bits;
    }
    BitBuffer::from_payload(&payload, fill)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ais::{AisMessage, Dimensions, StaticAndVoyage};

    fn voyage_message() -> StaticAndVoyage {
        StaticAndVoyage {
            repeat: 0,
            mmsi: 367_001_234,
            ais_version: 0,
            imo: 9_123_456,
            callsign: "WDD8888".into(),
            name: "EVER FORWARD".into(),
            ship_type: 70,
            dimensions: Dimensions {
                to_bow: 200,
                to_stern: 100,
                to_port: 20,
                to_starboard: 20,
            },
            epfd: 1,
            eta_month: 6,
            eta_day: 15,
            eta_hour: 8,
            eta_minute: 30,
            draught_m: 12.5,
            destination: "OAKLAND".into(),
            dte: false,
        }
    }

    #[test]
    fn capacity_is_derived_from_envelope() {
        assert_eq!(MAX_FRAGMENT_PAYLOAD, 60);
    }

    #[test]
    fn short_payload_is_one_ungrouped_fragment() {
        let mut groups = GroupIdAllocator::new();
        let mut bits = BitBuffer::new();
        bits.append_uint(1, 6).unwrap();
        let frags = fragment(&bits, Channel::A, &mut groups);
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].fragment_count, 1);
        assert_eq!(frags[0].fragment_index, 1);
        assert_eq!(frags[0].group_id, None);
        // Allocator untouched by single-fragment messages.
        assert_eq!(groups.allocate(Channel::A), 0);
    }

    #[test]
    fn type5_splits_into_two_fragments() {
        let mut groups = GroupIdAllocator::new();
        let bits = voyage_message().encode().unwrap();
        assert_eq!(bits.len(), 424);

        let frags = fragment(&bits, Channel::A, &mut groups);
        assert_eq!(frags.len(), 2);
        assert_eq!(frags[0].payload.len(), 60);
        assert_eq!(frags[0].fill_bits, 0);
        assert_eq!(frags[0].fragment_index, 1);
        assert_eq!(frags[1].fragment_index, 2);
        assert_eq!(frags[0].fragment_count, 2);
        assert_eq!(frags[1].fragment_count, 2);
        let g = frags[0].group_id.expect("multi-part carries a group id");
        assert!(g <= 9);
        assert_eq!(frags[1].group_id, Some(g));
        // 60·6 + (chars₂·6 − fill) must equal the 424 encoded bits.
        let chars2 = frags[1].payload.len();
        assert_eq!(
            60 * 6 + (chars2 * 6 - frags[1].fill_bits as usize),
            424
        );
        // Each wrapped sentence respects the NMEA length limit.
        for f in &frags {
            assert!(f.to_sentence().len() + 2 <= MAX_SENTENCE_LEN);
        }
    }

    #[test]
    fn fragments_reassemble_to_original_bits() {
        let mut groups = GroupIdAllocator::new();
        let bits = voyage_message().encode().unwrap();
        let frags = fragment(&bits, Channel::B, &mut groups);
        let restored = reassemble(&frags).unwrap();
        assert_eq!(restored, bits);
        assert_eq!(
            AisMessage::decode(&restored).unwrap(),
            AisMessage::StaticAndVoyage(voyage_message())
        );
    }

    #[test]
    fn group_ids_cycle_per_channel() {
        let mut groups = GroupIdAllocator::new();
        let ids: Vec<u8> = (0..12).map(|_| groups.allocate(Channel::A)).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 0, 1]);
        // Channel B has its own counter.
        assert_eq!(groups.allocate(Channel::B), 0);
    }
}
