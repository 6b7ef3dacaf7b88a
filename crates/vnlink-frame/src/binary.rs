use heapless::Vec;

use crate::codec::Found;
use crate::ring::RingByteBuffer;

/// Group bytes allowed in one header.
pub const MAX_GROUP_BYTES: usize = 3;

/// Type words allowed in one header, across all groups.
pub const MAX_TYPE_WORDS: usize = 10;

/// Chained type words allowed per group (two words fill a 32-bit field map).
pub const MAX_WORDS_PER_GROUP: usize = 2;

/// Highest combined group bit a header can carry.
pub const MAX_GROUP_BITS: usize = 7 * MAX_GROUP_BYTES;

const GROUP_EXTENSION: u8 = 0x80;
const TYPE_EXTENSION: u16 = 0x8000;

/// Decoded FA header: group bytes followed by per-group type words.
///
/// Both chains use their top bit as "another one follows". Decoding enforces
/// the chain limits, so an instance always describes a terminated header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryHeader {
    group_bytes: Vec<u8, MAX_GROUP_BYTES>,
    type_words: Vec<u16, MAX_TYPE_WORDS>,
}

impl BinaryHeader {
    /// Decode a header whose first group byte is at logical `start`.
    ///
    /// `Incomplete::needed` counts bytes from `start`.
    pub fn decode(buf: &RingByteBuffer, start: usize) -> Found<BinaryHeader> {
        let mut header = BinaryHeader::default();
        let mut pos = start;

        loop {
            let Some(byte) = buf.get(pos) else {
                return Found::Incomplete {
                    needed: pos - start + 1,
                };
            };
            if header.group_bytes.push(byte).is_err() {
                return Found::Invalid;
            }
            pos += 1;
            if byte & GROUP_EXTENSION == 0 {
                break;
            }
            if header.group_bytes.len() == MAX_GROUP_BYTES {
                return Found::Invalid;
            }
        }

        let groups = header.group_bits();
        if groups == 0 {
            return Found::Invalid;
        }

        for _ in 0..groups.count_ones() {
            let mut words_in_group = 0usize;
            loop {
                let Ok(raw) = buf.peek_array::<2>(pos) else {
                    return Found::Incomplete {
                        needed: pos - start + 2,
                    };
                };
                let word = u16::from_le_bytes(raw);
                words_in_group += 1;
                if words_in_group > MAX_WORDS_PER_GROUP || header.type_words.push(word).is_err() {
                    return Found::Invalid;
                }
                pos += 2;
                if word & TYPE_EXTENSION == 0 {
                    break;
                }
            }
        }

        Found::Valid(header)
    }

    /// Build the smallest header enabling every `(group, field)` pair.
    ///
    /// Returns `None` if a pair is out of range for the chain limits.
    pub fn from_fields(fields: &[(u8, u8)]) -> Option<BinaryHeader> {
        let mut maps = [0u32; MAX_GROUP_BITS];
        for &(group, field) in fields {
            if group as usize >= MAX_GROUP_BITS || field as usize >= 15 * MAX_WORDS_PER_GROUP {
                return None;
            }
            maps[group as usize] |= 1 << field;
        }

        let mut groups = 0u32;
        for (g, map) in maps.iter().enumerate() {
            if *map != 0 {
                groups |= 1 << g;
            }
        }
        if groups == 0 {
            return None;
        }

        let mut header = BinaryHeader::default();
        let group_byte_count = (32 - groups.leading_zeros() as usize).div_ceil(7);
        for i in 0..group_byte_count {
            let mut byte = ((groups >> (7 * i)) & 0x7F) as u8;
            if i + 1 < group_byte_count {
                byte |= GROUP_EXTENSION;
            }
            header.group_bytes.push(byte).ok()?;
        }

        for map in maps.iter().filter(|m| **m != 0) {
            let low = (map & 0x7FFF) as u16;
            let high = ((map >> 15) & 0x7FFF) as u16;
            if high != 0 {
                header.type_words.push(low | TYPE_EXTENSION).ok()?;
                header.type_words.push(high).ok()?;
            } else {
                header.type_words.push(low).ok()?;
            }
        }
        Some(header)
    }

    pub fn group_bytes(&self) -> &[u8] {
        &self.group_bytes
    }

    pub fn type_words(&self) -> &[u16] {
        &self.type_words
    }

    /// Header size on the wire (group bytes plus type words).
    pub fn wire_len(&self) -> usize {
        self.group_bytes.len() + 2 * self.type_words.len()
    }

    /// Enabled groups as a combined bitmap, extension bits removed.
    pub fn group_bits(&self) -> u32 {
        self.group_bytes
            .iter()
            .enumerate()
            .fold(0u32, |acc, (i, b)| acc | (u32::from(b & 0x7F) << (7 * i)))
    }

    /// Each enabled group with its combined field bitmap, in wire order.
    pub fn groups(&self) -> GroupIter<'_> {
        GroupIter {
            header: self,
            remaining_groups: self.group_bits(),
            word: 0,
        }
    }

    /// Field bitmap of one group, or zero if the group is not enabled.
    pub fn fields_of(&self, group: u8) -> u32 {
        self.groups()
            .find(|(g, _)| *g == group)
            .map(|(_, map)| map)
            .unwrap_or(0)
    }

    /// Every enabled `(group, field)` pair in payload order.
    pub fn fields(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.groups().flat_map(|(group, map)| {
            (0..32u8)
                .filter(move |bit| map & (1 << bit) != 0)
                .map(move |bit| (group, bit))
        })
    }

    /// Append the wire encoding of this header to `out`.
    pub fn encode_into(&self, out: &mut std::vec::Vec<u8>) {
        out.extend_from_slice(&self.group_bytes);
        for word in &self.type_words {
            out.extend_from_slice(&word.to_le_bytes());
        }
    }
}

/// Iterator over `(group, field bitmap)` pairs of a [`BinaryHeader`].
pub struct GroupIter<'a> {
    header: &'a BinaryHeader,
    remaining_groups: u32,
    word: usize,
}

impl Iterator for GroupIter<'_> {
    type Item = (u8, u32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining_groups == 0 {
            return None;
        }
        let group = self.remaining_groups.trailing_zeros() as u8;
        self.remaining_groups &= self.remaining_groups - 1;

        let mut map = 0u32;
        let mut chained = 0usize;
        while let Some(&word) = self.header.type_words.get(self.word) {
            map |= u32::from(word & !TYPE_EXTENSION) << (15 * chained);
            chained += 1;
            self.word += 1;
            if word & TYPE_EXTENSION == 0 {
                break;
            }
        }
        Some((group, map))
    }
}
