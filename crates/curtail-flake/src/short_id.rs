use std::fmt;

const TIMESTAMP_BITS: u32 = 42;
const MACHINE_ID_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;

const TIMESTAMP_SHIFT: u32 = MACHINE_ID_BITS + SEQUENCE_BITS;
const MACHINE_ID_SHIFT: u32 = SEQUENCE_BITS;

pub(crate) const MAX_TIMESTAMP_MILLIS: u64 = (1 << TIMESTAMP_BITS) - 1;
pub(crate) const MAX_MACHINE_ID: u16 = (1 << MACHINE_ID_BITS) - 1;
pub(crate) const SEQUENCE_MASK: u32 = (1 << SEQUENCE_BITS) - 1;

/// 64-bit composite key laid out as
/// `(timestamp_millis << 22) | (machine_id << 12) | sequence`.
///
/// The timestamp field counts milliseconds since a configured epoch (42
/// bits), the machine id occupies 10 bits and the sequence 12 bits. The raw
/// value is what gets base62-encoded into a short code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShortId(u64);

impl ShortId {
    pub(crate) fn compose(timestamp_millis: u64, machine_id: u16, sequence: u32) -> Self {
        let timestamp = timestamp_millis & MAX_TIMESTAMP_MILLIS;
        let machine_id = u64::from(machine_id & MAX_MACHINE_ID);
        let sequence = u64::from(sequence & SEQUENCE_MASK);
        Self((timestamp << TIMESTAMP_SHIFT) | (machine_id << MACHINE_ID_SHIFT) | sequence)
    }

    /// Milliseconds elapsed since the generator's epoch.
    pub fn timestamp_millis(self) -> u64 {
        self.0 >> TIMESTAMP_SHIFT
    }

    pub fn machine_id(self) -> u16 {
        ((self.0 >> MACHINE_ID_SHIFT) as u16) & MAX_MACHINE_ID
    }

    pub fn sequence(self) -> u32 {
        (self.0 as u32) & SEQUENCE_MASK
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn from_u64(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<ShortId> for u64 {
    fn from(id: ShortId) -> Self {
        id.0
    }
}

impl fmt::Debug for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShortId")
            .field("timestamp_millis", &self.timestamp_millis())
            .field("machine_id", &self.machine_id())
            .field("sequence", &self.sequence())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_round_trip() {
        let id = ShortId::compose(123_456, 1023, 4095);
        assert_eq!(id.timestamp_millis(), 123_456);
        assert_eq!(id.machine_id(), 1023);
        assert_eq!(id.sequence(), 4095);
    }

    #[test]
    fn layout_matches_composition_formula() {
        let id = ShortId::compose(1, 1, 1);
        assert_eq!(id.as_u64(), (1 << 22) | (1 << 12) | 1);
    }

    #[test]
    fn raw_value_round_trips() {
        let id = ShortId::compose(42, 7, 9);
        assert_eq!(ShortId::from_u64(id.as_u64()), id);
    }

    #[test]
    fn oversized_inputs_are_masked() {
        let id = ShortId::compose(0, MAX_MACHINE_ID, SEQUENCE_MASK + 1);
        assert_eq!(id.sequence(), 0);
        assert_eq!(id.machine_id(), MAX_MACHINE_ID);
    }
}
