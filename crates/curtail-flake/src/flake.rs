use crate::{
    clock::{Clock, SystemClock},
    error::Error,
    short_id::{ShortId, MAX_MACHINE_ID, MAX_TIMESTAMP_MILLIS, SEQUENCE_MASK},
};
use jiff::Timestamp;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};
use typed_builder::TypedBuilder;

/// Configures a Flake generator instance.
#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct FlakeSettings {
    /// A unique machine index in the range `[0, 1023]`.
    #[builder]
    pub machine_id: u16,
    /// Custom epoch used as the zero point for the 42-bit timestamp field.
    ///
    /// Flake math runs at millisecond precision (`Timestamp::as_millisecond`).
    #[builder]
    pub epoch: Timestamp,
}

/// Flake ID generator with a free-running sequence counter.
///
/// The 12-bit sequence field comes from a single atomic that is never reset
/// while the process lives; it is masked at composition time. Two calls in
/// the same millisecond therefore get distinct sequence values without any
/// locking or waiting. Under rates above 4096 ids per millisecond the mask
/// can wrap; duplicate ids from a wrap are caught by the short-code
/// uniqueness checks downstream, never by blocking here.
pub struct Flake<C: Clock> {
    epoch: Timestamp,
    machine_id: u16,
    clock: C,
    sequence: AtomicU32,
}

impl Flake<SystemClock> {
    /// Creates a generator backed by the real system clock.
    pub fn new(settings: FlakeSettings) -> Result<Self, Error> {
        Self::with_clock(settings, SystemClock)
    }
}

impl<C: Clock> Flake<C> {
    fn with_clock(settings: FlakeSettings, clock: C) -> Result<Self, Error> {
        if settings.machine_id > MAX_MACHINE_ID {
            return Err(Error::InvalidMachineId {
                machine_id: settings.machine_id,
                max_machine_id: MAX_MACHINE_ID,
            });
        }

        let now = clock.now();
        if settings.epoch > now {
            return Err(Error::EpochAhead {
                epoch: settings.epoch,
                now,
            });
        }

        Ok(Self {
            epoch: settings.epoch,
            machine_id: settings.machine_id,
            clock,
            sequence: AtomicU32::new(0),
        })
    }

    /// Generates the next ShortId.
    pub fn next_id(&self) -> Result<ShortId, Error> {
        let now = self.clock.now();

        let elapsed = now.as_millisecond() - self.epoch.as_millisecond();
        if elapsed < 0 {
            // Clock fell behind the configured epoch since construction.
            return Err(Error::EpochAhead {
                epoch: self.epoch,
                now,
            });
        }
        if elapsed as u64 > MAX_TIMESTAMP_MILLIS {
            return Err(Error::OverTimeLimit);
        }

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) & SEQUENCE_MASK;

        Ok(ShortId::compose(elapsed as u64, self.machine_id, sequence))
    }
}

/// Derives a 10-bit machine id from a stable host identifier.
///
/// Hash collisions between hosts only narrow the uniqueness window of the
/// composite id; the store's unique constraint on short codes is the final
/// barrier.
pub fn machine_id_from_host(host: &str) -> u16 {
    let mut hasher = DefaultHasher::new();
    host.hash(&mut hasher);
    (hasher.finish() as u16) & MAX_MACHINE_ID
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_clock::TestClock;

    fn make_generator(machine_id: u16, clock_millis: i64) -> (Flake<TestClock>, TestClock) {
        let epoch = Timestamp::from_millisecond(0).unwrap();
        let settings = FlakeSettings::builder()
            .machine_id(machine_id)
            .epoch(epoch)
            .build();
        let clock = TestClock::new(Timestamp::from_millisecond(clock_millis).unwrap());
        let flake = Flake::with_clock(settings, clock.clone()).unwrap();
        (flake, clock)
    }

    #[test]
    fn first_id_has_sequence_zero() {
        let (gen, _clock) = make_generator(0, 100);
        let id = gen.next_id().unwrap();
        assert_eq!(id.sequence(), 0);
    }

    #[test]
    fn same_millisecond_increments_sequence() {
        let (gen, _clock) = make_generator(0, 100);
        let id0 = gen.next_id().unwrap();
        let id1 = gen.next_id().unwrap();
        let id2 = gen.next_id().unwrap();
        assert_eq!(id0.sequence(), 0);
        assert_eq!(id1.sequence(), 1);
        assert_eq!(id2.sequence(), 2);
    }

    #[test]
    fn sequence_free_runs_across_milliseconds() {
        let (gen, clock) = make_generator(0, 100);
        assert_eq!(gen.next_id().unwrap().sequence(), 0);
        assert_eq!(gen.next_id().unwrap().sequence(), 1);

        clock.advance_millis(1);

        // Entering a new millisecond does not reset the counter.
        let id = gen.next_id().unwrap();
        assert_eq!(id.sequence(), 2);
        assert_eq!(id.timestamp_millis(), 101);
    }

    #[test]
    fn sequence_wraps_at_twelve_bits() {
        let (gen, _clock) = make_generator(0, 100);
        for _ in 0..4096 {
            gen.next_id().unwrap();
        }
        assert_eq!(gen.next_id().unwrap().sequence(), 0);
    }

    #[test]
    fn machine_id_is_embedded() {
        let (gen, _clock) = make_generator(1023, 100);
        let id = gen.next_id().unwrap();
        assert_eq!(id.machine_id(), 1023);
    }

    #[test]
    fn timestamp_field_reflects_elapsed_milliseconds() {
        let (gen, _clock) = make_generator(0, 500);
        let id = gen.next_id().unwrap();
        // elapsed = 500ms - epoch(0ms)
        assert_eq!(id.timestamp_millis(), 500);
    }

    #[test]
    fn invalid_machine_id_is_rejected() {
        let epoch = Timestamp::from_millisecond(0).unwrap();
        let settings = FlakeSettings::builder().machine_id(1024).epoch(epoch).build();
        let clock = TestClock::new(Timestamp::from_millisecond(100).unwrap());
        assert_eq!(
            Flake::with_clock(settings, clock).err(),
            Some(Error::InvalidMachineId {
                machine_id: 1024,
                max_machine_id: 1023,
            })
        );
    }

    #[test]
    fn epoch_ahead_is_rejected() {
        let epoch = Timestamp::from_millisecond(1_000).unwrap();
        let settings = FlakeSettings::builder().machine_id(0).epoch(epoch).build();
        let now = Timestamp::from_millisecond(100).unwrap();
        let clock = TestClock::new(now);
        assert_eq!(
            Flake::with_clock(settings, clock).err(),
            Some(Error::EpochAhead { epoch, now })
        );
    }

    #[test]
    fn clock_behind_epoch_fails_generation() {
        let (gen, clock) = make_generator(0, 100);
        clock.set(Timestamp::from_millisecond(-50).unwrap());
        assert!(matches!(gen.next_id(), Err(Error::EpochAhead { .. })));
    }

    #[test]
    fn overtime_limit_returns_error() {
        let epoch = Timestamp::from_millisecond(0).unwrap();
        let settings = FlakeSettings::builder().machine_id(0).epoch(epoch).build();
        // Place the clock one millisecond past the 42-bit timestamp limit.
        let over_limit = 1_i64 << 42;
        let clock = TestClock::new(Timestamp::from_millisecond(over_limit).unwrap());
        let gen = Flake::with_clock(settings, clock).unwrap();
        assert_eq!(gen.next_id(), Err(Error::OverTimeLimit));
    }

    #[test]
    fn concurrent_generation_yields_distinct_ids() {
        let epoch = Timestamp::from_millisecond(0).unwrap();
        let settings = FlakeSettings::builder().machine_id(7).epoch(epoch).build();
        let gen = Flake::new(settings).unwrap();

        // 2000 ids stay under the 4096-per-millisecond wrap point even if
        // every one of them lands in the same millisecond.
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        (0..500)
                            .map(|_| gen.next_id().unwrap().as_u64())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            let mut all: Vec<u64> = handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect();
            all.sort_unstable();
            all.dedup();
            assert_eq!(all.len(), 2000);
        });
    }

    #[test]
    fn machine_id_from_host_is_stable_and_in_range() {
        let a = machine_id_from_host("app-01.internal");
        let b = machine_id_from_host("app-01.internal");
        assert_eq!(a, b);
        assert!(a <= MAX_MACHINE_ID);
    }
}
