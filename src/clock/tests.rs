#[cfg(test)]
mod units {
    use crate::clock::{SimClock, SimTime};
    use std::time::Duration;

    #[test]
    fn sim_time_ordering_and_arithmetic() {
        let t1 = SimTime::from_secs(5);
        let t2 = t1 + Duration::from_millis(2500);

        assert!(t2 > t1);
        assert_eq!(t2 - t1, Duration::from_millis(2500));
        assert_eq!(t2.since_epoch(), Duration::from_millis(7500));
    }

    #[test]
    fn sim_time_duration_since_saturates() {
        let earlier = SimTime::from_secs(1);
        let later = SimTime::from_secs(4);

        // A reversed interval clamps to zero instead of underflowing.
        assert_eq!(earlier.duration_since(later), Duration::ZERO);
        assert_eq!(later.duration_since(earlier), Duration::from_secs(3));
    }

    #[test]
    fn sim_time_microsecond_resolution() {
        let t = SimTime::from_micros(1_000_001);
        assert_eq!(t.as_micros(), 1_000_001);
    }

    #[test]
    fn clock_advances_in_fixed_ticks() {
        let mut clock = SimClock::new(Duration::from_secs(1));

        assert_eq!(clock.now(), SimTime::ZERO);
        assert_eq!(clock.step_count(), 0);

        let t1 = clock.advance();
        let t2 = clock.advance();

        assert_eq!(t1, SimTime::from_secs(1));
        assert_eq!(t2, SimTime::from_secs(2));
        assert_eq!(clock.step_count(), 2);
        assert_eq!(clock.now(), t2);
    }

    #[test]
    fn clock_supports_sub_second_ticks() {
        let mut clock = SimClock::new(Duration::from_millis(250));

        for _ in 0..8 {
            clock.advance();
        }

        assert_eq!(clock.now(), SimTime::from_secs(2));
    }

    #[test]
    #[should_panic(expected = "non-zero tick")]
    fn clock_rejects_zero_tick() {
        SimClock::new(Duration::ZERO);
    }
}
