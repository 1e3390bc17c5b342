#[cfg(test)]
mod units {
    use crate::aircraft::{Aircraft, AltitudeKind, Attitude, LightBits};
    use crate::clock::SimTime;
    use crate::geo::{self, GeoPoint};

    fn parked() -> Aircraft {
        Aircraft::at_gate(GeoPoint::new(32.0, 34.9))
    }

    #[test]
    fn light_combinations_contain_their_parts() {
        assert!(LightBits::BEACON_TAXI_NAV.contains(LightBits::BEACON));
        assert!(LightBits::BEACON_TAXI_NAV.contains(LightBits::TAXI));
        assert!(LightBits::BEACON_TAXI_NAV.contains(LightBits::NAV));
        assert!(!LightBits::BEACON_TAXI_NAV.contains(LightBits::STROBE));
        assert!(LightBits::BEACON_LANDING_NAV_STROBE.contains(LightBits::STROBE));
        assert!(!LightBits::NONE.contains(LightBits::BEACON));
    }

    #[test]
    fn surface_setters_clamp() {
        let mut ac = parked();
        ac.set_flap_state(1.4);
        ac.set_gear_state(-0.2);
        ac.set_spoiler_state(0.6);

        assert_eq!(ac.flap_state(), 1.0);
        assert_eq!(ac.gear_state(), 0.0);
        assert_eq!(ac.spoiler_state(), 0.6);
    }

    #[test]
    fn attitude_heading_is_normalized() {
        let mut ac = parked();
        ac.set_attitude(Attitude::default().with_heading(450.0));
        assert_eq!(ac.attitude().heading, 90.0);
    }

    #[test]
    fn positive_vertical_speed_lifts_off() {
        let mut ac = parked();
        ac.set_vertical_speed_fpm(1200.0);

        ac.integrate_to(SimTime::from_secs(5));

        let alt = ac.altitude();
        assert_eq!(alt.kind, AltitudeKind::Agl);
        assert!((alt.feet - 100.0).abs() < 1e-9, "altitude {}", alt.feet);
    }

    #[test]
    fn descent_through_zero_touches_down() {
        let mut ac = parked();
        ac.set_vertical_speed_fpm(600.0);
        ac.integrate_to(SimTime::from_secs(10));
        assert!(ac.altitude().is_airborne());

        ac.set_vertical_speed_fpm(-700.0);
        ac.integrate_to(SimTime::from_secs(20));

        assert_eq!(ac.altitude().kind, AltitudeKind::Ground);
        assert_eq!(ac.vertical_speed_fpm(), 0.0);
    }

    #[test]
    fn ground_speed_moves_along_heading() {
        let mut ac = parked();
        let start = ac.location();
        ac.set_attitude(Attitude::default().with_heading(90.0));
        ac.set_ground_speed_kt(60.0);

        ac.integrate_to(SimTime::from_secs(10));

        // 60 kt for 10 s is about 309 metres.
        let travelled = geo::distance_metres(start, ac.location());
        assert!(
            (travelled - 308.7).abs() < 1.0,
            "travelled {} metres",
            travelled
        );
        let bearing = geo::heading_from_points(start, ac.location());
        assert!((bearing - 90.0).abs() < 0.5, "bearing {}", bearing);
    }

    #[test]
    fn integration_is_idempotent_at_same_timestamp() {
        let mut ac = parked();
        ac.set_attitude(Attitude::default().with_heading(180.0));
        ac.set_ground_speed_kt(20.0);

        ac.integrate_to(SimTime::from_secs(3));
        let once = ac.location();
        ac.integrate_to(SimTime::from_secs(3));

        assert_eq!(ac.location(), once);
    }

    #[test]
    fn park_zeroes_motion() {
        let mut ac = parked();
        ac.set_ground_speed_kt(12.0);
        ac.park("G4");

        assert_eq!(ac.parked_at(), Some("G4"));
        assert_eq!(ac.ground_speed_kt(), 0.0);
        assert_eq!(ac.altitude().kind, AltitudeKind::Ground);
    }
}
