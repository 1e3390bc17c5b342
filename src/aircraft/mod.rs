//! # Aircraft Module - Actuator View
//!
//! The aircraft as the maneuver engine sees it: a bundle of writable
//! parameters (attitude, speeds, flap/gear/spoiler positions, lights, COM
//! frequency) plus a handful of readers (altitude, location). Maneuver
//! closures are the only writers; the traffic loop integrates the few
//! parameters that accumulate over time (altitude from vertical speed,
//! location from ground speed) once per tick before any maneuver runs, so a
//! taxi animation that writes the location directly always wins the tick.
//!
//! There is no aerodynamics here. Everything beyond parameter animation is
//! out of scope for the engine.
//!
//! ## Example Usage
//! ```
//! use airtraffic_lib::aircraft::{Aircraft, Attitude, LightBits};
//! use airtraffic_lib::clock::SimTime;
//! use airtraffic_lib::geo::GeoPoint;
//!
//! // A departure standing cold at its gate
//! let mut aircraft = Aircraft::at_gate(GeoPoint::new(32.0, 34.85));
//! assert_eq!(aircraft.ground_speed_kt(), 0.0);
//!
//! // Scripts drive it through setters
//! aircraft.set_lights(LightBits::BEACON_TAXI);
//! aircraft.set_attitude(Attitude::default().with_heading(90.0));
//! aircraft.set_ground_speed_kt(15.0);
//!
//! // The loop integrates accumulating parameters each tick
//! aircraft.integrate_to(SimTime::from_secs(10));
//! assert!(aircraft.lights().contains(LightBits::BEACON));
//! ```
//!
//! ## Submodules
//!
//! - [`tests`]: Unit tests for light masks, setters and integration

pub mod tests;

use crate::clock::SimTime;
use crate::geo::{self, GeoPoint};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const KNOTS_TO_MPS: f64 = 0.514_444;

/// Exterior light mask.
///
/// Scripts switch whole named combinations rather than individual bits,
/// matching how crews actually run the panel: beacon for engine start,
/// beacon+taxi for ground movement, everything on for the runway.
///
/// # Examples
/// ```
/// # use airtraffic_lib::aircraft::LightBits;
/// let taxiing = LightBits::BEACON_TAXI_NAV;
/// assert!(taxiing.contains(LightBits::BEACON));
/// assert!(taxiing.contains(LightBits::TAXI));
/// assert!(!taxiing.contains(LightBits::STROBE));
///
/// // Everything off is the gate state.
/// assert_eq!(LightBits::NONE.bits(), 0);
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightBits(u8);

impl LightBits {
    pub const NONE: LightBits = LightBits(0);
    pub const BEACON: LightBits = LightBits(1);
    pub const TAXI: LightBits = LightBits(1 << 1);
    pub const NAV: LightBits = LightBits(1 << 2);
    pub const LANDING: LightBits = LightBits(1 << 3);
    pub const STROBE: LightBits = LightBits(1 << 4);

    pub const BEACON_NAV: LightBits = LightBits(Self::BEACON.0 | Self::NAV.0);
    pub const BEACON_TAXI: LightBits = LightBits(Self::BEACON.0 | Self::TAXI.0);
    pub const BEACON_TAXI_NAV: LightBits = LightBits(Self::BEACON_TAXI.0 | Self::NAV.0);
    pub const BEACON_LANDING_NAV_STROBE: LightBits =
        LightBits(Self::BEACON.0 | Self::LANDING.0 | Self::NAV.0 | Self::STROBE.0);

    /// True when every bit of `other` is set in `self`.
    ///
    /// # Arguments
    ///
    /// * `other` - The mask to test for, usually a single named light
    ///
    /// # Examples
    /// ```
    /// # use airtraffic_lib::aircraft::LightBits;
    /// assert!(LightBits::BEACON_NAV.contains(LightBits::NAV));
    /// assert!(!LightBits::BEACON.contains(LightBits::BEACON_NAV));
    /// ```
    pub fn contains(&self, other: LightBits) -> bool {
        self.0 & other.0 == other.0
    }

    /// The raw mask value, for snapshots and diagnostics.
    pub fn bits(&self) -> u8 {
        self.0
    }
}

/// How an altitude value is referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AltitudeKind {
    /// Feet above ground level
    Agl,
    /// Feet above mean sea level
    Msl,
    /// On the surface
    Ground,
}

/// Altitude reading: feet plus the reference it is measured against.
///
/// Scripts gate on these readings (the flare waits for 20 ft AGL, the
/// runway mutex releases a departure once it is airborne), so the reference
/// kind travels with the number instead of being implied.
///
/// # Examples
/// ```
/// # use airtraffic_lib::aircraft::{Altitude, AltitudeKind};
/// let short_final = Altitude::agl(55.0);
/// assert!(short_final.is_airborne());
///
/// let parked = Altitude::ground();
/// assert_eq!(parked.kind, AltitudeKind::Ground);
/// assert!(!parked.is_airborne());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Altitude {
    pub feet: f64,
    pub kind: AltitudeKind,
}

impl Altitude {
    /// An on-surface reading: zero feet, `Ground` reference.
    pub fn ground() -> Self {
        Altitude {
            feet: 0.0,
            kind: AltitudeKind::Ground,
        }
    }

    /// A height above the field.
    ///
    /// # Arguments
    ///
    /// * `feet` - Height above ground level
    pub fn agl(feet: f64) -> Self {
        Altitude {
            feet,
            kind: AltitudeKind::Agl,
        }
    }

    /// True unless the reading is a surface contact.
    pub fn is_airborne(&self) -> bool {
        self.kind != AltitudeKind::Ground
    }
}

/// Pitch and heading, in degrees.
///
/// The `with_*` builders mirror how scripts update one axis at a time: an
/// animation reads the current attitude, replaces its own axis and writes
/// the result back.
///
/// # Examples
/// ```
/// # use airtraffic_lib::aircraft::Attitude;
/// let level = Attitude::default();
/// let rotated = level.with_pitch(8.5).with_heading(450.0);
///
/// assert_eq!(rotated.pitch, 8.5);
/// // Headings wrap into the compass range.
/// assert_eq!(rotated.heading, 90.0);
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attitude {
    pub pitch: f64,
    pub heading: f64,
}

impl Attitude {
    /// The same attitude with `pitch` replaced.
    pub fn with_pitch(self, pitch: f64) -> Self {
        Attitude { pitch, ..self }
    }

    /// The same attitude with `heading` replaced, wrapped into `[0, 360)`.
    pub fn with_heading(self, heading: f64) -> Self {
        Attitude {
            heading: geo::normalize_heading(heading),
            ..self
        }
    }
}

/// The writable aircraft state.
///
/// Setters clamp surface positions into `[0, 1]`; nothing else is
/// validated, because the values come from scripted animations rather than
/// user input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aircraft {
    location: GeoPoint,
    altitude: Altitude,
    attitude: Attitude,
    vertical_speed_fpm: f64,
    ground_speed_kt: f64,
    flap_state: f64,
    gear_state: f64,
    spoiler_state: f64,
    lights: LightBits,
    frequency_khz: u32,
    parked_at: Option<String>,
    /// Timestamp of the last integration pass
    last_integrated: SimTime,
}

impl Aircraft {
    /// A cold aircraft standing at `location`: gear down, surfaces clean,
    /// lights off, radio untuned.
    ///
    /// # Arguments
    ///
    /// * `location` - The parking position, normally a stand location
    ///
    /// # Examples
    /// ```
    /// # use airtraffic_lib::aircraft::Aircraft;
    /// # use airtraffic_lib::geo::GeoPoint;
    /// let aircraft = Aircraft::at_gate(GeoPoint::new(32.0, 34.85));
    /// assert_eq!(aircraft.gear_state(), 1.0);
    /// assert_eq!(aircraft.frequency_khz(), 0);
    /// assert!(!aircraft.altitude().is_airborne());
    /// ```
    pub fn at_gate(location: GeoPoint) -> Self {
        Aircraft {
            location,
            altitude: Altitude::ground(),
            attitude: Attitude::default(),
            vertical_speed_fpm: 0.0,
            ground_speed_kt: 0.0,
            flap_state: 0.0,
            gear_state: 1.0,
            spoiler_state: 0.0,
            lights: LightBits::NONE,
            frequency_khz: 0,
            parked_at: None,
            last_integrated: SimTime::ZERO,
        }
    }

    /// An aircraft established on final: configured dirty is up to the
    /// script, this just places it in the air at `feet_agl`.
    ///
    /// # Arguments
    ///
    /// * `location` - Spawn position on the extended centerline
    /// * `heading` - Approach heading in degrees true
    /// * `feet_agl` - Initial height above the field
    /// * `ground_speed_kt` - Approach speed in knots
    ///
    /// # Examples
    /// ```
    /// # use airtraffic_lib::aircraft::Aircraft;
    /// # use airtraffic_lib::geo::GeoPoint;
    /// let arrival = Aircraft::on_final(GeoPoint::new(32.0, 34.75), 90.0, 2500.0, 145.0);
    /// assert!(arrival.altitude().is_airborne());
    /// assert_eq!(arrival.attitude().heading, 90.0);
    /// assert_eq!(arrival.ground_speed_kt(), 145.0);
    /// ```
    pub fn on_final(location: GeoPoint, heading: f64, feet_agl: f64, ground_speed_kt: f64) -> Self {
        Aircraft {
            location,
            altitude: Altitude::agl(feet_agl),
            attitude: Attitude::default().with_heading(heading),
            vertical_speed_fpm: 0.0,
            ground_speed_kt,
            flap_state: 0.0,
            gear_state: 0.0,
            spoiler_state: 0.0,
            lights: LightBits::BEACON_LANDING_NAV_STROBE,
            frequency_khz: 0,
            parked_at: None,
            last_integrated: SimTime::ZERO,
        }
    }

    /// Current position.
    pub fn location(&self) -> GeoPoint {
        self.location
    }

    /// Current altitude reading, including its reference kind.
    pub fn altitude(&self) -> Altitude {
        self.altitude
    }

    /// Current pitch and heading.
    pub fn attitude(&self) -> Attitude {
        self.attitude
    }

    pub fn vertical_speed_fpm(&self) -> f64 {
        self.vertical_speed_fpm
    }

    pub fn ground_speed_kt(&self) -> f64 {
        self.ground_speed_kt
    }

    pub fn flap_state(&self) -> f64 {
        self.flap_state
    }

    pub fn gear_state(&self) -> f64 {
        self.gear_state
    }

    pub fn spoiler_state(&self) -> f64 {
        self.spoiler_state
    }

    pub fn lights(&self) -> LightBits {
        self.lights
    }

    pub fn frequency_khz(&self) -> u32 {
        self.frequency_khz
    }

    /// The stand this aircraft is parked at, if any.
    pub fn parked_at(&self) -> Option<&str> {
        self.parked_at.as_deref()
    }

    /// Moves the aircraft to an absolute position.
    ///
    /// Taxi animations use this every tick; because integration runs before
    /// maneuvers, an absolute write here is what the snapshot sees.
    pub fn set_location(&mut self, location: GeoPoint) {
        self.location = location;
    }

    /// Writes pitch and heading, wrapping the heading into `[0, 360)`.
    pub fn set_attitude(&mut self, attitude: Attitude) {
        self.attitude = Attitude {
            pitch: attitude.pitch,
            heading: geo::normalize_heading(attitude.heading),
        };
    }

    /// Sets the climb or descent rate in feet per minute, negative down.
    pub fn set_vertical_speed_fpm(&mut self, fpm: f64) {
        self.vertical_speed_fpm = fpm;
    }

    /// Sets the ground speed in knots, clamped non-negative.
    pub fn set_ground_speed_kt(&mut self, kt: f64) {
        self.ground_speed_kt = kt.max(0.0);
    }

    /// Sets the flap position in `[0, 1]`, clamping out-of-range values.
    ///
    /// # Examples
    /// ```
    /// # use airtraffic_lib::aircraft::Aircraft;
    /// # use airtraffic_lib::geo::GeoPoint;
    /// let mut aircraft = Aircraft::at_gate(GeoPoint::new(32.0, 34.85));
    /// aircraft.set_flap_state(1.4);
    /// assert_eq!(aircraft.flap_state(), 1.0);
    /// ```
    pub fn set_flap_state(&mut self, value: f64) {
        self.flap_state = value.clamp(0.0, 1.0);
    }

    /// Sets the gear position in `[0, 1]`, 1 being down and locked.
    pub fn set_gear_state(&mut self, value: f64) {
        self.gear_state = value.clamp(0.0, 1.0);
    }

    /// Sets the spoiler position in `[0, 1]`.
    pub fn set_spoiler_state(&mut self, value: f64) {
        self.spoiler_state = value.clamp(0.0, 1.0);
    }

    /// Switches the exterior lights to `lights`.
    pub fn set_lights(&mut self, lights: LightBits) {
        self.lights = lights;
    }

    /// Tunes the COM radio to `khz`.
    pub fn set_frequency_khz(&mut self, khz: u32) {
        self.frequency_khz = khz;
    }

    /// Parks the aircraft at a stand: zeroes motion and clears the strobes.
    ///
    /// # Arguments
    ///
    /// * `stand` - Name of the parking stand
    ///
    /// # Examples
    /// ```
    /// # use airtraffic_lib::aircraft::Aircraft;
    /// # use airtraffic_lib::geo::GeoPoint;
    /// let mut aircraft = Aircraft::at_gate(GeoPoint::new(32.0, 34.85));
    /// aircraft.set_ground_speed_kt(12.0);
    /// aircraft.park("G4");
    ///
    /// assert_eq!(aircraft.parked_at(), Some("G4"));
    /// assert_eq!(aircraft.ground_speed_kt(), 0.0);
    /// ```
    pub fn park(&mut self, stand: &str) {
        self.parked_at = Some(stand.to_string());
        self.ground_speed_kt = 0.0;
        self.vertical_speed_fpm = 0.0;
        self.altitude = Altitude::ground();
    }

    /// Advances the accumulating parameters to timestamp `t`.
    ///
    /// Altitude integrates vertical speed; location integrates ground speed
    /// along the current heading. A positive vertical speed lifts a grounded
    /// aircraft into `Agl`; descending through zero AGL puts it back on the
    /// surface. Runs before maneuver advancement, so taxi animations that
    /// write absolute positions overwrite the dead-reckoned location within
    /// the same tick.
    ///
    /// # Arguments
    ///
    /// * `t` - The current tick timestamp; the integration interval is the
    ///   time since the previous call
    ///
    /// # Integration Rules
    ///
    /// ```text
    /// altitude' = altitude + vs · Δt / 60        (feet, vs in fpm)
    /// location' = location projected gs · Δt     (along the heading)
    /// ```
    ///
    /// Calling twice with the same timestamp is a no-op, which keeps
    /// repeated ticks at one instant idempotent.
    ///
    /// # Examples
    /// ```
    /// # use airtraffic_lib::aircraft::{Aircraft, AltitudeKind};
    /// # use airtraffic_lib::clock::SimTime;
    /// # use airtraffic_lib::geo::GeoPoint;
    /// let mut aircraft = Aircraft::at_gate(GeoPoint::new(32.0, 34.85));
    /// aircraft.set_vertical_speed_fpm(600.0);
    ///
    /// // One minute at 600 fpm is 600 feet, and the aircraft lifts off.
    /// aircraft.integrate_to(SimTime::from_secs(60));
    /// let altitude = aircraft.altitude();
    /// assert_eq!(altitude.kind, AltitudeKind::Agl);
    /// assert!((altitude.feet - 600.0).abs() < 1e-9);
    /// ```
    pub fn integrate_to(&mut self, t: SimTime) {
        let dt = t.duration_since(self.last_integrated);
        self.last_integrated = t;
        if dt.is_zero() {
            return;
        }

        self.integrate_altitude(dt);

        if self.ground_speed_kt > 0.0 {
            let metres = self.ground_speed_kt * KNOTS_TO_MPS * dt.as_secs_f64();
            self.location = geo::point_at_distance(self.location, self.attitude.heading, metres);
        }
    }

    fn integrate_altitude(&mut self, dt: Duration) {
        let climb_ft = self.vertical_speed_fpm * dt.as_secs_f64() / 60.0;

        match self.altitude.kind {
            AltitudeKind::Ground => {
                if self.vertical_speed_fpm > 0.0 {
                    self.altitude = Altitude::agl(climb_ft.max(0.0));
                }
            }
            AltitudeKind::Agl | AltitudeKind::Msl => {
                let feet = self.altitude.feet + climb_ft;
                if feet <= 0.0 && self.vertical_speed_fpm < 0.0 {
                    self.altitude = Altitude::ground();
                    self.vertical_speed_fpm = 0.0;
                } else {
                    self.altitude.feet = feet;
                }
            }
        }
    }
}
