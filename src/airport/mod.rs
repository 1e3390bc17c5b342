//! # Airport Module - Ground Geometry and Services
//!
//! The airport as the pilot scripts consume it: runways with two named
//! ends, parking stands, controller frequencies and a taxi net of edges
//! between geodesic points. The maneuver engine itself never looks inside
//! these types; they exist so taxi clearances can carry real paths and so
//! hold-short edges can be recognised while taxiing.
//!
//! The taxi net is a flat edge list. Nodes are implied by shared endpoints
//! (quantized to roughly one metre), and routing is a breadth-first search
//! over that implied graph. Airports here are small fixtures, so shortest
//! edge count is a perfectly good notion of "shortest".
//!
//! ## Submodules
//!
//! - [`tests`]: Unit tests for routing, hold-short lookup and exit paths


use crate::error::SimError;
use crate::geo::{self, GeoPoint};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// One directional end of a runway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunwayEnd {
    pub name: String,
    /// Magnetic heading of departures and arrivals using this end
    pub heading: f64,
    pub threshold: GeoPoint,
}

/// A runway with its two ends and a bit position for active-zone masks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Runway {
    pub end1: RunwayEnd,
    pub end2: RunwayEnd,
    pub length_m: f64,
    pub mask_bit: u32,
}

impl Runway {
    pub fn end_named(&self, name: &str) -> Option<&RunwayEnd> {
        if self.end1.name == name {
            Some(&self.end1)
        } else if self.end2.name == name {
            Some(&self.end2)
        } else {
            None
        }
    }

    /// Signed along-track distance of `p` from this end's threshold, in
    /// metres, positive in the landing direction.
    pub fn along_track_m(end: &RunwayEnd, p: GeoPoint) -> f64 {
        let dist = geo::distance_metres(end.threshold, p);
        let bearing = geo::heading_from_points(end.threshold, p);
        dist * geo::turn_degrees(end.heading, bearing).to_radians().cos()
    }

    /// Perpendicular offset of `p` from the extended centerline, metres.
    pub fn cross_track_m(end: &RunwayEnd, p: GeoPoint) -> f64 {
        let dist = geo::distance_metres(end.threshold, p);
        let bearing = geo::heading_from_points(end.threshold, p);
        (dist * geo::turn_degrees(end.heading, bearing).to_radians().sin()).abs()
    }
}

/// Set of runways an edge is active for, one bit per runway.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunwayMask(u32);

impl RunwayMask {
    pub fn from_bits(bits: u32) -> Self {
        RunwayMask(bits)
    }

    pub fn with(mut self, runway: &Runway) -> Self {
        self.0 |= 1 << runway.mask_bit;
        self
    }

    pub fn has(&self, runway: &Runway) -> bool {
        self.0 & (1 << runway.mask_bit) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Active-zone flags on a taxi edge, split by what the zone protects.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveZones {
    pub departure: RunwayMask,
    pub arrival: RunwayMask,
    pub ils: RunwayMask,
}

impl ActiveZones {
    pub fn is_empty(&self) -> bool {
        self.departure.is_empty() && self.arrival.is_empty() && self.ils.is_empty()
    }

    /// True if any zone covers `runway`.
    pub fn covers(&self, runway: &Runway) -> bool {
        self.departure.has(runway) || self.arrival.has(runway) || self.ils.has(runway)
    }
}

/// A single taxi-net segment between two geodesic points.
///
/// Edges flagged with non-empty [`ActiveZones`] are hold-short boundaries:
/// entering one requires a clearance, and the taxi maneuver interrupts
/// itself there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxiEdge {
    pub id: u32,
    pub name: String,
    pub node1: GeoPoint,
    pub node2: GeoPoint,
    pub active_zones: ActiveZones,
}

impl TaxiEdge {
    pub fn new(id: u32, name: &str, node1: GeoPoint, node2: GeoPoint) -> Self {
        TaxiEdge {
            id,
            name: name.to_string(),
            node1,
            node2,
            active_zones: ActiveZones::default(),
        }
    }

    pub fn with_active_zones(mut self, zones: ActiveZones) -> Self {
        self.active_zones = zones;
        self
    }

    pub fn is_hold_short(&self) -> bool {
        !self.active_zones.is_empty()
    }

    pub fn length_m(&self) -> f64 {
        geo::distance_metres(self.node1, self.node2)
    }

    /// Travel heading when traversing node1 to node2.
    pub fn heading(&self) -> f64 {
        geo::heading_from_points(self.node1, self.node2)
    }

    /// The same segment traversed the other way.
    pub fn reversed(&self) -> TaxiEdge {
        TaxiEdge {
            id: self.id,
            name: self.name.clone(),
            node1: self.node2,
            node2: self.node1,
            active_zones: self.active_zones,
        }
    }
}

/// An ordered sequence of taxi edges, oriented in travel direction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaxiPath {
    pub edges: Vec<TaxiEdge>,
}

impl TaxiPath {
    pub fn new(edges: Vec<TaxiEdge>) -> Self {
        TaxiPath { edges }
    }

    pub fn start(&self) -> Option<GeoPoint> {
        self.edges.first().map(|e| e.node1)
    }

    pub fn end(&self) -> Option<GeoPoint> {
        self.edges.last().map(|e| e.node2)
    }

    /// Extends the path with a straight segment to `point`. Used to append
    /// line-up geometry past the hold-short point.
    pub fn append_edge_to(&mut self, point: GeoPoint) {
        let from = self.end().unwrap_or(point);
        let id = self.edges.last().map(|e| e.id + 1).unwrap_or(0);
        self.edges.push(TaxiEdge::new(id, "", from, point));
    }

    pub fn total_length_m(&self) -> f64 {
        self.edges.iter().map(|e| e.length_m()).sum()
    }
}

impl fmt::Display for TaxiPath {
    /// Human-friendly route string: named edges in order, deduplicated.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut last = "";
        let mut first = true;
        for edge in &self.edges {
            if edge.name.is_empty() || edge.name == last {
                continue;
            }
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}", edge.name)?;
            last = &edge.name;
            first = false;
        }
        Ok(())
    }
}

/// Quantization key used to merge endpoints into graph nodes.
fn node_key(p: GeoPoint) -> (i64, i64) {
    ((p.latitude * 1e5).round() as i64, (p.longitude * 1e5).round() as i64)
}

/// The airport taxi graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaxiNet {
    pub edges: Vec<TaxiEdge>,
}

impl TaxiNet {
    pub fn new(edges: Vec<TaxiEdge>) -> Self {
        TaxiNet { edges }
    }

    fn nearest_node(&self, p: GeoPoint, max_m: f64) -> Option<GeoPoint> {
        self.edges
            .iter()
            .flat_map(|e| [e.node1, e.node2])
            .map(|n| (geo::distance_metres(p, n), n))
            .filter(|(d, _)| *d <= max_m)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, n)| n)
    }

    /// Shortest route between the net nodes nearest to `from` and `to`,
    /// fewest edges first. Edges in the result are oriented in travel
    /// direction. Returns `None` when either endpoint is off the net or no
    /// route connects them.
    pub fn find_path(&self, from: GeoPoint, to: GeoPoint) -> Option<TaxiPath> {
        let start = self.nearest_node(from, 400.0)?;
        let goal = self.nearest_node(to, 400.0)?;
        if node_key(start) == node_key(goal) {
            return Some(TaxiPath::default());
        }

        // Parent map records the oriented edge used to reach each node.
        let mut parents: HashMap<(i64, i64), TaxiEdge> = HashMap::new();
        let mut queue = VecDeque::from([start]);
        parents.insert(node_key(start), TaxiEdge::new(u32::MAX, "", start, start));

        while let Some(node) = queue.pop_front() {
            if node_key(node) == node_key(goal) {
                break;
            }
            for edge in &self.edges {
                let oriented = if node_key(edge.node1) == node_key(node) {
                    edge.clone()
                } else if node_key(edge.node2) == node_key(node) {
                    edge.reversed()
                } else {
                    continue;
                };
                let next = node_key(oriented.node2);
                if !parents.contains_key(&next) {
                    parents.insert(next, oriented.clone());
                    queue.push_back(oriented.node2);
                }
            }
        }

        if !parents.contains_key(&node_key(goal)) {
            return None;
        }

        let mut route = Vec::new();
        let mut cursor = goal;
        while node_key(cursor) != node_key(start) {
            let edge = parents.get(&node_key(cursor))?.clone();
            cursor = edge.node1;
            route.push(edge);
        }
        route.reverse();
        Some(TaxiPath::new(route))
    }

    /// Finds a runway-exit route for an arrival that has rolled out to
    /// `from`: the nearest off-runway edge ahead of the aircraft, followed
    /// by the taxi route from that edge to `gate`.
    ///
    /// Returns `None` when no exit lies ahead; the caller substitutes the
    /// teleport recovery in that case.
    pub fn find_exit_path(
        &self,
        end: &RunwayEnd,
        gate: GeoPoint,
        from: GeoPoint,
    ) -> Option<TaxiPath> {
        let along_from = Runway::along_track_m(end, from);

        // Candidate exits: edges leaving the runway surface ahead of the
        // roll-out point.
        let mut exits: Vec<TaxiEdge> = Vec::new();
        for edge in &self.edges {
            for oriented in [edge.clone(), edge.reversed()] {
                let on_runway = Runway::cross_track_m(end, oriented.node1) < 40.0;
                let leads_away = Runway::cross_track_m(end, oriented.node2) > 60.0;
                let ahead = Runway::along_track_m(end, oriented.node1) > along_from - 1.0;
                if on_runway && leads_away && ahead {
                    exits.push(oriented);
                }
            }
        }
        let exit = exits.into_iter().min_by(|a, b| {
            Runway::along_track_m(end, a.node1).total_cmp(&Runway::along_track_m(end, b.node1))
        })?;

        // Roll the remaining runway distance before the turn-off so the
        // path is continuous from where the aircraft actually stopped.
        let mut edges = Vec::new();
        if geo::distance_metres(from, exit.node1) > 2.0 {
            edges.push(TaxiEdge::new(0, "", from, exit.node1));
        }
        edges.push(exit.clone());
        let mut path = TaxiPath::new(edges);
        if let Some(rest) = self.find_path(exit.node2, gate) {
            path.edges.extend(rest.edges);
        }
        Some(path)
    }
}

/// A named parking position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParkingStand {
    pub name: String,
    pub location: GeoPoint,
}

/// Controller frequencies for a single-sector airport, in kHz.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AirportFrequencies {
    pub clearance_delivery_khz: u32,
    pub ground_khz: u32,
    pub tower_khz: u32,
    pub departure_khz: u32,
}

/// An airport: runways, stands, frequencies and the taxi net.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Airport {
    pub icao: String,
    pub runways: Vec<Runway>,
    pub stands: Vec<ParkingStand>,
    pub taxi_net: TaxiNet,
    pub frequencies: AirportFrequencies,
}

impl Airport {
    pub fn runway_with_end(&self, end_name: &str) -> Result<&Runway, SimError> {
        self.runways
            .iter()
            .find(|r| r.end_named(end_name).is_some())
            .ok_or_else(|| SimError::UnknownRunway(end_name.to_string()))
    }

    pub fn end_or_err(&self, end_name: &str) -> Result<&RunwayEnd, SimError> {
        self.runway_with_end(end_name)?
            .end_named(end_name)
            .ok_or_else(|| SimError::UnknownRunway(end_name.to_string()))
    }

    pub fn stand_or_err(&self, name: &str) -> Result<&ParkingStand, SimError> {
        self.stands
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| SimError::UnknownStand(name.to_string()))
    }

    /// Runway covered by an active-zone edge, if any. Logged and used to
    /// name the runway in hold-short read-backs.
    pub fn active_zone_runway(&self, edge: &TaxiEdge) -> Option<&Runway> {
        self.runways.iter().find(|r| edge.active_zones.covers(r))
    }

    /// Ground frequency serving `_location`. Single sector for now, the
    /// location parameter keeps the call shape of multi-sector fields.
    pub fn ground_at(&self, _location: GeoPoint) -> u32 {
        self.frequencies.ground_khz
    }

    pub fn clearance_delivery_at(&self, _location: GeoPoint) -> u32 {
        self.frequencies.clearance_delivery_khz
    }

    pub fn tower_khz(&self) -> u32 {
        self.frequencies.tower_khz
    }
}

/// Builds the test airport used by scenarios, benches and the integration
/// suite: one runway 09/27, a south apron with departure gates, a north
/// stand whose route must cross the runway, and a high-speed exit east of
/// the touchdown zone.
pub fn demo_airport() -> Airport {
    let base = GeoPoint::new(32.0, 34.85);
    let east = |m: f64| geo::point_at_distance(base, 90.0, m);
    let offset = |p: GeoPoint, heading: f64, m: f64| geo::point_at_distance(p, heading, m);

    let end09 = RunwayEnd {
        name: "09".to_string(),
        heading: 90.0,
        threshold: base,
    };
    let end27 = RunwayEnd {
        name: "27".to_string(),
        heading: 270.0,
        threshold: east(3000.0),
    };
    let runway = Runway {
        end1: end09,
        end2: end27,
        length_m: 3000.0,
        mask_bit: 0,
    };
    // The runway entry is a departure active zone; the mid-field crossing
    // protects arrivals and the ILS critical area instead. The distinction
    // is what tells a taxiing departure whether a boundary means "line up
    // here" or "wait to cross".
    let entry_zones = ActiveZones {
        departure: RunwayMask::default().with(&runway),
        arrival: RunwayMask::default().with(&runway),
        ils: RunwayMask::default(),
    };
    let crossing_zones = ActiveZones {
        departure: RunwayMask::default(),
        arrival: RunwayMask::default().with(&runway),
        ils: RunwayMask::default().with(&runway),
    };

    // South side: gates G1/G2, apron links, taxiway A, hold-short H1 at
    // the 09 entry, high-speed exit E1 at 2200 m.
    let g1 = offset(east(100.0), 180.0, 300.0);
    let g2 = offset(east(200.0), 180.0, 300.0);
    let a0 = offset(east(100.0), 180.0, 150.0);
    let a0b = offset(east(200.0), 180.0, 150.0);
    let a1 = offset(base, 180.0, 150.0);
    let h1 = offset(base, 180.0, 30.0);
    let a_mid = offset(east(1000.0), 180.0, 150.0);
    let a2 = offset(east(2200.0), 180.0, 150.0);
    let r_exit = east(2200.0);

    // North side: stand N1 with a crossing route over the runway.
    let gn1 = offset(east(1000.0), 0.0, 300.0);
    let n1 = offset(east(1000.0), 0.0, 150.0);
    let hn = offset(east(1000.0), 0.0, 30.0);
    let hs = offset(east(1000.0), 180.0, 30.0);

    let edges = vec![
        TaxiEdge::new(1, "G1", g1, a0),
        TaxiEdge::new(2, "G2", g2, a0b),
        TaxiEdge::new(3, "A", a0b, a0),
        TaxiEdge::new(4, "A", a0, a1),
        TaxiEdge::new(5, "A1", a1, h1).with_active_zones(entry_zones),
        TaxiEdge::new(6, "A", a_mid, a0),
        TaxiEdge::new(7, "A", a2, a_mid),
        TaxiEdge::new(8, "E1", r_exit, a2),
        TaxiEdge::new(9, "N1", gn1, n1),
        TaxiEdge::new(10, "X1", n1, hn).with_active_zones(crossing_zones),
        TaxiEdge::new(11, "X1", hn, hs).with_active_zones(crossing_zones),
        TaxiEdge::new(12, "X1", hs, a_mid).with_active_zones(crossing_zones),
    ];

    Airport {
        icao: "TSTA".to_string(),
        runways: vec![runway],
        stands: vec![
            ParkingStand {
                name: "G1".to_string(),
                location: g1,
            },
            ParkingStand {
                name: "G2".to_string(),
                location: g2,
            },
            ParkingStand {
                name: "N1".to_string(),
                location: gn1,
            },
        ],
        taxi_net: TaxiNet::new(edges),
        frequencies: AirportFrequencies {
            clearance_delivery_khz: 121_920,
            ground_khz: 121_900,
            tower_khz: 118_700,
            departure_khz: 124_350,
        },
    }
}
