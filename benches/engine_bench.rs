//! Advance-loop benchmarks: how fast the engine pushes ticks through wide
//! and deep maneuver trees.

use airtraffic_lib::aircraft::Aircraft;
use airtraffic_lib::clock::SimTime;
use airtraffic_lib::comms::RadioNet;
use airtraffic_lib::flight::{ClearanceStore, FlightCtx, FlightId, PilotCaches};
use airtraffic_lib::geo::GeoPoint;
use airtraffic_lib::maneuver::{ManeuverArena, ManeuverId, ManeuverTag};
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use std::time::Duration;

struct Fixture {
    arena: ManeuverArena,
    root: ManeuverId,
    aircraft: Aircraft,
    clearances: ClearanceStore,
    caches: PilotCaches,
    radio: RadioNet,
}

/// A parallel of `width` sequences, each a delay followed by an animation.
fn build_fixture(width: usize) -> Fixture {
    let mut arena = ManeuverArena::new();
    let mut legs = Vec::with_capacity(width);
    for i in 0..width {
        let delay = arena.delay(Duration::from_secs((i % 7) as u64));
        let anim = arena.animation(
            "",
            0.0,
            100.0,
            Duration::from_secs(30),
            |ctx, value, _p| ctx.aircraft.set_ground_speed_kt(value),
        );
        legs.push(arena.sequence(ManeuverTag::Unspecified, "", vec![delay, anim]));
    }
    let root = arena.parallel(ManeuverTag::Unspecified, "", legs);

    Fixture {
        arena,
        root,
        aircraft: Aircraft::at_gate(GeoPoint::new(32.0, 34.85)),
        clearances: ClearanceStore::default(),
        caches: PilotCaches::default(),
        radio: RadioNet::new(),
    }
}

fn run_ticks(fixture: &mut Fixture, ticks: u64) {
    for secs in 0..ticks {
        let t = SimTime::from_secs(secs);
        let mut ctx = FlightCtx {
            flight_id: FlightId(1),
            call_sign: "BENCH",
            now: t,
            last_received_intent_id: 0,
            aircraft: &mut fixture.aircraft,
            clearances: &mut fixture.clearances,
            caches: &mut fixture.caches,
            radio: &mut fixture.radio,
        };
        fixture
            .arena
            .progress_to(fixture.root, t, &mut ctx)
            .expect("bench tree cannot fail");
    }
}

fn bench_wide_tree(c: &mut Criterion) {
    c.bench_function("tick_parallel_200_legs_40_ticks", |b| {
        b.iter_batched(
            || build_fixture(200),
            |mut fixture| run_ticks(&mut fixture, 40),
            BatchSize::SmallInput,
        )
    });
}

fn bench_instant_cascade(c: &mut Criterion) {
    c.bench_function("tick_sequential_1000_instants", |b| {
        b.iter_batched(
            || {
                let mut arena = ManeuverArena::new();
                let steps: Vec<ManeuverId> = (0..1000)
                    .map(|_| arena.instant_action(|_ctx| {}))
                    .collect();
                let root = arena.sequence(ManeuverTag::Unspecified, "", steps);
                let mut fixture = build_fixture(1);
                fixture.arena = arena;
                fixture.root = root;
                fixture
            },
            // The whole chain cascades within a single tick.
            |mut fixture| run_ticks(&mut fixture, 1),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_wide_tree, bench_instant_cascade);
criterion_main!(benches);
