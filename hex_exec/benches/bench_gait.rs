//! # Gait Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use hex_lib::{
    gait::{create_gait, GaitKind, GaitParams, NamedDirection},
    geometry::Vector3D,
    robot::{HexapodParams, Leg, LegPositions, NUM_LEGS},
};

fn gait_benchmark(c: &mut Criterion) {
    // ---- Build a leg from the default geometry ----

    let params = HexapodParams::default();
    let leg = Leg::new(
        &params.legs[0],
        &params.coxa,
        &params.femur,
        &params.tibia,
        params.coxa_z_offset_mm,
    );

    let target = Vector3D::new(12.0, -8.0, 5.0);

    c.bench_function("Leg::solve", |b| {
        b.iter(|| leg.solve(black_box(&target)).unwrap())
    });

    // ---- Plan full phases from the neutral stance ----

    let positions: LegPositions = [Vector3D::zeros(); NUM_LEGS];

    for kind in [GaitKind::Tripod, GaitKind::Wave].iter() {
        let mut gait = create_gait(*kind, GaitParams::default());
        gait.set_direction(NamedDirection::DiagonalFr.into(), 0.0);

        let state = gait.get_state(gait.initial_phase()).unwrap();

        c.bench_function(&format!("GaitCore::plan_phase::{}", gait.name()), |b| {
            b.iter(|| {
                gait.core_mut()
                    .plan_phase(black_box(&positions), &state)
                    .unwrap()
            })
        });
    }
}

criterion_group!(benches, gait_benchmark);
criterion_main!(benches);
