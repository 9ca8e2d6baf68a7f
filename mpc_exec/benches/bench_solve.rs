//! # Horizon Solve Benchmark
//!
//! One full solve of the straight-line-from-rest scenario. The controller
//! budgets 0.05 s of wall clock per solve, so anything near that figure here
//! is a regression.

use criterion::{criterion_group, criterion_main, Criterion};

use mpc_lib::mpc_ctrl::{InputData, MpcCtrl, Params};
use util::module::State;
use util::session::Session;

fn solve_benchmark(c: &mut Criterion) {
    let session =
        Session::new("bench_solve", "target/bench_sessions").expect("session creation failed");

    let mut mpc = MpcCtrl::default();
    mpc.init(Params::default(), &session)
        .expect("MpcCtrl init failed");

    let input = InputData {
        state: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        coeffs: [0.0; 4],
    };

    c.bench_function("straight_line_solve", |b| {
        b.iter(|| mpc.proc(&input).expect("proc failed"))
    });
}

criterion_group!(benches, solve_benchmark);
criterion_main!(benches);
