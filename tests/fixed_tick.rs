// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The fixed-timestep loop under jitter and stalls, and what it means for deltas.

use smooth_canvas::interpolation::{Interpolation, ObjectId, Tick, TickScheduler};
use std::time::Duration;

const PLAYER: ObjectId = ObjectId(9);

fn draw_at(interp: &mut Interpolation, tick: Tick, x: f64) -> f64 {
    interp.set_current_tick(tick);
    let prior = interp.enter(PLAYER);
    let delta = interp.delta_x(x);
    interp.exit(prior);
    delta
}

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn jitter_is_absorbed_and_stalls_resynchronize() {
    let mut scheduler = TickScheduler::default();
    assert_eq!(scheduler.start(1_030.0), Duration::from_millis(20));
    assert_eq!(scheduler.current_tick(), 21);

    let on_time = scheduler.advance(1_052.0);
    assert_eq!(on_time.wait, Duration::from_millis(48));
    assert!(!on_time.resynced);

    //woke 30ms late; the next wait is shorter
    let late = scheduler.advance(1_130.0);
    assert_eq!(late.wait, Duration::from_millis(20));

    //400ms behind: run immediately, keep the counter
    let behind = scheduler.advance(1_600.0);
    assert_eq!(scheduler.current_tick(), 24);
    assert_eq!(behind.wait, Duration::ZERO);
    assert!(!behind.resynced);

    //a multi-second stall jumps forward instead of replaying
    let stalled = scheduler.advance(5_000.0);
    assert!(stalled.resynced);
    assert_eq!(scheduler.current_tick(), 100);
    assert_eq!(scheduler.tick_start_ms(), 5_000.0);

    let after = scheduler.advance(5_000.0);
    assert_eq!(scheduler.current_tick(), 101);
    assert_eq!(after.wait, Duration::from_millis(50));
}

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn a_resync_gap_does_not_produce_a_jump() {
    let mut scheduler = TickScheduler::default();
    let mut interp = Interpolation::new();
    scheduler.start(1_000.0);

    let mut x = 0.0;
    let mut deltas = Vec::new();
    for now in [1_000.0, 1_050.0, 1_100.0] {
        x += 5.0;
        deltas.push(draw_at(&mut interp, scheduler.current_tick(), x));
        scheduler.advance(now);
    }
    assert_eq!(deltas, vec![0.0, 5.0, 5.0]);

    //the host kept moving while we were stalled
    assert!(scheduler.advance(9_000.0).resynced);
    x += 500.0;
    assert_eq!(draw_at(&mut interp, scheduler.current_tick(), x), 0.0);
    scheduler.advance(9_000.0);
    x += 5.0;
    assert_eq!(draw_at(&mut interp, scheduler.current_tick(), x), 5.0);
}

#[cfg_attr(not(target_arch = "wasm32"), test)]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn rates_are_consistent() {
    for ups in [20, 30, 60] {
        let scheduler = TickScheduler::new(ups, 500.0);
        let one_tick_ms = scheduler.ms_per_tick();
        assert!((one_tick_ms * scheduler.interpolation_factor() - 1.0).abs() < 1e-12);
        assert!((scheduler.tick_length_secs() * 1000.0 - one_tick_ms).abs() < 1e-9);
    }
}
