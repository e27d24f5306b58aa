//! ベンチマークモジュール
//!
//! 制御演算1回あたりのサイクル数をDWTで測定し、PWM周期の予算と比較します。

use core::f32::consts::TAU;

use cortex_m::peripheral::DWT;
use gridtie_control::config::{DEFAULT_GRID_FREQUENCY, DEFAULT_V_DC_LINK};
use gridtie_control::control::{ThreePhase, Trigno, PHASE_SHIFT};
use gridtie_control::converter::{Converter, GridRelay};
use gridtie_control::{ControlMode, Measurements};
use libm::sinf;

use crate::inverter::ActiveConverter;

/// システムクロック [Hz]
const SYSCLK_HZ: u32 = 170_000_000;

/// ベンチマーク中のリレー出力（実リレーは操作しない）
struct NullRelay;

impl GridRelay for NullRelay {
    fn set_grid_relay(&mut self, _closed: bool) {}
}

/// DWTサイクルカウンタを有効化
///
/// # Safety
/// Cortex-Mペリフェラルへの直接アクセスを含む
pub unsafe fn enable_cycle_counter() {
    let mut cp = cortex_m::Peripherals::steal();
    cp.DCB.enable_trace();
    cp.DWT.enable_cycle_counter();
}

/// 定格周波数・325Vピークの模擬系統サンプル
fn synthetic_sample(k: u32, sample_rate: f32) -> Measurements {
    let angle = TAU * DEFAULT_GRID_FREQUENCY * k as f32 / sample_rate;
    Measurements {
        voltage: ThreePhase::new(
            325.0 * sinf(angle),
            325.0 * sinf(angle - PHASE_SHIFT),
            325.0 * sinf(angle + PHASE_SHIFT),
        ),
        current: ThreePhase::default(),
        vdc: DEFAULT_V_DC_LINK,
    }
}

/// Trigno::new()（idsp）とTrigno::exact()（libm）の比較
pub fn run_trig_benchmark(iterations: u32) {
    info!("Running Trigno benchmark...");

    let mut acc_fast = 0.0f32;
    let start = DWT::cycle_count();
    for i in 0..iterations {
        acc_fast += Trigno::new(i as f32 * 0.001).sin_minus;
    }
    let ticks_fast = DWT::cycle_count().wrapping_sub(start);

    let mut acc_exact = 0.0f32;
    let start = DWT::cycle_count();
    for i in 0..iterations {
        acc_exact += Trigno::exact(i as f32 * 0.001).sin_minus;
    }
    let ticks_exact = DWT::cycle_count().wrapping_sub(start);

    info!("Trigno results ({} iterations):", iterations);
    info!("  Trigno::new (idsp):   {} cycles/call", ticks_fast / iterations);
    info!("  Trigno::exact (libm): {} cycles/call", ticks_exact / iterations);
    info!("  Accumulated error: {}", acc_fast - acc_exact);
}

/// 選択モードの制御演算1回あたりのコストを測定
///
/// # 引数
/// * `mode` - 測定する制御モード
/// * `iterations` - 実行回数（PLLロック後の区間も含むよう十分大きく）
/// * `sample_rate` - 制御周波数 [Hz]
pub fn run_control_benchmark(mode: ControlMode, iterations: u32, sample_rate: u32) {
    info!("Running control pass benchmark ({:?})...", mode);

    let mut active = match ActiveConverter::new(mode) {
        Ok(active) => active,
        Err(e) => {
            error!("Benchmark skipped: {:?}", e);
            return;
        }
    };
    let converter = active.as_converter();
    let mut relay = NullRelay;

    let mut worst = 0u32;
    let mut total = 0u32;
    for k in 0..iterations {
        let sample = synthetic_sample(k, sample_rate as f32);
        let start = DWT::cycle_count();
        converter.step(&sample, &mut relay);
        let ticks = DWT::cycle_count().wrapping_sub(start);
        total = total.wrapping_add(ticks);
        worst = worst.max(ticks);
    }

    let budget = SYSCLK_HZ / sample_rate;
    let snapshot = converter.snapshot();
    info!("Control pass results ({} iterations):", iterations);
    info!("  Average: {} cycles, worst: {} cycles", total / iterations, worst);
    info!(
        "  Budget: {} cycles/period, worst case uses {}%",
        budget,
        worst * 100 / budget
    );
    info!("  Final PLL status: {:?}", snapshot.pll_status);
}
