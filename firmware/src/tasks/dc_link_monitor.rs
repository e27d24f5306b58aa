//! DCリンク監視タスク
//!
//! 制御タスクが測定したDCリンク電圧を監視し、過電圧/低電圧でコンバータを保護停止します。

use embassy_time::{Duration, Ticker, Timer};

use gridtie_control::config::DcLinkConfig;
use gridtie_control::dc_link::DcLinkMonitor;

use crate::state::{self, Fault, CONVERTER_ENABLE, DC_LINK_SAMPLE, DC_LINK_STATE};

/// DCリンク監視タスク
#[embassy_executor::task]
pub async fn dc_link_monitor_task(config: DcLinkConfig) {
    info!("DC-link monitor task started");

    let mut monitor = unwrap!(DcLinkMonitor::new(&config));
    info!(
        "DC-link monitor initialized: OV={}V, UV={}V",
        config.overvoltage, config.undervoltage
    );

    // 最初のサンプルでフィルタを初期化（起動時のUNDERVOLTAGE誤検出を防ぐ）
    Timer::after(Duration::from_millis(50)).await;
    let initial = *DC_LINK_SAMPLE.lock().await;
    let state = monitor.initialize(initial);
    info!(
        "Initial DC-link voltage: {}V, OV={}, UV={}",
        state.voltage, state.overvoltage, state.undervoltage
    );

    // 監視周期（10ms）
    let mut ticker = Ticker::every(Duration::from_millis(10));

    loop {
        ticker.next().await;

        let vdc = *DC_LINK_SAMPLE.lock().await;
        let state = monitor.update(vdc);

        // グローバル状態を更新（ステータスログ用）
        *DC_LINK_STATE.lock().await = state;

        // 過電圧/低電圧時はコンバータを自動停止
        if !state.is_voltage_ok() && *CONVERTER_ENABLE.lock().await {
            state::trip(Fault::DcLink).await;
        }
    }
}
