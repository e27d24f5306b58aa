//! ステータスログタスク
//!
//! 1秒ごとに制御状態とDCリンク状態をログ出力します。

use embassy_time::{Duration, Ticker};

use crate::pwm_timer::CYCLE_FLAG;
use crate::state::{CONTROL_STATUS, CONVERTER_ENABLE, DC_LINK_STATE, LAST_FAULT, SETPOINT};

#[embassy_executor::task]
pub async fn status_task() {
    let mut ticker = Ticker::every(Duration::from_secs(1));

    loop {
        ticker.next().await;

        let enabled = *CONVERTER_ENABLE.lock().await;
        let dc_link = *DC_LINK_STATE.lock().await;
        let fault = *LAST_FAULT.lock().await;
        let setpoint = *SETPOINT.lock().await;

        info!(
            "[Status] enabled={}, setpoint={}, Vdc={}V (OV={}, UV={}), fault={:?}, overruns={}",
            enabled,
            setpoint,
            dc_link.voltage,
            dc_link.overvoltage,
            dc_link.undervoltage,
            fault,
            CYCLE_FLAG.overruns()
        );

        if !enabled {
            continue;
        }
        if let Some(s) = *CONTROL_STATUS.lock().await {
            info!(
                "[Control] mode={:?}, pll={:?}, f={}Hz, theta={}, grid d/q={}/{}, i d/q={}/{}, m={}, relay={}",
                s.mode,
                s.pll_status,
                s.frequency,
                s.theta,
                s.grid_dq.d,
                s.grid_dq.q,
                s.current_dq.d,
                s.current_dq.q,
                s.modulation_index,
                s.relay_closed
            );
        }
    }
}
