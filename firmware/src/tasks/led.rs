//! LED制御タスク
//!
//! 運転状態をLEDで表示します。
//! - LED1: 点滅 = 停止中、点灯 = 運転中
//! - LED2: 点滅 = PLL同期待ち、点灯 = 系統リレー投入
//! - LED3: 点灯 = 保護停止あり

use embassy_stm32::gpio::Output;
use embassy_time::{Duration, Timer};

use gridtie_control::control::PllStatus;

use crate::state::{CONTROL_STATUS, CONVERTER_ENABLE, LAST_FAULT};

/// LED制御タスク（250ms周期）
#[embassy_executor::task]
pub async fn led_task(
    mut led1: Output<'static>,
    mut led2: Output<'static>,
    mut led3: Output<'static>,
) {
    info!("LED task started");

    let mut blink = false;
    loop {
        blink = !blink;

        let enabled = *CONVERTER_ENABLE.lock().await;
        let status = *CONTROL_STATUS.lock().await;
        let faulted = LAST_FAULT.lock().await.is_some();

        if enabled || blink {
            led1.set_high();
        } else {
            led1.set_low();
        }

        match status {
            Some(s) if enabled && s.relay_closed => led2.set_high(),
            Some(s) if enabled && s.pll_status == Some(PllStatus::Pending) && blink => {
                led2.set_high()
            }
            _ => led2.set_low(),
        }

        if faulted {
            led3.set_high();
        } else {
            led3.set_low();
        }

        Timer::after(Duration::from_millis(250)).await;
    }
}
