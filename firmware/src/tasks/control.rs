//! 制御タスク
//!
//! TIM1周期割り込みがセットする再計算フラグをポーリングし、
//! セットされるたびに選択モードの制御演算を1回実行します。

use embassy_futures::yield_now;

use gridtie_control::converter::Converter;

use crate::bridge::{InverterBridge, RelayOutput};
use crate::config::SNAPSHOT_DECIMATION;
use crate::inverter::ActiveConverter;
use crate::pwm_timer::CYCLE_FLAG;
use crate::sensing::GridSensing;
use crate::state::{self, Fault, CONTROL_STATUS, CONVERTER_ENABLE, DC_LINK_SAMPLE, SETPOINT};

/// 制御タスク（PWM周期ごとに1回の制御演算）
#[embassy_executor::task]
pub async fn control_task(
    mut active: ActiveConverter,
    mut sensing: GridSensing,
    mut bridge: InverterBridge,
    mut relay: RelayOutput,
) {
    info!("Control task started");

    let mut was_enabled = false;
    let mut applied_setpoint = f32::NAN;
    let mut decimation = 0u32;

    loop {
        // 1. 周期フラグ待ち（ブロックせず他タスクに譲る）
        if !CYCLE_FLAG.take() {
            yield_now().await;
            continue;
        }

        // 2. 測定（停止中もDCリンク監視用に継続）
        let measurements = sensing.read();
        decimation += 1;
        let publish = decimation >= SNAPSHOT_DECIMATION;
        if publish {
            decimation = 0;
            *DC_LINK_SAMPLE.lock().await = measurements.vdc;
        }

        // 3. 使能チェック
        let enabled = *CONVERTER_ENABLE.lock().await;
        if !enabled {
            // 状態が変化した場合のみ停止処理
            if was_enabled {
                info!("Control loop: parking outputs");
                bridge.park();
                active.as_converter().reset(&mut relay);
                was_enabled = false;
            }
            continue;
        }

        if !was_enabled {
            info!("Control loop: starting {:?}", active.as_converter().mode());
            // 停止中の周期取りこぼしは故障扱いしない
            CYCLE_FLAG.clear_overruns();
            bridge.enable();
            was_enabled = true;
        }

        // 4. セットポイント反映（変化時のみ）
        let setpoint = *SETPOINT.lock().await;
        if setpoint != applied_setpoint {
            active.apply_setpoint(setpoint);
            applied_setpoint = setpoint;
        }

        // 5. 制御演算 → PWM出力
        let converter = active.as_converter();
        converter.run_cycle(&measurements, &mut bridge, &mut relay);

        // 6. 周期超過チェック（ハードデッドライン）
        //    演算中に次周期の割り込みが来ていれば超過
        CYCLE_FLAG.finish_pass();
        let overruns = CYCLE_FLAG.overruns();
        if overruns > 0 {
            error!("Control deadline missed ({} periods)", overruns);
            bridge.park();
            converter.reset(&mut relay);
            was_enabled = false;
            state::trip(Fault::DeadlineOverrun).await;
            CYCLE_FLAG.clear_overruns();
            continue;
        }

        // 7. ステータス用スナップショット（間引き更新）
        if publish {
            *CONTROL_STATUS.lock().await = Some(converter.snapshot());
        }
    }
}
