//! グローバル共有状態管理
//!
//! タスク間で共有される状態をMutexで保護して管理します。
//! 制御コアのレコード（PLL、PI、フィルタ）は制御タスクが専有し、ここには置きません。

use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::mutex::Mutex;

use gridtie_control::dc_link::DcLinkState;
use gridtie_control::ControlSnapshot;

use crate::config::{DEFAULT_ENABLE, DEFAULT_SETPOINT};

/// 保護停止の要因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// 制御演算が1周期内に完了しなかった
    DeadlineOverrun,
    /// DCリンク過電圧/低電圧
    DcLink,
}

/// コンバータ有効/無効フラグ
pub static CONVERTER_ENABLE: Mutex<ThreadModeRawMutex, bool> = Mutex::new(DEFAULT_ENABLE);

/// モード依存のセットポイント（電流制御: 有効電流 [A]、V/f: 要求周波数 [Hz]）
pub static SETPOINT: Mutex<ThreadModeRawMutex, f32> = Mutex::new(DEFAULT_SETPOINT);

/// 制御状態のスナップショット（ステータスログ用、間引き更新）
pub static CONTROL_STATUS: Mutex<ThreadModeRawMutex, Option<ControlSnapshot>> = Mutex::new(None);

/// 制御タスクが測定した最新のDCリンク電圧 [V]（間引き更新）
pub static DC_LINK_SAMPLE: Mutex<ThreadModeRawMutex, f32> = Mutex::new(0.0);

/// DCリンク監視ステータス
pub static DC_LINK_STATE: Mutex<ThreadModeRawMutex, DcLinkState> = Mutex::new(DcLinkState::new());

/// 最後に発生した保護停止の要因
pub static LAST_FAULT: Mutex<ThreadModeRawMutex, Option<Fault>> = Mutex::new(None);

/// 保護停止: コンバータを無効化して要因を記録
pub async fn trip(fault: Fault) {
    let mut enable = CONVERTER_ENABLE.lock().await;
    if *enable {
        error!("Converter tripped: {:?}", fault);
        *enable = false;
    }
    *LAST_FAULT.lock().await = Some(fault);
}
