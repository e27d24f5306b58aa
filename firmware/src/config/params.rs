//! インバータ・ハードウェアの設定パラメータ
//!
//! 制御アルゴリズムのパラメータ（PLLゲイン、ロック判定しきい値など）は
//! `gridtie_control::config` 側のデフォルトを使用します。

use gridtie_control::ControlMode;

/// 起動時の制御モード
pub const DEFAULT_CONTROL_MODE: ControlMode = ControlMode::CurrentControl;

/// 起動時のセットポイント
/// 電流制御: 有効電流指令 [A]、V/f: 要求周波数 [Hz]
pub const DEFAULT_SETPOINT: f32 = 0.0;

/// 起動時にコンバータを有効化するか
pub const DEFAULT_ENABLE: bool = false;

/// ステータススナップショットの更新間隔 [制御周期]（20kHz → 10ms）
pub const SNAPSHOT_DECIMATION: u32 = 200;

/// PWM設定
pub mod pwm {
    use embassy_stm32::time::Hertz;

    /// PWM周波数（20kHz）= 制御周期
    /// センターアラインドモードでも1周期1回の制御更新
    pub const DEFAULT_FREQUENCY: Hertz = Hertz(20_000);

    /// デッドタイム [タイマークロック]（170MHz → 約1μs）
    pub const DEFAULT_DEAD_TIME: u16 = 170;

    /// 周期割り込み優先度（Embassyタスクより高優先度）
    pub const UPDATE_IRQ_PRIORITY: u8 = 0x10;
}

/// ADC・センサー設定
pub mod sensing {
    /// ADC分解能（12ビット = 4096）
    pub const ADC_MAX: f32 = 4096.0;
    /// ADC基準電圧 [V]
    pub const VREF: f32 = 3.3;
    /// 交流センサーのオフセット電圧 [V]（両極性信号をVREF/2中心で入力）
    pub const AC_OFFSET: f32 = 1.65;

    /// 系統電圧センサーゲイン [V/V]（±412V → ±1.65V）
    pub const GRID_VOLTAGE_GAIN: f32 = 250.0;
    /// 電流センサーゲイン [A/V]（±33A → ±1.65V）
    pub const CURRENT_GAIN: f32 = 20.0;

    /// DCリンク分圧抵抗の上側 [Ω]
    pub const DC_LINK_R_UPPER: f32 = 1_000_000.0;
    /// DCリンク分圧抵抗の下側 [Ω]
    pub const DC_LINK_R_LOWER: f32 = 3_900.0;
}
