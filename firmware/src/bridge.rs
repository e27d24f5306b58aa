//! インバータブリッジとグリッドリレーのドライバ
//!
//! 制御コアの[`PwmLegs`]/[`GridRelay`]トレイトをSTM32ペリフェラル上に実装します。

use embassy_stm32::{
    gpio::Output,
    peripherals,
    timer::{complementary_pwm::ComplementaryPwm, Channel},
};
use gridtie_control::control::Duties;
use gridtie_control::{GridRelay, PwmLegs};

const CHANNELS: [Channel; 3] = [Channel::Ch1, Channel::Ch2, Channel::Ch3];

/// 3相インバータブリッジ
///
/// TIM1のComplementaryPwm（CH1-3 + 相補出力）で3レグを駆動します。
pub struct InverterBridge {
    pwm: ComplementaryPwm<'static, peripherals::TIM1>,
    max_duty: u16,
    enabled: bool,
}

impl InverterBridge {
    /// 新しいブリッジドライバを作成（出力は無効状態）
    ///
    /// # 引数
    /// * `pwm` - PWMペリフェラル（TIM1）
    pub fn new(pwm: ComplementaryPwm<'static, peripherals::TIM1>) -> Self {
        let max_duty = pwm.get_max_duty();
        let mut bridge = Self {
            pwm,
            max_duty,
            enabled: true,
        };
        bridge.park();
        bridge
    }

    /// PWMの最大Duty値を取得
    pub fn max_duty(&self) -> u16 {
        self.max_duty
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 全チャネルを中立Duty（0.5）で有効化
    pub fn enable(&mut self) {
        if self.enabled {
            return;
        }
        self.write(&Duties::NEUTRAL);
        for channel in CHANNELS {
            self.pwm.enable(channel);
        }
        self.enabled = true;
    }

    /// 中立Dutyにしてから全チャネルを無効化
    pub fn park(&mut self) {
        self.write(&Duties::NEUTRAL);
        if !self.enabled {
            return;
        }
        for channel in CHANNELS {
            self.pwm.disable(channel);
        }
        self.enabled = false;
    }

    fn write(&mut self, duties: &Duties) {
        let compare = duties.to_compare(self.max_duty);
        for (channel, duty) in CHANNELS.into_iter().zip(compare) {
            self.pwm.set_duty(channel, duty);
        }
    }
}

impl PwmLegs for InverterBridge {
    fn set_duties(&mut self, duties: &Duties) {
        self.write(duties);
    }
}

/// 系統連系リレー出力（High = 投入）
pub struct RelayOutput {
    pin: Output<'static>,
}

impl RelayOutput {
    /// 開放状態で初期化
    pub fn new(mut pin: Output<'static>) -> Self {
        pin.set_low();
        Self { pin }
    }

    pub fn is_closed(&self) -> bool {
        self.pin.is_set_high()
    }
}

impl GridRelay for RelayOutput {
    fn set_grid_relay(&mut self, closed: bool) {
        if closed {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }
}
