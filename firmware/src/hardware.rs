//! ハードウェア初期化モジュール
//!
//! クロック設定とPWM周期割り込みの初期化を集約します。

use embassy_stm32::Config;

use crate::pwm_timer;

/// RCCクロック設定を初期化
///
/// HSI → PLL（÷4 × 85 ÷ 2）で170MHz生成、ADCクロックはシステムクロック
pub fn create_clock_config() -> Config {
    let mut config = Config::default();
    {
        use embassy_stm32::rcc::mux::{Adcsel, ClockMux};
        use embassy_stm32::rcc::{Pll, PllMul, PllPreDiv, PllRDiv, PllSource, Sysclk};

        config.rcc.hsi = true;
        config.rcc.pll = Some(Pll {
            source: PllSource::HSI,
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL85,
            divp: None,
            divq: None,
            divr: Some(PllRDiv::DIV2),
        });
        config.rcc.sys = Sysclk::PLL1_R; // システムクロックをPLLに設定

        let mut clock_mux = ClockMux::default();
        clock_mux.adc12sel = Adcsel::SYS;
        config.rcc.mux = clock_mux;
    }
    config
}

/// TIM1周期割り込み初期化
///
/// ComplementaryPwm構築後に呼び出すこと
///
/// # Safety
/// PACを使用した直接レジスタ操作を含む
pub unsafe fn init_pwm_update_irq() {
    info!("Initializing TIM1 update interrupt (control cycle trigger)...");
    pwm_timer::init_update_interrupt();
    info!("TIM1 update interrupt initialized");
}
