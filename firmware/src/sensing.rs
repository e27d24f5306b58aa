//! ADCフロントエンド
//!
//! 系統電圧3相・注入電流3相・DCリンク電圧を読み取り、物理量に換算して
//! 制御コアの[`Measurements`]にまとめます。
//!
//! ## チャネル配置
//! - ADC1: 系統電圧 Va/Vb/Vc（PA0/PA1/PA2）
//! - ADC2: 相電流 Ia/Ib/Ic（PA6/PA7/PC5）、DCリンク電圧（PC1 = ADC2_IN7）

use embassy_stm32::{
    adc::{Adc, AnyAdcChannel},
    peripherals,
};
use gridtie_control::control::ThreePhase;
use gridtie_control::Measurements;

use crate::config::sensing::*;

/// ADC生値をADC入力電圧 [V] に換算
#[inline(always)]
fn adc_to_volts(raw: u16) -> f32 {
    (raw as f32 / ADC_MAX) * VREF
}

/// オフセット付き両極性センサー信号を物理量に換算
#[inline(always)]
fn bipolar(raw: u16, gain: f32) -> f32 {
    (adc_to_volts(raw) - AC_OFFSET) * gain
}

/// 分圧回路から元のDCリンク電圧を逆算
///
/// V_dc = V_adc * (R_upper + R_lower) / R_lower
#[inline(always)]
fn dc_link_volts(raw: u16) -> f32 {
    adc_to_volts(raw) * (DC_LINK_R_UPPER + DC_LINK_R_LOWER) / DC_LINK_R_LOWER
}

pub struct GridSensing {
    adc1: Adc<'static, peripherals::ADC1>,
    adc2: Adc<'static, peripherals::ADC2>,
    voltage: [AnyAdcChannel<peripherals::ADC1>; 3],
    current: [AnyAdcChannel<peripherals::ADC2>; 3],
    dc_link: AnyAdcChannel<peripherals::ADC2>,
}

impl GridSensing {
    pub fn new(
        adc1: Adc<'static, peripherals::ADC1>,
        adc2: Adc<'static, peripherals::ADC2>,
        voltage: [AnyAdcChannel<peripherals::ADC1>; 3],
        current: [AnyAdcChannel<peripherals::ADC2>; 3],
        dc_link: AnyAdcChannel<peripherals::ADC2>,
    ) -> Self {
        Self {
            adc1,
            adc2,
            voltage,
            current,
            dc_link,
        }
    }

    /// 1制御周期分の測定値を取得
    pub fn read(&mut self) -> Measurements {
        let [va, vb, vc] = &mut self.voltage;
        let voltage = ThreePhase::new(
            bipolar(self.adc1.blocking_read(va), GRID_VOLTAGE_GAIN),
            bipolar(self.adc1.blocking_read(vb), GRID_VOLTAGE_GAIN),
            bipolar(self.adc1.blocking_read(vc), GRID_VOLTAGE_GAIN),
        );

        let [ia, ib, ic] = &mut self.current;
        let current = ThreePhase::new(
            bipolar(self.adc2.blocking_read(ia), CURRENT_GAIN),
            bipolar(self.adc2.blocking_read(ib), CURRENT_GAIN),
            bipolar(self.adc2.blocking_read(ic), CURRENT_GAIN),
        );

        let vdc = dc_link_volts(self.adc2.blocking_read(&mut self.dc_link));

        Measurements {
            voltage,
            current,
            vdc,
        }
    }
}
