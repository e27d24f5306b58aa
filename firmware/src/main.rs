#![no_std]
#![no_main]

mod fmt;

mod benchmark;
mod bridge;
mod config;
mod hardware;
mod inverter;
mod pwm_timer;
mod sensing;
mod state;
mod tasks;

#[cfg(not(feature = "defmt"))]
use panic_halt as _;
#[cfg(feature = "defmt")]
use {defmt_rtt as _, panic_probe as _};

use embassy_executor::Spawner;
use embassy_stm32::{
    adc::{Adc, AdcChannel, SampleTime},
    gpio::{Level, Output, Speed},
    timer::{
        complementary_pwm::{ComplementaryPwm, ComplementaryPwmPin},
        low_level::CountingMode,
        simple_pwm::PwmPin,
        Channel,
    },
};
use embassy_time::{Duration, Timer};

use gridtie_control::config::{DcLinkConfig, DEFAULT_SAMPLE_RATE};

use bridge::{InverterBridge, RelayOutput};
use inverter::ActiveConverter;
use sensing::GridSensing;
use tasks::{control_task, dc_link_monitor_task, led_task, status_task};

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // ハードウェア初期化
    let clock_config = hardware::create_clock_config();
    let p = embassy_stm32::init(clock_config);

    info!("═══════════════════════════════════════════════════════════════════");
    info!("        Three-phase Grid-tie Inverter • STM32G431VB @ 170MHz");
    info!(
        "        Mode: {:?}, control rate: {}Hz",
        config::DEFAULT_CONTROL_MODE,
        config::pwm::DEFAULT_FREQUENCY.0
    );
    info!("═══════════════════════════════════════════════════════════════════");

    // 制御コアの構築（設定不正は起動時に停止）
    let active = match ActiveConverter::new(config::DEFAULT_CONTROL_MODE) {
        Ok(active) => active,
        Err(e) => {
            error!("Invalid control configuration: {:?}", e);
            panic!("invalid control configuration");
        }
    };

    // LED初期化＆タスク起動
    let led1 = Output::new(p.PC13, Level::Low, Speed::Low);
    let led2 = Output::new(p.PC14, Level::Low, Speed::Low);
    let led3 = Output::new(p.PC15, Level::Low, Speed::Low);
    unwrap!(spawner.spawn(led_task(led1, led2, led3)));

    // 系統連系リレー（開放で初期化）
    let relay = RelayOutput::new(Output::new(p.PB5, Level::Low, Speed::Low));

    // ADC初期化（制御周期内に7チャネルを読むため短いサンプル時間）
    let mut adc1 = Adc::new(p.ADC1);
    adc1.set_sample_time(SampleTime::CYCLES12_5);
    let mut adc2 = Adc::new(p.ADC2);
    adc2.set_sample_time(SampleTime::CYCLES12_5);

    let sensing = GridSensing::new(
        adc1,
        adc2,
        [
            p.PA0.degrade_adc(),
            p.PA1.degrade_adc(),
            p.PA2.degrade_adc(),
        ],
        [
            p.PA6.degrade_adc(),
            p.PA7.degrade_adc(),
            p.PC5.degrade_adc(),
        ],
        p.PC1.degrade_adc(), // ADC2_IN7
    );

    // PWM初期化（TIM1、3相相補PWM、センターアラインド）
    let mut inverter_pwm = ComplementaryPwm::new(
        p.TIM1,
        Some(PwmPin::new(
            p.PE9,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        Some(ComplementaryPwmPin::new(
            p.PE8,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        Some(PwmPin::new(
            p.PE11,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        Some(ComplementaryPwmPin::new(
            p.PE10,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        Some(PwmPin::new(
            p.PE13,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        Some(ComplementaryPwmPin::new(
            p.PE12,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        None,
        None,
        config::pwm::DEFAULT_FREQUENCY,
        CountingMode::CenterAlignedBothInterrupts,
    );
    inverter_pwm.disable(Channel::Ch1);
    inverter_pwm.disable(Channel::Ch2);
    inverter_pwm.disable(Channel::Ch3);
    inverter_pwm.set_dead_time(config::pwm::DEFAULT_DEAD_TIME);
    let bridge = InverterBridge::new(inverter_pwm);

    // ベンチマーク実行（制御タスク起動前）
    unsafe {
        benchmark::enable_cycle_counter();
    }
    benchmark::run_trig_benchmark(1000);
    benchmark::run_control_benchmark(
        config::DEFAULT_CONTROL_MODE,
        2000,
        DEFAULT_SAMPLE_RATE as u32,
    );

    // TIM1周期割り込み（制御周期トリガー）
    unsafe {
        hardware::init_pwm_update_irq();
    }

    info!("Starting grid-tie control...");

    // 制御・監視タスクを起動
    unwrap!(spawner.spawn(control_task(active, sensing, bridge, relay)));
    unwrap!(spawner.spawn(dc_link_monitor_task(DcLinkConfig::default())));
    unwrap!(spawner.spawn(status_task()));

    // メインループ（将来の拡張用）
    loop {
        Timer::after(Duration::from_millis(100)).await;
    }
}
