//! TIM1周期割り込みによる制御周期トリガー
//!
//! センターアラインドPWMの周期ごとに1回、更新割り込みから
//! [`CYCLE_FLAG`]をセットします。制御タスクはこのフラグをポーリングし、
//! セットされていれば制御演算を1回実行します。
//!
//! ## ハードウェア構成
//! - TIM1: 3相相補PWM（センターアラインド、ComplementaryPwmで設定済み）
//! - RCR = 1: アップ/ダウン両端ではなく、1周期に1回だけ更新イベントを発生
//! - 割り込み: TIM1_UP_TIM16

use embassy_stm32::pac;
use gridtie_control::cycle::CycleFlag;

use crate::config::pwm::UPDATE_IRQ_PRIORITY;

/// 再計算要求フラグ（割り込み → 制御タスク）
pub static CYCLE_FLAG: CycleFlag = CycleFlag::new();

/// TIM1更新割り込みの有効化
///
/// # Safety
/// PACを使用した直接的なレジスタ操作を含むため、unsafe
pub unsafe fn init_update_interrupt() {
    let tim1 = pac::TIM1;

    // 1. 繰り返しカウンタ: センターアラインドでは周期の両端で更新が発生するため、1周期に1回へ間引く
    tim1.rcr().modify(|w| w.set_rep(1));
    tim1.egr().write(|w| w.set_ug(true)); // RCRを反映
    tim1.sr().write(|w| w.0 = 0); // ステータスフラグクリア

    // 2. 更新割り込み許可
    tim1.dier().modify(|w| w.set_uie(true));

    // 3. NVIC（Embassyタスクより高優先度）
    unsafe {
        cortex_m::peripheral::NVIC::unmask(pac::Interrupt::TIM1_UP_TIM16);
        let mut cp = cortex_m::Peripherals::steal();
        cp.NVIC
            .set_priority(pac::Interrupt::TIM1_UP_TIM16, UPDATE_IRQ_PRIORITY);
    }
}

/// TIM1更新割り込みハンドラー
///
/// # Safety
/// 割り込みコンテキストで実行されるため、処理は最小限にする
#[inline(always)]
pub unsafe fn tim1_up_irq_handler() {
    let tim1 = pac::TIM1;
    if tim1.sr().read().uif() {
        tim1.sr().modify(|w| w.set_uif(false)); // フラグクリア
        CYCLE_FLAG.set_from_isr();
    }
}

/// TIM1_UP_TIM16割り込みのRust側エントリーポイント
#[allow(non_snake_case)]
#[no_mangle]
pub unsafe extern "C" fn TIM1_UP_TIM16() {
    tim1_up_irq_handler();
}
