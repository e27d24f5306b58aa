//! Configuration module
//!
//! ファームウェア固有の設定（ピン配置に依存する値、PWM、ADCスケーリング）を提供します。

pub mod params;

// params.rsから主要な定数を再エクスポート
pub use params::*;
