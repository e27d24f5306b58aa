//! タスクモジュール
//!
//! 各タスクの実装を分離して管理します。

pub mod control;
pub mod dc_link_monitor;
pub mod led;
pub mod status;

// タスク関数を再エクスポート
pub use control::control_task;
pub use dc_link_monitor::dc_link_monitor_task;
pub use led::led_task;
pub use status::status_task;
