//! 制御モード別コンバータの選択
//!
//! 起動時に選択したモードのオーケストレータを保持し、
//! モード依存のセットポイントを振り分けます。

use gridtie_control::config::{GridTieConfig, OpenLoopConfig, PllConfig};
use gridtie_control::converter::{BasicGridTie, Converter, GridTieCurrentControl, OpenLoopVf};
use gridtie_control::{ConfigError, ControlMode};

pub enum ActiveConverter {
    BasicGridTie(BasicGridTie),
    CurrentControl(GridTieCurrentControl),
    OpenLoopVf(OpenLoopVf),
}

impl ActiveConverter {
    /// デフォルト設定でコンバータを構築
    pub fn new(mode: ControlMode) -> Result<Self, ConfigError> {
        Ok(match mode {
            ControlMode::BasicGridTie => Self::BasicGridTie(BasicGridTie::new(&PllConfig::default())?),
            ControlMode::CurrentControl => {
                Self::CurrentControl(GridTieCurrentControl::new(&GridTieConfig::default())?)
            }
            ControlMode::OpenLoopVf => Self::OpenLoopVf(OpenLoopVf::new(&OpenLoopConfig::default())?),
        })
    }

    pub fn as_converter(&mut self) -> &mut dyn Converter {
        match self {
            Self::BasicGridTie(c) => c,
            Self::CurrentControl(c) => c,
            Self::OpenLoopVf(c) => c,
        }
    }

    /// セットポイントを反映（変化時のみログ）
    pub fn apply_setpoint(&mut self, setpoint: f32) {
        match self {
            Self::BasicGridTie(_) => {}
            Self::CurrentControl(c) => {
                if c.current_reference() != setpoint {
                    info!("Current reference updated: {}A", setpoint);
                    c.set_current_reference(setpoint);
                }
            }
            Self::OpenLoopVf(c) => {
                if c.requested_frequency() != setpoint {
                    if let Err(e) = c.set_requested_frequency(setpoint) {
                        warn!("Rejected V/f setpoint {}Hz: {:?}", setpoint, e);
                    }
                }
            }
        }
    }
}
