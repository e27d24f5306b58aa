// Moving-average low-pass filter for the DQ measurements feeding the PLL

use crate::config::ConfigError;

/// Ring-buffer moving average
///
/// `CAP` sizes the backing buffer; the active window is chosen at runtime and
/// must fit inside it. Until the window has been filled once the average is
/// taken over the samples seen so far, so the output under-reads a steady
/// input during the fill phase.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingAverage<const CAP: usize> {
    buffer: [f32; CAP],
    /// Active window length [samples]
    window: usize,
    /// Next slot to write
    index: usize,
    average: f32,
    stable: bool,
}

impl<const CAP: usize> MovingAverage<CAP> {
    pub fn new(window: usize) -> Result<Self, ConfigError> {
        if window == 0 {
            return Err(ConfigError::EmptyFilterWindow);
        }
        if window > CAP {
            return Err(ConfigError::FilterWindowTooLarge);
        }
        Ok(Self {
            buffer: [0.0; CAP],
            window,
            index: 0,
            average: 0.0,
            stable: false,
        })
    }

    /// Push one sample and return the updated average
    pub fn compute(&mut self, value: f32) -> f32 {
        self.buffer[self.index] = value;
        self.index += 1;

        let filled = if self.stable { self.window } else { self.index };
        let sum: f32 = self.buffer[..filled].iter().sum();
        self.average = sum / filled as f32;

        if self.index >= self.window {
            self.index = 0;
            self.stable = true;
        }

        self.average
    }

    /// Zero the buffer and restart the fill phase
    pub fn reset(&mut self) {
        self.buffer = [0.0; CAP];
        self.index = 0;
        self.average = 0.0;
        self.stable = false;
    }

    /// Last computed average
    pub fn average(&self) -> f32 {
        self.average
    }

    /// True once the window has been filled at least once
    pub fn is_stable(&self) -> bool {
        self.stable
    }

    pub fn window(&self) -> usize {
        self.window
    }
}
