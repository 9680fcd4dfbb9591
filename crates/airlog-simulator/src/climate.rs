//! Synthetic room climate and fault injection shared by the emulated sensors.

use std::num::NonZeroU32;
use std::time::Instant;

/// Slowly varying readings derived from wall-clock time since start-up.
///
/// Copies share the same origin, so two devices built from one `Climate`
/// observe the same room.
#[derive(Debug, Clone, Copy)]
pub struct Climate {
    start: Instant,
}

impl Climate {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// 20–26 °C sinusoidal with slow drift.
    pub fn temperature(&self) -> f32 {
        let t = self.elapsed_secs();
        (23.0 + 3.0 * (t / 120.0).sin() + 0.5 * (t / 37.0).cos()) as f32
    }

    /// 40–60 %RH on a different period.
    pub fn humidity(&self) -> f32 {
        let t = self.elapsed_secs();
        (50.0 + 10.0 * (t / 180.0).sin() + 2.0 * (t / 23.0).cos()) as f32
    }

    /// 400–800 ppm on a longer cycle.
    pub fn co2(&self) -> u16 {
        let t = self.elapsed_secs();
        (600.0 + 200.0 * (t / 300.0).sin() + 30.0 * (t / 41.0).cos()) as u16
    }
}

impl Default for Climate {
    fn default() -> Self {
        Self::new()
    }
}

/// Decides which response frames get their checksum corrupted.
///
/// With `every = N`, frames N, 2N, 3N, ... are corrupted.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaultInjector {
    every: Option<NonZeroU32>,
    frames: u32,
}

impl FaultInjector {
    pub fn new(every: Option<NonZeroU32>) -> Self {
        Self { every, frames: 0 }
    }

    /// Count one outgoing frame and report whether it should be corrupted.
    pub fn next_frame_corrupt(&mut self) -> bool {
        self.frames = self.frames.wrapping_add(1);
        match self.every {
            Some(every) => self.frames % every.get() == 0,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readings_stay_in_range() {
        let climate = Climate::new();

        assert!((19.5..=26.5).contains(&climate.temperature()));
        assert!((38.0..=62.0).contains(&climate.humidity()));
        assert!((370..=830).contains(&climate.co2()));
    }

    #[test]
    fn test_every_third_frame_is_corrupted() {
        let mut faults = FaultInjector::new(NonZeroU32::new(3));

        let pattern: Vec<bool> = (0..6).map(|_| faults.next_frame_corrupt()).collect();

        assert_eq!(pattern, [false, false, true, false, false, true]);
    }

    #[test]
    fn test_no_faults_by_default() {
        let mut faults = FaultInjector::default();

        assert!((0..100).all(|_| !faults.next_frame_corrupt()));
    }
}
