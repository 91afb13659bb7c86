use std::time::Duration;

/// Paces the frame pump to a target rate and decides how many source frames each
/// emitted frame consumes.
///
/// Skips follow the cumulative ratio `floor(n * r) - floor((n - 1) * r)` where `n`
/// counts emitted frames since the last reset, so drops are spread evenly and the
/// total consumed after `N` frames is exactly `floor(N * r)` regardless of pauses.
#[derive(Debug, Clone)]
pub struct FrameRateGovernor {
    source_fps: f64,
    target_fps: f64,
    skip_ratio: Option<f64>,
    emitted: u64,
}

impl FrameRateGovernor {
    pub fn new(source_fps: f64, target_fps: f64) -> Self {
        let target_fps = target_fps.min(source_fps);
        let skip_ratio = (source_fps > target_fps).then(|| source_fps / target_fps);
        Self {
            source_fps,
            target_fps,
            skip_ratio,
            emitted: 0,
        }
    }

    pub fn source_fps(&self) -> f64 {
        self.source_fps
    }

    pub fn target_fps(&self) -> f64 {
        self.target_fps
    }

    /// `source_fps / target_fps`, or `None` when every frame is emitted.
    pub fn skip_ratio(&self) -> Option<f64> {
        self.skip_ratio
    }

    /// Source frames to advance for the `n`th emitted frame (1-based), including the
    /// frame that is emitted.
    pub fn frames_to_advance(&self, n: u64) -> u64 {
        let Some(ratio) = self.skip_ratio else {
            return 1;
        };
        if n == 0 {
            return 1;
        }
        let current = (n as f64 * ratio).floor() as u64;
        let previous = ((n - 1) as f64 * ratio).floor() as u64;
        current.saturating_sub(previous).max(1)
    }

    /// Advance count for the next emitted frame.
    pub fn next_advance(&mut self) -> u64 {
        self.emitted += 1;
        self.frames_to_advance(self.emitted)
    }

    /// Counts a frame emitted without consulting the skip policy (after a seek).
    pub fn mark_emitted(&mut self) {
        self.emitted += 1;
    }

    /// Restart the skip sequence, used after the source is repositioned.
    pub fn reset(&mut self) {
        self.emitted = 0;
    }

    /// Nominal time budget of one emitted frame.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps)
    }

    /// Time left of the frame budget after `elapsed` processing, never negative.
    pub fn sleep_time(&self, elapsed: Duration) -> Duration {
        self.frame_interval().saturating_sub(elapsed)
    }

    /// Instantaneous rate for an iteration that took `real_elapsed`.
    pub fn instant_fps(real_elapsed: Duration) -> Option<f64> {
        let secs = real_elapsed.as_secs_f64();
        (secs > 0.0).then(|| 1.0 / secs)
    }

    /// Detector timestamp increment per emitted frame, in milliseconds.
    pub fn timestamp_step_ms(&self) -> u64 {
        ((1000.0 / self.target_fps).round() as u64).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_rate_advances_two_every_time() {
        let gov = FrameRateGovernor::new(60.0, 30.0);
        assert_eq!(gov.skip_ratio(), Some(2.0));
        let seq: Vec<u64> = (1..=4).map(|n| gov.frames_to_advance(n)).collect();
        assert_eq!(seq, [2, 2, 2, 2]);
    }

    #[test]
    fn no_skipping_at_or_below_target() {
        let mut gov = FrameRateGovernor::new(25.0, 25.0);
        assert_eq!(gov.skip_ratio(), None);
        for _ in 0..10 {
            assert_eq!(gov.next_advance(), 1);
        }
    }

    #[test]
    fn fractional_ratio_spreads_drops() {
        // 45 -> 30 fps consumes 3 source frames per 2 emitted
        let gov = FrameRateGovernor::new(45.0, 30.0);
        let seq: Vec<u64> = (1..=6).map(|n| gov.frames_to_advance(n)).collect();
        assert_eq!(seq, [1, 2, 1, 2, 1, 2]);
    }

    #[test]
    fn cumulative_advance_has_no_drift() {
        for source in [29.97 * 2.0, 50.0, 59.94, 120.0, 31.0, 240.0] {
            let mut gov = FrameRateGovernor::new(source, 30.0);
            let ratio = gov.skip_ratio().unwrap_or(1.0);
            let mut total = 0u64;
            for n in 1..=10_000u64 {
                let step = gov.next_advance();
                assert!(step >= 1);
                total += step;
                let expected = (n as f64 * ratio).floor() as u64;
                assert!(total.abs_diff(expected) <= 1, "source {source} n {n}");
            }
        }
    }

    #[test]
    fn reset_restarts_sequence() {
        let mut gov = FrameRateGovernor::new(45.0, 30.0);
        assert_eq!(gov.next_advance(), 1);
        assert_eq!(gov.next_advance(), 2);
        gov.reset();
        assert_eq!(gov.next_advance(), 1);
    }

    #[test]
    fn sleep_time_is_clamped() {
        let gov = FrameRateGovernor::new(30.0, 30.0);
        assert_eq!(gov.sleep_time(Duration::from_millis(100)), Duration::ZERO);
        let left = gov.sleep_time(Duration::from_millis(10));
        assert!(left > Duration::from_millis(23) && left < Duration::from_millis(24));
    }

    #[test]
    fn instant_fps_is_not_clamped() {
        let fps = FrameRateGovernor::instant_fps(Duration::from_millis(10));
        assert_eq!(fps.map(f64::round), Some(100.0));
        assert_eq!(FrameRateGovernor::instant_fps(Duration::ZERO), None);
    }

    #[test]
    fn timestamp_step() {
        assert_eq!(FrameRateGovernor::new(60.0, 30.0).timestamp_step_ms(), 33);
        assert_eq!(FrameRateGovernor::new(25.0, 25.0).timestamp_step_ms(), 40);
    }
}
