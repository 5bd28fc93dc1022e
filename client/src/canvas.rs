//! Stroke capture: turns raw pointer events into a smoothed, segmented point
//! stream.
//!
//! Pointer hardware samples at whatever rate it likes; a fast flick can put
//! consecutive samples far apart. Capture fills any gap wider than the
//! smoothing threshold with evenly spaced interpolated points, so a receiver
//! replaying the stream still reconstructs a continuous line. Segments are
//! delimited by explicit [`PathEvent::SegmentBreak`] markers; consecutive
//! segments are separated by exactly one marker and the stream never ends
//! with a dangling one.
//!
//! Every produced event is pushed into the outgoing channel as it is made
//! (the stream is push, not batched) and also appended to the local history
//! kept for redraw.

use log::warn;
use shared::protocol::PathEvent;
use shared::SMOOTH_THRESHOLD;
use tokio::sync::mpsc;

pub struct StrokeCapture {
    threshold: f32,
    pen_down: bool,
    last_point: Option<(f32, f32)>,
    /// A finished segment awaiting its break marker; materialized when the
    /// next segment produces its first point.
    pending_break: bool,
    history: Vec<PathEvent>,
    outgoing: mpsc::UnboundedSender<PathEvent>,
}

impl StrokeCapture {
    pub fn new(outgoing: mpsc::UnboundedSender<PathEvent>) -> Self {
        Self::with_threshold(SMOOTH_THRESHOLD, outgoing)
    }

    pub fn with_threshold(threshold: f32, outgoing: mpsc::UnboundedSender<PathEvent>) -> Self {
        Self {
            threshold,
            pen_down: false,
            last_point: None,
            pending_break: false,
            history: Vec::new(),
            outgoing,
        }
    }

    pub fn pointer_down(&mut self) {
        self.pen_down = true;
        self.last_point = None;
    }

    /// Appends the sampled point, preceded by interpolated fill whenever the
    /// step from the previous point exceeds the threshold.
    pub fn pointer_move(&mut self, x: f32, y: f32) {
        if !self.pen_down {
            return;
        }

        if self.pending_break {
            self.emit(PathEvent::SegmentBreak);
            self.pending_break = false;
        }

        if let Some((px, py)) = self.last_point {
            let dist = ((x - px).powi(2) + (y - py).powi(2)).sqrt();
            if dist > self.threshold {
                let steps = (dist / self.threshold).floor() as usize;
                let dx = (x - px) / steps as f32;
                let dy = (y - py) / steps as f32;
                for i in 1..steps {
                    self.emit(PathEvent::Point {
                        x: px + dx * i as f32,
                        y: py + dy * i as f32,
                    });
                }
            }
        }

        self.emit(PathEvent::Point { x, y });
        self.last_point = Some((x, y));
    }

    /// Ends the current gesture. Nothing further is emitted until the next
    /// `pointer_down`.
    pub fn pointer_up(&mut self) {
        if !self.pen_down {
            return;
        }
        self.pen_down = false;
        self.last_point = None;
        // An empty gesture (down then straight up) leaves no segment to end.
        if matches!(self.history.last(), Some(PathEvent::Point { .. })) {
            self.pending_break = true;
        }
    }

    fn emit(&mut self, event: PathEvent) {
        self.history.push(event);
        if self.outgoing.send(event).is_err() {
            warn!("point stream receiver dropped, event kept locally only");
        }
    }

    pub fn is_pen_down(&self) -> bool {
        self.pen_down
    }

    /// Everything drawn so far, for redraw.
    pub fn history(&self) -> &[PathEvent] {
        &self.history
    }

    /// Drops the local drawing, e.g. when a new round begins.
    pub fn clear(&mut self) {
        self.history.clear();
        self.pending_break = false;
        self.last_point = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn capture(threshold: f32) -> (StrokeCapture, mpsc::UnboundedReceiver<PathEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (StrokeCapture::with_threshold(threshold, tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<PathEvent>) -> Vec<PathEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_wide_gap_is_filled_with_evenly_spaced_points() {
        let (mut capture, mut rx) = capture(1.0);
        capture.pointer_down();
        capture.pointer_move(0.0, 0.0);
        capture.pointer_move(10.0, 0.0);

        let events = drain(&mut rx);
        // Original two points plus nine interpolated ones at x = 1..9.
        assert_eq!(events.len(), 11);
        for (i, event) in events.iter().enumerate() {
            match event {
                PathEvent::Point { x, y } => {
                    assert_approx_eq!(*x, i as f32, 1e-4);
                    assert_approx_eq!(*y, 0.0, 1e-4);
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(capture.history(), &events[..]);
    }

    #[test]
    fn test_short_step_is_not_interpolated() {
        let (mut capture, mut rx) = capture(1.0);
        capture.pointer_down();
        capture.pointer_move(0.0, 0.0);
        capture.pointer_move(0.5, 0.5);

        assert_eq!(
            drain(&mut rx),
            vec![
                PathEvent::Point { x: 0.0, y: 0.0 },
                PathEvent::Point { x: 0.5, y: 0.5 },
            ]
        );
    }

    #[test]
    fn test_step_exactly_at_threshold_is_not_interpolated() {
        let (mut capture, mut rx) = capture(1.0);
        capture.pointer_down();
        capture.pointer_move(0.0, 0.0);
        capture.pointer_move(1.0, 0.0);
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[test]
    fn test_zero_distance_emits_single_duplicate() {
        let (mut capture, mut rx) = capture(1.0);
        capture.pointer_down();
        capture.pointer_move(3.0, 3.0);
        capture.pointer_move(3.0, 3.0);
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[test]
    fn test_diagonal_gap_interpolates_both_axes() {
        let (mut capture, mut rx) = capture(1.0);
        capture.pointer_down();
        capture.pointer_move(0.0, 0.0);
        capture.pointer_move(3.0, 4.0);

        let events = drain(&mut rx);
        // Distance 5, so four interpolated points between the endpoints.
        assert_eq!(events.len(), 6);
        match events[1] {
            PathEvent::Point { x, y } => {
                assert_approx_eq!(x, 0.6, 1e-4);
                assert_approx_eq!(y, 0.8, 1e-4);
            }
            other => panic!("unexpected event {:?}", other),
        }
        // Consecutive spacing never exceeds the threshold.
        let mut prev: Option<(f32, f32)> = None;
        for event in &events {
            if let PathEvent::Point { x, y } = event {
                if let Some((px, py)) = prev {
                    let dist = ((x - px).powi(2) + (y - py).powi(2)).sqrt();
                    assert!(dist <= 1.0 + 1e-4);
                }
                prev = Some((*x, *y));
            }
        }
    }

    #[test]
    fn test_two_gestures_are_separated_by_exactly_one_break() {
        let (mut capture, mut rx) = capture(10.0);
        capture.pointer_down();
        capture.pointer_move(1.0, 1.0);
        capture.pointer_move(2.0, 2.0);
        capture.pointer_up();
        capture.pointer_down();
        capture.pointer_move(5.0, 5.0);
        capture.pointer_up();

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                PathEvent::Point { x: 1.0, y: 1.0 },
                PathEvent::Point { x: 2.0, y: 2.0 },
                PathEvent::SegmentBreak,
                PathEvent::Point { x: 5.0, y: 5.0 },
            ]
        );
        let breaks = events
            .iter()
            .filter(|e| matches!(e, PathEvent::SegmentBreak))
            .count();
        assert_eq!(breaks, 1);
    }

    #[test]
    fn test_empty_gesture_produces_no_extra_break() {
        let (mut capture, mut rx) = capture(10.0);
        capture.pointer_down();
        capture.pointer_move(1.0, 1.0);
        capture.pointer_up();
        // Down and up with no movement in between.
        capture.pointer_down();
        capture.pointer_up();
        capture.pointer_down();
        capture.pointer_move(2.0, 2.0);
        capture.pointer_up();

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                PathEvent::Point { x: 1.0, y: 1.0 },
                PathEvent::SegmentBreak,
                PathEvent::Point { x: 2.0, y: 2.0 },
            ]
        );
    }

    #[test]
    fn test_moves_while_pen_up_are_ignored() {
        let (mut capture, mut rx) = capture(1.0);
        capture.pointer_move(1.0, 1.0);
        capture.pointer_up();
        assert!(drain(&mut rx).is_empty());
        assert!(capture.history().is_empty());
        assert!(!capture.is_pen_down());
    }

    #[test]
    fn test_no_interpolation_across_segments() {
        let (mut capture, mut rx) = capture(1.0);
        capture.pointer_down();
        capture.pointer_move(0.0, 0.0);
        capture.pointer_up();
        capture.pointer_down();
        // Far from the previous segment's endpoint; must not be bridged.
        capture.pointer_move(50.0, 0.0);
        capture.pointer_up();

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                PathEvent::Point { x: 0.0, y: 0.0 },
                PathEvent::SegmentBreak,
                PathEvent::Point { x: 50.0, y: 0.0 },
            ]
        );
    }

    #[test]
    fn test_clear_resets_history() {
        let (mut capture, _rx) = capture(1.0);
        capture.pointer_down();
        capture.pointer_move(1.0, 1.0);
        capture.pointer_up();
        capture.clear();
        assert!(capture.history().is_empty());
    }
}
