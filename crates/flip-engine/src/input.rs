//! Input Dispatch
//!
//! Keyboard, wheel and touch gestures translated into debounced
//! navigation calls. One lock spans every source: once a gesture lands,
//! further gestures are dropped until the transition delay elapses.

use crate::page::Trigger;

/// Minimum vertical travel for a touch swipe to count.
pub const MIN_TOUCH_DISTANCE: f32 = 10.0;

/// Navigation keys the dispatcher understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Up,
    Left,
    Enter,
    Right,
    Down,
}

/// Direction of a container-level transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

/// Fixed gesture-to-action table: escape/up/left go back, the rest go
/// forward.
pub fn key_action(key: Key) -> (Trigger, Direction) {
    match key {
        Key::Escape => (Trigger::Esc, Direction::Prev),
        Key::Up => (Trigger::Up, Direction::Prev),
        Key::Left => (Trigger::Left, Direction::Prev),
        Key::Enter => (Trigger::Enter, Direction::Next),
        Key::Right => (Trigger::Right, Direction::Next),
        Key::Down => (Trigger::Down, Direction::Next),
    }
}

/// Shared debounce lock plus touch bookkeeping.
#[derive(Debug, Default)]
pub struct InputState {
    locked_until: f64,
    touch_start: Option<f32>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for one debounce window. The lock is taken even if
    /// the gesture ends up filtered, matching the user-visible behavior
    /// of one action per window.
    pub fn try_acquire(&mut self, now: f64, window_ms: u64) -> bool {
        if now < self.locked_until {
            return false;
        }
        self.locked_until = now + window_ms as f64;
        true
    }

    pub fn touch_start(&mut self, y: f32) {
        self.touch_start = Some(y);
    }

    /// Resolve a touch move into a swipe direction once the minimum
    /// distance is covered. Decreasing y goes back.
    pub fn touch_direction(&self, y: f32) -> Option<Direction> {
        let start = self.touch_start?;
        if (y - start).abs() < MIN_TOUCH_DISTANCE {
            return None;
        }
        if start > y {
            Some(Direction::Prev)
        } else {
            Some(Direction::Next)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_table() {
        assert_eq!(key_action(Key::Escape), (Trigger::Esc, Direction::Prev));
        assert_eq!(key_action(Key::Up), (Trigger::Up, Direction::Prev));
        assert_eq!(key_action(Key::Enter), (Trigger::Enter, Direction::Next));
        assert_eq!(key_action(Key::Down), (Trigger::Down, Direction::Next));
    }

    #[test]
    fn test_debounce_window() {
        let mut input = InputState::new();
        assert!(input.try_acquire(0.0, 700));
        assert!(!input.try_acquire(100.0, 700));
        assert!(!input.try_acquire(699.0, 700));
        assert!(input.try_acquire(700.0, 700));
    }

    #[test]
    fn test_touch_threshold() {
        let mut input = InputState::new();
        input.touch_start(100.0);
        assert_eq!(input.touch_direction(95.0), None);
        assert_eq!(input.touch_direction(80.0), Some(Direction::Prev));
        assert_eq!(input.touch_direction(130.0), Some(Direction::Next));
    }

    #[test]
    fn test_touch_without_start() {
        let input = InputState::new();
        assert_eq!(input.touch_direction(50.0), None);
    }
}
