//! Touch event model

use serde::{Deserialize, Serialize};

/// Touch action, mirroring the platform's motion-event actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TouchAction {
    /// First finger down
    Down,
    /// Additional finger down
    PointerDown,
    Move,
    /// Last finger lifted
    Up,
    /// Non-last finger lifted
    PointerUp,
    Cancel,
}

/// Pointer position in surface pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    pub x: f32,
    pub y: f32,
}

/// One touch event with every active pointer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchEvent {
    pub action: TouchAction,
    pub pointers: Vec<TouchPoint>,
}

impl TouchEvent {
    pub fn new(action: TouchAction, pointers: Vec<TouchPoint>) -> Self {
        Self { action, pointers }
    }

    /// Single-pointer event
    pub fn single(action: TouchAction, x: f32, y: f32) -> Self {
        Self::new(action, vec![TouchPoint { x, y }])
    }

    pub fn pointer_count(&self) -> usize {
        self.pointers.len()
    }

    /// Euclidean distance between the first two pointers
    pub fn finger_spacing(&self) -> Option<f32> {
        match self.pointers.as_slice() {
            [a, b, ..] => {
                let dx = a.x - b.x;
                let dy = a.y - b.y;
                Some((dx * dx + dy * dy).sqrt())
            }
            _ => None,
        }
    }
}
