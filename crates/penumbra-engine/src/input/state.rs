use std::collections::HashSet;

use super::frame::InputFrame;
use super::types::{InputEvent, Key, KeyState, PointerMoveEvent};

/// Current input state of the window.
#[derive(Debug, Default)]
pub struct InputState {
    pub focused: bool,

    /// Pointer position in physical pixels (Y down), `None` outside the window.
    pub pointer_pos: Option<(f32, f32)>,

    pub keys_down: HashSet<Key>,
}

impl InputState {
    /// Applies `ev` and records the resulting transitions in `frame`.
    pub fn apply_event(&mut self, frame: &mut InputFrame, ev: InputEvent) {
        match &ev {
            InputEvent::Focused(f) => {
                self.focused = *f;
                if !*f {
                    // Keys released while unfocused never arrive.
                    self.keys_down.clear();
                }
            }

            InputEvent::PointerMoved(PointerMoveEvent { x, y }) => {
                self.pointer_pos = Some((*x, *y));
            }

            InputEvent::PointerLeft => {
                self.pointer_pos = None;
            }

            InputEvent::Key { key, state, .. } => match state {
                KeyState::Pressed => {
                    if self.keys_down.insert(*key) {
                        frame.keys_pressed.insert(*key);
                    }
                }
                KeyState::Released => {
                    if self.keys_down.remove(key) {
                        frame.keys_released.insert(*key);
                    }
                }
            },
        }

        frame.events.push(ev);
    }

    pub fn key_down(&self, key: Key) -> bool {
        self.keys_down.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(key: Key, state: KeyState) -> InputEvent {
        InputEvent::Key {
            key,
            state,
            repeat: false,
        }
    }

    #[test]
    fn press_is_reported_once_while_held() {
        let mut state = InputState::default();
        let mut frame = InputFrame::default();

        state.apply_event(&mut frame, key(Key::L, KeyState::Pressed));
        assert!(frame.pressed(Key::L));

        frame.clear();
        state.apply_event(&mut frame, key(Key::L, KeyState::Pressed));
        assert!(!frame.pressed(Key::L));
        assert!(state.key_down(Key::L));
    }

    #[test]
    fn focus_loss_releases_keys() {
        let mut state = InputState::default();
        let mut frame = InputFrame::default();

        state.apply_event(&mut frame, key(Key::Space, KeyState::Pressed));
        state.apply_event(&mut frame, InputEvent::Focused(false));
        assert!(!state.key_down(Key::Space));
        assert!(!state.focused);
    }

    #[test]
    fn pointer_tracks_moves_and_leave() {
        let mut state = InputState::default();
        let mut frame = InputFrame::default();

        state.apply_event(
            &mut frame,
            InputEvent::PointerMoved(PointerMoveEvent { x: 12.0, y: 34.0 }),
        );
        assert_eq!(state.pointer_pos, Some((12.0, 34.0)));

        state.apply_event(&mut frame, InputEvent::PointerLeft);
        assert_eq!(state.pointer_pos, None);
        assert_eq!(frame.events.len(), 2);
    }
}
