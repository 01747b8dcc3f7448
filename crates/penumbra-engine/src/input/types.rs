/// Keyboard key identifier.
///
/// Only the keys the runtime maps explicitly; everything else arrives as
/// `Key::Unknown` with the platform key code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    Escape,
    Space,
    L,

    /// Platform-dependent key not represented here.
    Unknown(u32),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum KeyState {
    Pressed,
    Released,
}

/// Pointer position in physical pixels, origin top-left, +Y down.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointerMoveEvent {
    pub x: f32,
    pub y: f32,
}

/// Platform-agnostic input event.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Focused(bool),
    PointerMoved(PointerMoveEvent),
    PointerLeft,
    Key {
        key: Key,
        state: KeyState,
        repeat: bool,
    },
}
