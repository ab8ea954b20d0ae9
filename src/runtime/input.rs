//! Input event vocabulary shared by surfaces and capability callbacks.

/// Identifies the device an event originated from, disambiguating
/// multi-touch contacts from the mouse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeviceId(pub u64);

impl DeviceId {
    /// The pointer device a plain mouse reports as.
    pub const MOUSE: DeviceId = DeviceId(0);
}

/// Pointer button identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    /// Primary button.
    Left,
    /// Middle button / wheel click.
    Middle,
    /// Secondary button.
    Right,
    /// Any other platform button index.
    Other(u8),
}

/// Active keyboard modifiers at the time of a key event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Mods {
    /// Either shift key.
    pub shift: bool,
    /// Either control key.
    pub ctrl: bool,
    /// Either alt/option key.
    pub alt: bool,
    /// Either GUI/meta/command key.
    pub meta: bool,
}

impl Mods {
    /// Decode an SDL-style `KMOD_*` bitmask into the modifier set.
    pub fn from_bits(bits: u16) -> Self {
        // SDL KMOD layout: shift = 0x0003, ctrl = 0x00c0, alt = 0x0300,
        // gui = 0x0c00 (left|right pairs).
        Self {
            shift: bits & 0x0003 != 0,
            ctrl: bits & 0x00c0 != 0,
            alt: bits & 0x0300 != 0,
            meta: bits & 0x0c00 != 0,
        }
    }
}

/// Symbolic key names.
///
/// A static table ([`Key::from_keycode`]) maps platform keycodes onto these
/// at compile time; surfaces never introspect platform constants at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    /// A printable character key (lowercase for letters).
    Char(char),
    /// Enter/return.
    Enter,
    /// Escape.
    Escape,
    /// Backspace.
    Backspace,
    /// Tab.
    Tab,
    /// Left arrow.
    Left,
    /// Right arrow.
    Right,
    /// Up arrow.
    Up,
    /// Down arrow.
    Down,
    /// Function key F1..=F12.
    Function(u8),
    /// Any other platform keycode, carried through untranslated.
    Other(u32),
}

impl Key {
    /// Translate an SDL-style keycode into a symbolic key.
    ///
    /// Printable ASCII maps to [`Key::Char`]; a fixed table covers the
    /// control and arrow keys; everything else passes through as
    /// [`Key::Other`].
    pub fn from_keycode(code: u32) -> Self {
        const KEYMAP: &[(u32, Key)] = &[
            (0x08, Key::Backspace),
            (0x09, Key::Tab),
            (0x0d, Key::Enter),
            (0x1b, Key::Escape),
            // SDLK arrow keys (scancode | 1<<30).
            (0x4000_0050, Key::Left),
            (0x4000_004f, Key::Right),
            (0x4000_0052, Key::Up),
            (0x4000_0051, Key::Down),
        ];

        if let Some((_, key)) = KEYMAP.iter().find(|(c, _)| *c == code) {
            return *key;
        }
        // F1..F12 are scancodes 0x3a..0x45 with the SDLK bit set.
        if (0x4000_003a..=0x4000_0045).contains(&code) {
            return Key::Function((code - 0x4000_003a + 1) as u8);
        }
        if (0x20..0x7f).contains(&code) {
            return Key::Char(char::from_u32(code).unwrap_or('\u{fffd}'));
        }
        Key::Other(code)
    }
}

/// One input event, tagged by kind.
///
/// Pointer coordinates are in presentation pixels, normalized to the current
/// presentation size by the originating surface (touch contacts arrive in
/// unit coordinates and are scaled there).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    /// Pointer moved.
    PointerMove {
        /// X in presentation pixels.
        x: f32,
        /// Y in presentation pixels.
        y: f32,
        /// Originating device.
        device: DeviceId,
    },
    /// Pointer button or touch contact pressed.
    PointerPress {
        /// X in presentation pixels.
        x: f32,
        /// Y in presentation pixels.
        y: f32,
        /// Button pressed (touch contacts report [`PointerButton::Left`]).
        button: PointerButton,
        /// Originating device.
        device: DeviceId,
    },
    /// Pointer button or touch contact released.
    PointerRelease {
        /// X in presentation pixels.
        x: f32,
        /// Y in presentation pixels.
        y: f32,
        /// Button released.
        button: PointerButton,
        /// Originating device.
        device: DeviceId,
    },
    /// Key pressed.
    KeyPress {
        /// Symbolic key.
        key: Key,
        /// Active modifiers.
        mods: Mods,
    },
    /// Key released.
    KeyRelease {
        /// Symbolic key.
        key: Key,
        /// Active modifiers.
        mods: Mods,
    },
}

impl InputEvent {
    /// Whether this event routes to the `mouse_in` capability.
    pub fn is_pointer(&self) -> bool {
        matches!(
            self,
            Self::PointerMove { .. } | Self::PointerPress { .. } | Self::PointerRelease { .. }
        )
    }

    /// Whether this event routes to the `keyboard_in` capability.
    pub fn is_key(&self) -> bool {
        matches!(self, Self::KeyPress { .. } | Self::KeyRelease { .. })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/runtime/input.rs"]
mod tests;
