// Keyboard shortcut module
// Detects the Control chord from successive modifier masks and maps key codes to actions

use log::debug;

/// X11-compatible modifier bits, used to build the mask carried by each keystroke
pub const SHIFT_MASK: u32 = 1;
pub const LOCK_MASK: u32 = 1 << 1;
pub const CONTROL_MASK: u32 = 1 << 2;
pub const ALT_MASK: u32 = 1 << 3;
pub const NUM_LOCK_MASK: u32 = 1 << 4;
pub const LOGO_MASK: u32 = 1 << 6;

/// Linux evdev key codes for the chord shortcuts
const KEY_Q: u32 = 16;
const KEY_W: u32 = 17;
const KEY_R: u32 = 19;
const KEY_F: u32 = 33;

/// Things a shortcut can ask the window to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ToggleFullscreen,
    ExitFullscreen,
    ResetGeometry,
    CloseImage,
    Quit,
}

/// A single key event as seen by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    pub keycode: u32,
    /// Modifier mask active when the key went down
    pub modifiers: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcut {
    pub name: &'static str,
    pub keycode: u32,
    pub action: Action,
}

impl Shortcut {
    pub const fn new(name: &'static str, keycode: u32, action: Action) -> Self {
        Self {
            name,
            keycode,
            action,
        }
    }
}

/// Ctrl+<key> bindings of the main window
pub fn default_shortcuts() -> Vec<Shortcut> {
    vec![
        Shortcut::new("Close image", KEY_W, Action::CloseImage),
        Shortcut::new("Exit", KEY_Q, Action::Quit),
        Shortcut::new("Reset window", KEY_R, Action::ResetGeometry),
        Shortcut::new("Fullscreen", KEY_F, Action::ToggleFullscreen),
    ]
}

/// Build the modifier mask for a keystroke from individual modifier flags
pub fn modifier_mask(
    shift: bool,
    caps_lock: bool,
    ctrl: bool,
    alt: bool,
    num_lock: bool,
    logo: bool,
) -> u32 {
    [
        (shift, SHIFT_MASK),
        (caps_lock, LOCK_MASK),
        (ctrl, CONTROL_MASK),
        (alt, ALT_MASK),
        (num_lock, NUM_LOCK_MASK),
        (logo, LOGO_MASK),
    ]
    .iter()
    .filter(|(held, _)| *held)
    .fold(0, |mask, (_, bit)| mask | bit)
}

/// Recognizes the Control chord without querying live modifier state.
///
/// The chord is inferred from the difference between the mask of this keystroke
/// and the mask of the last keystroke that was not part of a chord.
#[derive(Debug)]
pub struct ShortcutDispatcher {
    shortcuts: Vec<Shortcut>,
    control_chord: u32,
    previous_state: u32,
}

impl ShortcutDispatcher {
    pub fn new(shortcuts: Vec<Shortcut>, control_chord: u32) -> Self {
        Self {
            shortcuts,
            control_chord,
            previous_state: 0,
        }
    }

    #[cfg(test)]
    pub fn previous_state(&self) -> u32 {
        self.previous_state
    }

    pub fn dispatch(&mut self, stroke: KeyStroke) -> Option<Action> {
        let delta = stroke.modifiers.wrapping_sub(self.previous_state);
        if delta != self.control_chord {
            self.previous_state = stroke.modifiers;
            return None;
        }

        let shortcut = self
            .shortcuts
            .iter()
            .find(|shortcut| shortcut.keycode == stroke.keycode)?;
        debug!("Shortcut: {}", shortcut.name);
        Some(shortcut.action)
    }
}
