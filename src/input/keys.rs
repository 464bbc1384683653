//! Key-name parsing for the push-to-talk binding.
//!
//! The same config string (`hotkey.push_to_talk_key`) is resolved twice: to
//! an [`rdev::Key`] for the OS-level listener and to an [`egui::Key`] for
//! the window.  Names are case-insensitive.

use super::InputError;

/// Parse a key name into an [`rdev::Key`].
///
/// Supports F1–F12, common named keys, digits and single ASCII letters.
///
/// # Examples
///
/// ```
/// use ptt_agent::input::parse_key;
///
/// assert_eq!(parse_key("F9").unwrap(),    rdev::Key::F9);
/// assert_eq!(parse_key("space").unwrap(), rdev::Key::Space);
/// assert_eq!(parse_key("a").unwrap(),     rdev::Key::KeyA);
/// assert!(parse_key("xyz").is_err());
/// ```
pub fn parse_key(name: &str) -> Result<rdev::Key, InputError> {
    use rdev::Key;

    let key = match name.trim().to_ascii_lowercase().as_str() {
        // Function keys
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,

        // Navigation / control
        "escape" | "esc" => Key::Escape,
        "space" => Key::Space,
        "return" | "enter" => Key::Return,
        "tab" => Key::Tab,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "insert" => Key::Insert,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        "uparrow" | "up" => Key::UpArrow,
        "downarrow" | "down" => Key::DownArrow,
        "leftarrow" | "left" => Key::LeftArrow,
        "rightarrow" | "right" => Key::RightArrow,

        // Modifiers usable as a dedicated talk key
        "controlleft" | "ctrl" => Key::ControlLeft,
        "controlright" => Key::ControlRight,
        "altgr" => Key::AltGr,
        "capslock" => Key::CapsLock,
        "scrolllock" => Key::ScrollLock,
        "pause" => Key::Pause,

        // Digits
        "0" => Key::Num0,
        "1" => Key::Num1,
        "2" => Key::Num2,
        "3" => Key::Num3,
        "4" => Key::Num4,
        "5" => Key::Num5,
        "6" => Key::Num6,
        "7" => Key::Num7,
        "8" => Key::Num8,
        "9" => Key::Num9,

        // Letters
        "a" => Key::KeyA,
        "b" => Key::KeyB,
        "c" => Key::KeyC,
        "d" => Key::KeyD,
        "e" => Key::KeyE,
        "f" => Key::KeyF,
        "g" => Key::KeyG,
        "h" => Key::KeyH,
        "i" => Key::KeyI,
        "j" => Key::KeyJ,
        "k" => Key::KeyK,
        "l" => Key::KeyL,
        "m" => Key::KeyM,
        "n" => Key::KeyN,
        "o" => Key::KeyO,
        "p" => Key::KeyP,
        "q" => Key::KeyQ,
        "r" => Key::KeyR,
        "s" => Key::KeyS,
        "t" => Key::KeyT,
        "u" => Key::KeyU,
        "v" => Key::KeyV,
        "w" => Key::KeyW,
        "x" => Key::KeyX,
        "y" => Key::KeyY,
        "z" => Key::KeyZ,

        _ => return Err(InputError::UnknownKey(name.to_string())),
    };
    Ok(key)
}

/// Parse a key name into an [`egui::Key`] for in-window push-to-talk.
pub fn parse_window_key(name: &str) -> Result<egui::Key, InputError> {
    let trimmed = name.trim();
    let mut capitalized = trimmed.to_ascii_lowercase();
    if let Some(first) = capitalized.get_mut(0..1) {
        first.make_ascii_uppercase();
    }

    let upper = trimmed.to_ascii_uppercase();

    let key = [trimmed, capitalized.as_str(), upper.as_str()]
        .into_iter()
        .find_map(egui::Key::from_name)
        .ok_or_else(|| InputError::UnknownKey(name.to_string()));
    key
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
