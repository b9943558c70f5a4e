//! Key name normalization
//!
//! Tools accept portable, case-insensitive key names (`enter`, `ctrl`,
//! `pagedown`, `f5`, `a`, `,`). Backends need their own names; this module
//! maps the portable names to X11 keysyms as understood by `xdotool`.

use crate::error::{ProviderError, ProviderResult};

/// Portable name (lowercase) to X11 keysym
const NAMED_KEYS: &[(&str, &str)] = &[
    ("enter", "Return"),
    ("return", "Return"),
    ("tab", "Tab"),
    ("space", "space"),
    ("backspace", "BackSpace"),
    ("delete", "Delete"),
    ("del", "Delete"),
    ("escape", "Escape"),
    ("esc", "Escape"),
    ("up", "Up"),
    ("down", "Down"),
    ("left", "Left"),
    ("right", "Right"),
    ("home", "Home"),
    ("end", "End"),
    ("pageup", "Page_Up"),
    ("pgup", "Page_Up"),
    ("pagedown", "Page_Down"),
    ("pgdn", "Page_Down"),
    ("insert", "Insert"),
    ("capslock", "Caps_Lock"),
    ("numlock", "Num_Lock"),
    ("scrolllock", "Scroll_Lock"),
    ("printscreen", "Print"),
    ("prtsc", "Print"),
    ("pause", "Pause"),
    ("menu", "Menu"),
    ("shift", "shift"),
    ("shiftleft", "Shift_L"),
    ("shiftright", "Shift_R"),
    ("ctrl", "ctrl"),
    ("control", "ctrl"),
    ("ctrlleft", "Control_L"),
    ("ctrlright", "Control_R"),
    ("alt", "alt"),
    ("option", "alt"),
    ("altleft", "Alt_L"),
    ("altright", "Alt_R"),
    ("cmd", "super"),
    ("command", "super"),
    ("win", "super"),
    ("super", "super"),
    ("winleft", "Super_L"),
    ("winright", "Super_R"),
    ("volumeup", "XF86AudioRaiseVolume"),
    ("volumedown", "XF86AudioLowerVolume"),
    ("volumemute", "XF86AudioMute"),
    ("playpause", "XF86AudioPlay"),
    ("nexttrack", "XF86AudioNext"),
    ("prevtrack", "XF86AudioPrev"),
];

/// Punctuation characters that need a keysym name
const PUNCTUATION: &[(char, &str)] = &[
    (' ', "space"),
    ('-', "minus"),
    ('=', "equal"),
    (',', "comma"),
    ('.', "period"),
    ('/', "slash"),
    (';', "semicolon"),
    ('\'', "apostrophe"),
    ('[', "bracketleft"),
    (']', "bracketright"),
    ('\\', "backslash"),
    ('`', "grave"),
    ('+', "plus"),
    ('*', "asterisk"),
];

/// Maps a portable key name to an X11 keysym
///
/// # Errors
///
/// Returns [`ProviderError::UnknownKeyName`] for names outside the table,
/// function keys beyond F24, and multi-character strings that are not key
/// names.
///
/// # Examples
///
/// ```
/// use computer_use_mcp::providers::keys::to_keysym;
///
/// assert_eq!(to_keysym("Enter").unwrap(), "Return");
/// assert_eq!(to_keysym("f5").unwrap(), "F5");
/// assert_eq!(to_keysym("a").unwrap(), "a");
/// assert!(to_keysym("hyperdrive").is_err());
/// ```
pub fn to_keysym(name: &str) -> ProviderResult<String> {
    let unknown = || ProviderError::UnknownKeyName {
        name: name.to_string(),
    };

    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphanumeric() {
            return Ok(c.to_ascii_lowercase().to_string());
        }
        return PUNCTUATION
            .iter()
            .find(|(p, _)| *p == c)
            .map(|(_, keysym)| keysym.to_string())
            .ok_or_else(unknown);
    }

    let lower = name.trim().to_ascii_lowercase();
    if let Some((_, keysym)) = NAMED_KEYS.iter().find(|(n, _)| *n == lower) {
        return Ok(keysym.to_string());
    }

    if let Some(number) = lower.strip_prefix('f') {
        if let Ok(n) = number.parse::<u8>() {
            if (1..=24).contains(&n) {
                return Ok(format!("F{}", n));
            }
        }
    }

    Err(unknown())
}

/// Validates every name in a chord, returning keysyms in order
pub fn chord_to_keysyms(keys: &[String]) -> ProviderResult<Vec<String>> {
    keys.iter().map(|k| to_keysym(k)).collect()
}
