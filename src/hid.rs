use log::info;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use uinput::device::Device;
use uinput::event::keyboard;

use crate::keys::{KeySymbol, NamedKey};

#[derive(Error, Debug)]
pub enum HidError {
    #[error("uinput error: {0}")]
    Uinput(String),

    #[error("Key not available on the virtual keyboard: {0:?}")]
    UnsupportedKey(char),
}

impl From<uinput::Error> for HidError {
    fn from(err: uinput::Error) -> Self {
        HidError::Uinput(err.to_string())
    }
}

/// Capacidad de inyectar teclas en el sistema
pub trait KeyInjector {
    fn press(&mut self, symbol: KeySymbol) -> Result<(), HidError>;
    fn release(&mut self, symbol: KeySymbol) -> Result<(), HidError>;
}

impl<K: KeyInjector + ?Sized> KeyInjector for Box<K> {
    fn press(&mut self, symbol: KeySymbol) -> Result<(), HidError> {
        (**self).press(symbol)
    }

    fn release(&mut self, symbol: KeySymbol) -> Result<(), HidError> {
        (**self).release(symbol)
    }
}

/// Teclado virtual sobre /dev/uinput
pub struct UinputKeyboard {
    dev: Device,
}

impl UinputKeyboard {
    pub fn new() -> Result<Self, HidError> {
        let dev = uinput::default()?
            .name("body-controller-keyboard")?
            .event(uinput::event::Keyboard::All)?
            .create()?;

        Ok(UinputKeyboard { dev })
    }

    fn sync(&mut self) -> Result<(), HidError> {
        self.dev.synchronize()?;
        Ok(())
    }
}

impl KeyInjector for UinputKeyboard {
    fn press(&mut self, symbol: KeySymbol) -> Result<(), HidError> {
        let key = to_uinput_key(symbol)?;
        self.dev.press(&keyboard::Keyboard::Key(key))?;
        self.sync()
    }

    fn release(&mut self, symbol: KeySymbol) -> Result<(), HidError> {
        let key = to_uinput_key(symbol)?;
        self.dev.release(&keyboard::Keyboard::Key(key))?;
        self.sync()
    }
}

/// Traduce un símbolo a la tecla física. Las letras no distinguen mayúsculas.
fn to_uinput_key(symbol: KeySymbol) -> Result<keyboard::Key, HidError> {
    use keyboard::Key;

    let c = match symbol {
        KeySymbol::Named(named) => {
            return Ok(match named {
                NamedKey::Space => Key::Space,
                NamedKey::Shift => Key::LeftShift,
                NamedKey::Ctrl => Key::LeftControl,
                NamedKey::Tab => Key::Tab,
                NamedKey::Enter => Key::Enter,
                NamedKey::Esc => Key::Esc,
                NamedKey::Up => Key::Up,
                NamedKey::Down => Key::Down,
                NamedKey::Left => Key::Left,
                NamedKey::Right => Key::Right,
            })
        }
        KeySymbol::Char(c) => c,
    };

    let key = match c.to_ascii_lowercase() {
        'a' => Key::A,
        'b' => Key::B,
        'c' => Key::C,
        'd' => Key::D,
        'e' => Key::E,
        'f' => Key::F,
        'g' => Key::G,
        'h' => Key::H,
        'i' => Key::I,
        'j' => Key::J,
        'k' => Key::K,
        'l' => Key::L,
        'm' => Key::M,
        'n' => Key::N,
        'o' => Key::O,
        'p' => Key::P,
        'q' => Key::Q,
        'r' => Key::R,
        's' => Key::S,
        't' => Key::T,
        'u' => Key::U,
        'v' => Key::V,
        'w' => Key::W,
        'x' => Key::X,
        'y' => Key::Y,
        'z' => Key::Z,
        '0' => Key::_0,
        '1' => Key::_1,
        '2' => Key::_2,
        '3' => Key::_3,
        '4' => Key::_4,
        '5' => Key::_5,
        '6' => Key::_6,
        '7' => Key::_7,
        '8' => Key::_8,
        '9' => Key::_9,
        '-' => Key::Minus,
        '=' => Key::Equal,
        ',' => Key::Comma,
        '.' => Key::Dot,
        '/' => Key::Slash,
        ';' => Key::SemiColon,
        ' ' => Key::Space,
        _ => return Err(HidError::UnsupportedKey(c)),
    };
    Ok(key)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Press(KeySymbol),
    Release(KeySymbol),
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAction::Press(symbol) => write!(f, "press {}", symbol),
            KeyAction::Release(symbol) => write!(f, "release {}", symbol),
        }
    }
}

/// Teclado que solo registra las acciones (modo --dry-run y tests).
/// Acepta el mismo juego de teclas que `UinputKeyboard`.
#[derive(Debug)]
pub struct DryRunKeyboard {
    actions: Vec<KeyAction>,
    held: HashSet<KeySymbol>,
    record: bool,
}

impl Default for DryRunKeyboard {
    fn default() -> Self {
        Self {
            actions: Vec::new(),
            held: HashSet::new(),
            record: true,
        }
    }
}

impl DryRunKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Solo escribe en el log; para el daemon, que corre indefinidamente
    pub fn log_only() -> Self {
        Self {
            record: false,
            ..Self::default()
        }
    }

    pub fn actions(&self) -> &[KeyAction] {
        &self.actions
    }

    pub fn take_actions(&mut self) -> Vec<KeyAction> {
        std::mem::take(&mut self.actions)
    }

    pub fn is_held(&self, symbol: KeySymbol) -> bool {
        self.held.contains(&symbol)
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }
}

impl KeyInjector for DryRunKeyboard {
    fn press(&mut self, symbol: KeySymbol) -> Result<(), HidError> {
        to_uinput_key(symbol)?;
        info!("⌨️  press {}", symbol);
        self.held.insert(symbol);
        if self.record {
            self.actions.push(KeyAction::Press(symbol));
        }
        Ok(())
    }

    fn release(&mut self, symbol: KeySymbol) -> Result<(), HidError> {
        to_uinput_key(symbol)?;
        info!("⌨️  release {}", symbol);
        self.held.remove(&symbol);
        if self.record {
            self.actions.push(KeyAction::Release(symbol));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_translation() {
        assert!(to_uinput_key(KeySymbol::Char('u')).is_ok());
        assert!(to_uinput_key(KeySymbol::Char('U')).is_ok());
        assert!(to_uinput_key(KeySymbol::Char('7')).is_ok());
        for named in NamedKey::ALL {
            assert!(to_uinput_key(KeySymbol::Named(named)).is_ok());
        }
        assert!(matches!(
            to_uinput_key(KeySymbol::Char('ñ')),
            Err(HidError::UnsupportedKey('ñ'))
        ));
    }

    #[test]
    fn test_dry_run_records_actions() {
        let mut kb = DryRunKeyboard::new();
        kb.press(KeySymbol::Char('u')).unwrap();
        kb.press(KeySymbol::Named(NamedKey::Shift)).unwrap();
        assert_eq!(kb.held_count(), 2);

        kb.release(KeySymbol::Char('u')).unwrap();
        assert!(!kb.is_held(KeySymbol::Char('u')));
        assert!(kb.is_held(KeySymbol::Named(NamedKey::Shift)));

        let actions = kb.take_actions();
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[2], KeyAction::Release(KeySymbol::Char('u')));
        assert_eq!(actions[1].to_string(), "press <shift>");
        assert!(kb.actions().is_empty());
    }

    #[test]
    fn test_dry_run_rejects_unsupported_keys() {
        let mut kb = DryRunKeyboard::new();
        assert!(matches!(
            kb.press(KeySymbol::Char('ñ')),
            Err(HidError::UnsupportedKey('ñ'))
        ));
        assert!(kb.actions().is_empty());
        assert_eq!(kb.held_count(), 0);
    }

    #[test]
    fn test_log_only_keeps_held_state() {
        let mut kb = DryRunKeyboard::log_only();
        kb.press(KeySymbol::Char('w')).unwrap();
        assert!(kb.is_held(KeySymbol::Char('w')));
        assert!(kb.actions().is_empty());
    }

    #[test]
    fn test_boxed_injector() {
        let mut kb: Box<dyn KeyInjector> = Box::new(DryRunKeyboard::new());
        assert!(kb.press(KeySymbol::Char('a')).is_ok());
        assert!(kb.release(KeySymbol::Char('a')).is_ok());
    }
}
