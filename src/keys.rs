use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Teclas especiales que se pueden usar como modificador
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamedKey {
    Space,
    Shift,
    Ctrl,
    Tab,
    Enter,
    Esc,
    Up,
    Down,
    Left,
    Right,
}

impl NamedKey {
    pub const ALL: [NamedKey; 10] = [
        NamedKey::Space,
        NamedKey::Shift,
        NamedKey::Ctrl,
        NamedKey::Tab,
        NamedKey::Enter,
        NamedKey::Esc,
        NamedKey::Up,
        NamedKey::Down,
        NamedKey::Left,
        NamedKey::Right,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NamedKey::Space => "space",
            NamedKey::Shift => "shift",
            NamedKey::Ctrl => "ctrl",
            NamedKey::Tab => "tab",
            NamedKey::Enter => "enter",
            NamedKey::Esc => "esc",
            NamedKey::Up => "up",
            NamedKey::Down => "down",
            NamedKey::Left => "left",
            NamedKey::Right => "right",
        }
    }
}

impl fmt::Display for NamedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NamedKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NamedKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("unknown key name '{}'", s))
    }
}

/// Lo que recibe el inyector de teclado: un carácter o una tecla especial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySymbol {
    Char(char),
    Named(NamedKey),
}

impl fmt::Display for KeySymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySymbol::Char(c) => write!(f, "'{}'", c),
            KeySymbol::Named(key) => write!(f, "<{}>", key),
        }
    }
}

fn default_active() -> bool {
    true
}

/// Asignación de un movimiento a tecla + modificador
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMapping {
    #[serde(default)]
    pub key: Option<char>,
    #[serde(default)]
    pub modifier: Option<NamedKey>,
    /// Un movimiento inactivo no se evalúa
    #[serde(default = "default_active")]
    pub active: bool,
}

impl Default for KeyMapping {
    fn default() -> Self {
        Self {
            key: None,
            modifier: None,
            active: true,
        }
    }
}

impl KeyMapping {
    pub fn key(key: char) -> Self {
        Self {
            key: Some(key),
            ..Self::default()
        }
    }

    pub fn modifier(modifier: NamedKey) -> Self {
        Self {
            modifier: Some(modifier),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_none() && self.modifier.is_none()
    }
}

/// Nombre de movimiento → asignación de teclas
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandKeyMappings(HashMap<String, KeyMapping>);

impl CommandKeyMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, mapping: KeyMapping) {
        self.0.insert(name.into(), mapping);
    }

    pub fn with(mut self, name: impl Into<String>, mapping: KeyMapping) -> Self {
        self.insert(name, mapping);
        self
    }

    pub fn get(&self, name: &str) -> Option<&KeyMapping> {
        self.0.get(name)
    }

    /// Movimientos desactivados por el usuario
    pub fn disabled_movements(&self) -> HashSet<&str> {
        self.0
            .iter()
            .filter(|(_, mapping)| !mapping.active)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
