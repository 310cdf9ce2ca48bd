//! Procesador de comandos por clase (click, hold, hold_fast)
//!
//! Mantiene como máximo una tecla (+ modificador) presionada. Cada comando
//! reprograma la liberación a `press_interval_ms`; la liberación se revisa
//! con `tick`, en el mismo hilo que procesa los frames.

use log::{debug, error, info};
use std::collections::VecDeque;
use std::fmt;

use crate::catalog::CommandClass;
use crate::hid::{HidError, KeyInjector};
use crate::keys::{CommandKeyMappings, KeySymbol, NamedKey};

/// El log se recorta a `COMMAND_LOG_KEEP` entradas al superar este tamaño
pub const COMMAND_LOG_LIMIT: usize = 900;
pub const COMMAND_LOG_KEEP: usize = 10;

const SUMMARY_PREVIOUS: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressingState {
    pub key: Option<char>,
    pub modifier: Option<NamedKey>,
    pub since_ms: u64,
}

impl PressingState {
    fn same_keys(&self, key: Option<char>, modifier: Option<NamedKey>) -> bool {
        self.key == key && self.modifier == modifier
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedCommand {
    pub name: String,
    pub timestamp_ms: u64,
}

#[derive(Debug)]
pub struct CommandProcessor {
    class: CommandClass,
    pressing: Option<PressingState>,
    release_at_ms: Option<u64>,
    /// Más reciente al frente
    log: VecDeque<LoggedCommand>,
}

impl CommandProcessor {
    pub fn new(class: CommandClass) -> Self {
        Self {
            class,
            pressing: None,
            release_at_ms: None,
            log: VecDeque::new(),
        }
    }

    pub fn class(&self) -> CommandClass {
        self.class
    }

    pub fn pressing(&self) -> Option<&PressingState> {
        self.pressing.as_ref()
    }

    pub fn release_at_ms(&self) -> Option<u64> {
        self.release_at_ms
    }

    pub fn on_command(
        &mut self,
        name: &str,
        keyboard_enabled: bool,
        mappings: &CommandKeyMappings,
        press_interval_ms: u64,
        now_ms: u64,
        kb: &mut dyn KeyInjector,
    ) -> Result<(), HidError> {
        self.record(name, now_ms);

        if !keyboard_enabled {
            debug!("[{}] {} logged, keyboard disabled", self.class, name);
            return Ok(());
        }

        let Some(mapping) = mappings.get(name).filter(|m| !m.is_empty()) else {
            debug!("[{}] {} has no key mapping", self.class, name);
            return Ok(());
        };
        let (key, modifier) = (mapping.key, mapping.modifier);

        self.release_at_ms = None;

        let unchanged = self
            .pressing
            .map_or(false, |current| current.same_keys(key, modifier));
        if !unchanged {
            self.release_current(kb)?;
            press_keys(key, modifier, kb)?;
            info!("[{}] {} → {}", self.class, name, describe(key, modifier));
        }

        self.release_at_ms = Some(now_ms.saturating_add(press_interval_ms));
        self.pressing = Some(PressingState {
            key,
            modifier,
            since_ms: now_ms,
        });
        Ok(())
    }

    /// Libera la tecla si venció su intervalo
    pub fn tick(&mut self, now_ms: u64, kb: &mut dyn KeyInjector) -> Result<(), HidError> {
        match self.release_at_ms {
            Some(release_at) if now_ms >= release_at => {
                self.release_at_ms = None;
                self.release_current(kb)
            }
            _ => Ok(()),
        }
    }

    pub fn release_all(&mut self, kb: &mut dyn KeyInjector) -> Result<(), HidError> {
        self.release_at_ms = None;
        self.release_current(kb)
    }

    /// Suelta tecla y modificador; intenta ambos aunque el primero falle
    fn release_current(&mut self, kb: &mut dyn KeyInjector) -> Result<(), HidError> {
        let Some(current) = self.pressing.take() else {
            return Ok(());
        };
        let key_result = match current.key {
            Some(key) => kb.release(KeySymbol::Char(key)),
            None => Ok(()),
        };
        let modifier_result = match current.modifier {
            Some(modifier) => kb.release(KeySymbol::Named(modifier)),
            None => Ok(()),
        };
        debug!("[{}] released {}", self.class, describe(current.key, current.modifier));
        key_result.and(modifier_result)
    }

    fn record(&mut self, name: &str, now_ms: u64) {
        self.log.push_front(LoggedCommand {
            name: name.to_string(),
            timestamp_ms: now_ms,
        });
        if self.log.len() > COMMAND_LOG_LIMIT {
            self.log.truncate(COMMAND_LOG_KEEP);
        }
    }

    /// Comandos recibidos, el más reciente primero
    pub fn log(&self) -> impl Iterator<Item = &LoggedCommand> {
        self.log.iter()
    }

    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    /// Último comando seguido de hasta 9 anteriores
    pub fn summary(&self) -> String {
        self.log
            .iter()
            .take(1 + SUMMARY_PREVIOUS)
            .map(|entry| entry.name.as_str())
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl fmt::Display for CommandProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.class, self.summary())
    }
}

/// Presiona modificador y luego tecla. Si la tecla falla, el modificador
/// se suelta antes de devolver el error: nada queda presionado sin registrar.
fn press_keys(
    key: Option<char>,
    modifier: Option<NamedKey>,
    kb: &mut dyn KeyInjector,
) -> Result<(), HidError> {
    if let Some(modifier) = modifier {
        kb.press(KeySymbol::Named(modifier))?;
    }
    let Some(key) = key else {
        return Ok(());
    };
    if let Err(e) = kb.press(KeySymbol::Char(key)) {
        if let Some(modifier) = modifier {
            if let Err(rollback) = kb.release(KeySymbol::Named(modifier)) {
                error!("❌ Could not release {} after failed press: {}", modifier, rollback);
            }
        }
        return Err(e);
    }
    Ok(())
}

fn describe(key: Option<char>, modifier: Option<NamedKey>) -> String {
    match (modifier, key) {
        (Some(m), Some(k)) => format!("{}+{}", m, k),
        (Some(m), None) => m.to_string(),
        (None, Some(k)) => k.to_string(),
        (None, None) => String::from("-"),
    }
}
