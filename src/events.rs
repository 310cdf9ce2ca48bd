//! Concentrador de eventos: historial de exclusión + un procesador por clase

use log::{info, warn};
use std::fmt;

use crate::catalog::{CommandClass, ExclusionGroup};
use crate::command::CommandProcessor;
use crate::config::{AppConfig, PressIntervals};
use crate::detector::CommandEvent;
use crate::hid::{HidError, KeyInjector};
use crate::keys::CommandKeyMappings;
use crate::ledger::HistoryLedger;

pub struct EventsHub {
    ledger: HistoryLedger,
    processors: [CommandProcessor; 3],
    keyboard_enabled: bool,
    press_intervals: PressIntervals,
    mappings: CommandKeyMappings,
}

impl EventsHub {
    pub fn new(
        groups: Vec<ExclusionGroup>,
        keyboard_enabled: bool,
        press_intervals: PressIntervals,
        mappings: CommandKeyMappings,
    ) -> Self {
        Self {
            ledger: HistoryLedger::new(groups),
            processors: CommandClass::ALL.map(CommandProcessor::new),
            keyboard_enabled,
            press_intervals,
            mappings,
        }
    }

    pub fn from_config(config: &AppConfig, groups: Vec<ExclusionGroup>) -> Self {
        Self::new(
            groups,
            config.keyboard_enabled,
            config.press_intervals,
            config.active_mappings(),
        )
    }

    pub fn processor(&self, class: CommandClass) -> &CommandProcessor {
        &self.processors[class_index(class)]
    }

    /// Pasa el evento por el historial y, si se admite, a su procesador.
    /// Devuelve si fue admitido.
    pub fn add(&mut self, event: &CommandEvent, kb: &mut dyn KeyInjector) -> Result<bool, HidError> {
        if !self.ledger.admit(event) {
            return Ok(false);
        }

        info!("✋ {} ({}) at {}ms", event.name, event.class, event.timestamp_ms);

        let interval = self.press_intervals.get(event.class);
        self.processors[class_index(event.class)].on_command(
            &event.name,
            self.keyboard_enabled,
            &self.mappings,
            interval,
            event.timestamp_ms,
            kb,
        )?;
        Ok(true)
    }

    /// Revisa las liberaciones pendientes de las tres clases.
    /// Un fallo en una clase no impide revisar las demás.
    pub fn tick(&mut self, now_ms: u64, kb: &mut dyn KeyInjector) -> Result<(), HidError> {
        let mut first_err = None;
        for processor in self.processors.iter_mut() {
            if let Err(e) = processor.tick(now_ms, kb) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    pub fn release_all(&mut self, kb: &mut dyn KeyInjector) -> Result<(), HidError> {
        let mut first_err = None;
        for processor in self.processors.iter_mut() {
            if let Err(e) = processor.release_all(kb) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    pub fn keyboard_enabled(&self) -> bool {
        self.keyboard_enabled
    }

    /// Al desactivar el teclado se sueltan todas las teclas presionadas
    pub fn set_keyboard_enabled(
        &mut self,
        enabled: bool,
        kb: &mut dyn KeyInjector,
    ) -> Result<(), HidError> {
        self.keyboard_enabled = enabled;
        if enabled {
            info!("⌨️  keyboard enabled");
            Ok(())
        } else {
            warn!("⌨️  keyboard disabled, releasing held keys");
            self.release_all(kb)
        }
    }

    pub fn mappings(&self) -> &CommandKeyMappings {
        &self.mappings
    }

    pub fn set_mappings(&mut self, mappings: CommandKeyMappings) {
        self.mappings = mappings;
    }

    pub fn set_press_intervals(&mut self, press_intervals: PressIntervals) {
        self.press_intervals = press_intervals;
    }

    pub fn set_groups(&mut self, groups: Vec<ExclusionGroup>) {
        self.ledger.set_groups(groups);
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }
}

// Mismo orden que CommandClass::ALL
fn class_index(class: CommandClass) -> usize {
    match class {
        CommandClass::Click => 0,
        CommandClass::Hold => 1,
        CommandClass::HoldFast => 2,
    }
}

impl fmt::Display for EventsHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, processor) in self.processors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", processor)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MovementCatalog;
    use crate::hid::{DryRunKeyboard, KeyAction};
    use crate::keys::{KeyMapping, KeySymbol, NamedKey};

    fn event(name: &str, class: CommandClass, timestamp_ms: u64) -> CommandEvent {
        CommandEvent {
            name: name.to_string(),
            class,
            timestamp_ms,
        }
    }

    fn hub(keyboard_enabled: bool) -> EventsHub {
        let mappings = CommandKeyMappings::new()
            .with("cross_hands", KeyMapping::key('x'))
            .with("left_swing", KeyMapping::key('l'))
            .with("walk_both_hands_down", KeyMapping::modifier(NamedKey::Up))
            .with("face_tilt_left", KeyMapping::modifier(NamedKey::Left));
        EventsHub::new(
            MovementCatalog::default().groups().to_vec(),
            keyboard_enabled,
            PressIntervals::default(),
            mappings,
        )
    }

    #[test]
    fn test_suppressed_event_never_reaches_keyboard() {
        let mut hub = hub(true);
        let mut kb = DryRunKeyboard::new();

        assert!(hub.add(&event("cross_hands", CommandClass::Click, 0), &mut kb).unwrap());
        assert!(!hub.add(&event("left_swing", CommandClass::Click, 500), &mut kb).unwrap());
        assert_eq!(kb.actions(), &[KeyAction::Press(KeySymbol::Char('x'))]);
        assert_eq!(hub.processor(CommandClass::Click).summary(), "cross_hands");
    }

    #[test]
    fn test_classes_are_independent() {
        let mut hub = hub(true);
        let mut kb = DryRunKeyboard::new();

        hub.add(&event("walk_both_hands_down", CommandClass::Hold, 0), &mut kb).unwrap();
        hub.add(&event("face_tilt_left", CommandClass::HoldFast, 10), &mut kb).unwrap();
        assert!(kb.is_held(KeySymbol::Named(NamedKey::Up)));
        assert!(kb.is_held(KeySymbol::Named(NamedKey::Left)));

        hub.tick(110, &mut kb).unwrap();
        assert!(kb.is_held(KeySymbol::Named(NamedKey::Up)));
        assert!(!kb.is_held(KeySymbol::Named(NamedKey::Left)));

        hub.tick(1000, &mut kb).unwrap();
        assert_eq!(kb.held_count(), 0);
    }

    #[test]
    fn test_disabling_keyboard_releases_everything() {
        let mut hub = hub(true);
        let mut kb = DryRunKeyboard::new();

        hub.add(&event("walk_both_hands_down", CommandClass::Hold, 0), &mut kb).unwrap();
        hub.add(&event("cross_hands", CommandClass::Click, 0), &mut kb).unwrap();
        assert_eq!(kb.held_count(), 2);

        hub.set_keyboard_enabled(false, &mut kb).unwrap();
        assert_eq!(kb.held_count(), 0);

        // Sigue registrando pero no presiona
        kb.take_actions();
        hub.add(&event("cross_hands", CommandClass::Click, 5000), &mut kb).unwrap();
        assert!(kb.actions().is_empty());
        assert_eq!(hub.processor(CommandClass::Click).log_len(), 2);
    }

    #[test]
    fn test_display_lists_three_classes() {
        let mut hub = hub(false);
        let mut kb = DryRunKeyboard::new();
        hub.add(&event("cross_hands", CommandClass::Click, 0), &mut kb).unwrap();

        let text = hub.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["click: cross_hands", "hold: ", "hold_fast: "]);
    }
}
