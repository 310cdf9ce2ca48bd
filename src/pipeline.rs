//! Pipeline por frame: detector → historial → procesadores → teclado

use anyhow::Result;
use log::{error, warn};

use crate::config::AppConfig;
use crate::condition::Thresholds;
use crate::detector::{CommandEvent, MovementDetector};
use crate::events::EventsHub;
use crate::hid::KeyInjector;
use crate::keys::CommandKeyMappings;
use crate::types::PoseSnapshot;

pub struct Pipeline<K: KeyInjector> {
    detector: MovementDetector,
    events: EventsHub,
    keyboard: K,
    frames_processed: u64,
    frames_skipped: u64,
    undelivered: u64,
}

impl<K: KeyInjector> Pipeline<K> {
    pub fn new(detector: MovementDetector, events: EventsHub, keyboard: K) -> Self {
        Self {
            detector,
            events,
            keyboard,
            frames_processed: 0,
            frames_skipped: 0,
            undelivered: 0,
        }
    }

    pub fn from_config(config: &AppConfig, keyboard: K) -> Result<Self> {
        let catalog = config.load_catalog()?;
        let events = EventsHub::from_config(config, catalog.groups().to_vec());
        Ok(Self::new(MovementDetector::new(catalog), events, keyboard))
    }

    /// Procesa un frame y devuelve los comandos admitidos y entregados al teclado.
    ///
    /// Un frame con valores no finitos se descarta completo y se registra.
    /// Un comando cuya inyección falla queda en el historial pero no se devuelve.
    pub fn process_frame(&mut self, snapshot: &PoseSnapshot, timestamp_ms: u64) -> Vec<CommandEvent> {
        self.tick(timestamp_ms);

        let fired = match self
            .detector
            .evaluate(snapshot, timestamp_ms, self.events.mappings())
        {
            Ok(fired) => fired,
            Err(e) => {
                self.frames_skipped += 1;
                warn!("⚠️  Skipping frame at {}ms: {}", timestamp_ms, e);
                return Vec::new();
            }
        };
        self.frames_processed += 1;

        let mut admitted = Vec::new();
        for event in fired {
            match self.events.add(&event, &mut self.keyboard) {
                Ok(true) => admitted.push(event),
                Ok(false) => {}
                Err(e) => {
                    self.undelivered += 1;
                    error!("❌ {} not delivered: {}", event.name, e);
                }
            }
        }
        admitted
    }

    /// Libera las teclas cuyo intervalo venció
    pub fn tick(&mut self, now_ms: u64) {
        if let Err(e) = self.events.tick(now_ms, &mut self.keyboard) {
            error!("❌ Key release failed: {}", e);
        }
    }

    pub fn set_keyboard_enabled(&mut self, enabled: bool) {
        if let Err(e) = self.events.set_keyboard_enabled(enabled, &mut self.keyboard) {
            error!("❌ Key release failed: {}", e);
        }
    }

    pub fn release_all(&mut self) {
        if let Err(e) = self.events.release_all(&mut self.keyboard) {
            error!("❌ Key release failed: {}", e);
        }
    }

    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.detector.set_thresholds(thresholds);
    }

    pub fn set_mappings(&mut self, mappings: CommandKeyMappings) {
        self.events.set_mappings(mappings);
    }

    pub fn detector(&self) -> &MovementDetector {
        &self.detector
    }

    pub fn events(&self) -> &EventsHub {
        &self.events
    }

    pub fn keyboard(&self) -> &K {
        &self.keyboard
    }

    pub fn keyboard_mut(&mut self) -> &mut K {
        &mut self.keyboard
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }

    /// Comandos admitidos cuya inyección de teclas falló
    pub fn undelivered(&self) -> u64 {
        self.undelivered
    }
}
