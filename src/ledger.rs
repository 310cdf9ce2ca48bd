//! Historial de comandos aceptados
//!
//! Un comando se suprime si otro movimiento de su grupo de exclusión fue
//! aceptado hace menos de `cooldown_ms`. Las entradas de más de
//! `HISTORY_RETENTION_MS` se descartan en cada llamada.

use log::debug;
use std::collections::VecDeque;

use crate::catalog::ExclusionGroup;
use crate::detector::CommandEvent;

pub const HISTORY_RETENTION_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub name: String,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryLedger {
    groups: Vec<ExclusionGroup>,
    /// Más reciente al frente
    entries: VecDeque<HistoryEntry>,
}

impl HistoryLedger {
    pub fn new(groups: Vec<ExclusionGroup>) -> Self {
        Self {
            groups,
            entries: VecDeque::new(),
        }
    }

    pub fn set_groups(&mut self, groups: Vec<ExclusionGroup>) {
        self.groups = groups;
    }

    /// Decide si el comando pasa. Si pasa, queda registrado.
    pub fn admit(&mut self, event: &CommandEvent) -> bool {
        self.prune(event.timestamp_ms);

        if let Some(group) = self.groups.iter().find(|g| g.contains(&event.name)) {
            let blocker = self.entries.iter().find(|entry| {
                group.contains(&entry.name)
                    && event.timestamp_ms.saturating_sub(entry.timestamp_ms) < group.cooldown_ms
            });

            if let Some(blocker) = blocker {
                debug!(
                    "suppressed {} at {}ms: {} accepted at {}ms",
                    event.name, event.timestamp_ms, blocker.name, blocker.timestamp_ms
                );
                return false;
            }
        }

        self.entries.push_front(HistoryEntry {
            name: event.name.clone(),
            timestamp_ms: event.timestamp_ms,
        });
        true
    }

    pub fn prune(&mut self, now_ms: u64) {
        self.entries
            .retain(|entry| now_ms.saturating_sub(entry.timestamp_ms) <= HISTORY_RETENTION_MS);
    }

    /// Entradas retenidas, la más reciente primero
    pub fn recent(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
