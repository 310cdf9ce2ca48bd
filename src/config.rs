//! Configuración de la aplicación (JSON)

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::{CommandClass, MovementCatalog};
use crate::condition::Thresholds;
use crate::keys::CommandKeyMappings;

pub const DEFAULT_CONTROL_NAME: &str = "Test";

/// Intervalo de liberación por clase de comando (ms)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PressIntervals {
    pub click_ms: u64,
    pub hold_ms: u64,
    pub hold_fast_ms: u64,
}

impl Default for PressIntervals {
    fn default() -> Self {
        Self {
            click_ms: 300,
            hold_ms: 1000,
            hold_fast_ms: 100,
        }
    }
}

impl PressIntervals {
    pub fn get(&self, class: CommandClass) -> u64 {
        match class {
            CommandClass::Click => self.click_ms,
            CommandClass::Hold => self.hold_ms,
            CommandClass::HoldFast => self.hold_fast_ms,
        }
    }
}

/// Perfil de controles: un juego completo de teclas con nombre
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlProfile {
    pub name: String,
    #[serde(default)]
    pub mappings: CommandKeyMappings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub keyboard_enabled: bool,
    pub press_intervals: PressIntervals,
    pub thresholds: Thresholds,
    pub controls: Vec<ControlProfile>,
    pub active_control: String,
    /// Catálogo en JSON que reemplaza al de referencia
    pub catalog: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            keyboard_enabled: false,
            press_intervals: PressIntervals::default(),
            thresholds: Thresholds::default(),
            controls: vec![ControlProfile {
                name: DEFAULT_CONTROL_NAME.to_string(),
                mappings: CommandKeyMappings::new(),
            }],
            active_control: DEFAULT_CONTROL_NAME.to_string(),
            catalog: None,
        }
    }
}

impl AppConfig {
    /// Carga la configuración; si el archivo no existe se usan los valores por defecto.
    /// Una ruta de catálogo relativa se resuelve contra el directorio del archivo.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Config {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("No se pudo leer la configuración {:?}", path))?;
        let mut config = Self::from_json(&text)
            .with_context(|| format!("Configuración inválida en {:?}", path))?;

        if let (Some(catalog), Some(dir)) = (config.catalog.as_mut(), path.parent()) {
            if catalog.is_relative() {
                *catalog = dir.join(&*catalog);
            }
        }

        info!(
            "Loaded config {:?}: keyboard {}, control '{}'",
            path,
            if config.keyboard_enabled { "on" } else { "off" },
            config.active_control
        );
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("JSON de configuración inválido")
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).with_context(|| format!("No se pudo escribir {:?}", path))
    }

    pub fn control(&self, name: &str) -> Option<&ControlProfile> {
        self.controls.iter().find(|c| c.name == name)
    }

    /// Teclas del perfil activo; vacío si el perfil no existe
    pub fn active_mappings(&self) -> CommandKeyMappings {
        match self.control(&self.active_control) {
            Some(profile) => profile.mappings.clone(),
            None => {
                warn!("Control profile '{}' not found", self.active_control);
                CommandKeyMappings::new()
            }
        }
    }

    /// Catálogo configurado, o el de referencia, con los umbrales de esta configuración
    pub fn load_catalog(&self) -> Result<MovementCatalog> {
        let Some(path) = &self.catalog else {
            return Ok(MovementCatalog::reference(self.thresholds));
        };

        let text = fs::read_to_string(path)
            .with_context(|| format!("No se pudo leer el catálogo {:?}", path))?;
        let catalog = MovementCatalog::from_json(&text, self.thresholds)
            .with_context(|| format!("Catálogo inválido en {:?}", path))?;
        info!("Loaded {} movements from {:?}", catalog.list().len(), path);
        Ok(catalog)
    }
}
