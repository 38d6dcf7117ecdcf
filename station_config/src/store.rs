//! Write path for the few settings the station changes at runtime.
use crate::atomic::write_atomic;
use crate::Config;
use std::path::{Path, PathBuf};

/// Narrow persistence capability used by the controller.
///
/// Only calibration and the running flag are writable; everything else in
/// the config is read-only at runtime.
pub trait ConfigStore {
    /// Current (tare, scale).
    fn calibration(&self) -> (f64, f64);
    fn save_calibration(&mut self, tare: f64, scale: f64) -> eyre::Result<()>;
    fn running(&self) -> bool;
    fn set_running(&mut self, running: bool) -> eyre::Result<()>;
}

/// TOML file store. Keeps the parsed config in memory and rewrites the whole
/// file atomically on every change.
pub struct TomlConfigStore {
    path: PathBuf,
    config: Config,
}

impl TomlConfigStore {
    pub fn open(path: &Path) -> eyre::Result<Self> {
        let config = crate::load_file(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Write `next` to disk and adopt it. On failure the in-memory config
    /// keeps matching the file.
    fn commit(&mut self, next: Config) -> eyre::Result<()> {
        let text =
            toml::to_string_pretty(&next).map_err(|e| eyre::eyre!("serialize config: {e}"))?;
        write_atomic(&self.path, text.as_bytes())
            .map_err(|e| eyre::eyre!("write config {}: {e}", self.path.display()))?;
        self.config = next;
        tracing::debug!(path = %self.path.display(), "config persisted");
        Ok(())
    }
}

impl ConfigStore for TomlConfigStore {
    fn calibration(&self) -> (f64, f64) {
        (self.config.calibration.tare, self.config.calibration.scale)
    }

    fn save_calibration(&mut self, tare: f64, scale: f64) -> eyre::Result<()> {
        if !tare.is_finite() || !scale.is_finite() {
            eyre::bail!("refusing to persist non-finite calibration (tare={tare}, scale={scale})");
        }
        let mut next = self.config.clone();
        next.calibration.tare = tare;
        next.calibration.scale = scale;
        self.commit(next)
    }

    fn running(&self) -> bool {
        self.config.station.running
    }

    fn set_running(&mut self, running: bool) -> eyre::Result<()> {
        let mut next = self.config.clone();
        next.station.running = running;
        self.commit(next)
    }
}

/// In-memory store for tests and one-shot commands.
#[derive(Debug, Clone)]
pub struct MemoryConfigStore {
    pub tare: f64,
    pub scale: f64,
    pub running: bool,
    /// Number of successful writes, to assert persistence happened.
    pub writes: usize,
    /// When set, every write fails with this message.
    pub fail_writes: Option<String>,
}

impl MemoryConfigStore {
    pub fn new(tare: f64, scale: f64, running: bool) -> Self {
        Self {
            tare,
            scale,
            running,
            writes: 0,
            fail_writes: None,
        }
    }

    fn check(&self) -> eyre::Result<()> {
        match &self.fail_writes {
            Some(msg) => eyre::bail!("{msg}"),
            None => Ok(()),
        }
    }
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self::new(0.0, 1.0, false)
    }
}

impl ConfigStore for MemoryConfigStore {
    fn calibration(&self) -> (f64, f64) {
        (self.tare, self.scale)
    }

    fn save_calibration(&mut self, tare: f64, scale: f64) -> eyre::Result<()> {
        self.check()?;
        self.tare = tare;
        self.scale = scale;
        self.writes += 1;
        Ok(())
    }

    fn running(&self) -> bool {
        self.running
    }

    fn set_running(&mut self, running: bool) -> eyre::Result<()> {
        self.check()?;
        self.running = running;
        self.writes += 1;
        Ok(())
    }
}
