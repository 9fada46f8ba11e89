use std::fs;
use std::path::PathBuf;

use super::SweepConfig;
use crate::error::Result;
use crate::storage::write_atomic;

const LAST_SETTINGS_FILE: &str = "last_settings.json";

/// Persists the most recently used sweep configuration
pub struct SettingsStore {
    storage_dir: PathBuf,
}

impl SettingsStore {
    /// Create new store
    ///
    /// Creates the storage directory if it doesn't exist
    pub fn new(storage_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&storage_dir)?;
        Ok(Self { storage_dir })
    }

    pub fn path(&self) -> PathBuf {
        self.storage_dir.join(LAST_SETTINGS_FILE)
    }

    /// Save settings, replacing the previous file atomically
    pub fn save_last(&self, config: &SweepConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(config)?;
        write_atomic(&self.path(), json.as_bytes())?;
        log::info!("Settings saved to {:?}", self.path());
        Ok(())
    }

    /// Load the last settings, `None` if nothing was saved yet
    pub fn load_last(&self) -> Result<Option<SweepConfig>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path)?;
        let config = serde_json::from_str(&json)?;
        Ok(Some(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldSweepSpec, SweepTiming};
    use crate::hal::VnaSettings;
    use tempfile::tempdir;

    fn config() -> SweepConfig {
        SweepConfig {
            user_name: "alice".to_string(),
            sample_name: "yig".to_string(),
            measurement_name: "fmr_01".to_string(),
            description: String::new(),
            dipole_mode: 1,
            s_parameter: "S21".to_string(),
            angle: 0.0,
            ref_field: 0.0,
            avg_factor: 1,
            demagnetize: false,
            vna: VnaSettings {
                start_frequency: 1.0e9,
                stop_frequency: 5.0e9,
                bandwidth: 1000.0,
                power: -10.0,
                number_of_points: 401,
                cal_name: "cal_2024".to_string(),
            },
            timing: SweepTiming::default(),
            field_sweep: FieldSweepSpec::Range("0:5:50".to_string()),
        }
    }

    #[test]
    fn test_save_and_load_last() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().to_path_buf()).unwrap();

        assert!(store.load_last().unwrap().is_none());

        store.save_last(&config()).unwrap();
        let loaded = store.load_last().unwrap().unwrap();
        assert_eq!(loaded, config());
        assert!(!store.path().with_extension("tmp").exists());
    }
}
