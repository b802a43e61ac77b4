use crate::store::atomic_rename;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub plant_name: String,
    pub tick_ms: u64,
    pub mood_check_secs: u64,
    pub fps_cap: u32,
    pub enable_color: bool,
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            plant_name: "Doug".to_string(),
            tick_ms: 1000,
            mood_check_secs: 60,
            fps_cap: 30,
            enable_color: true,
            seed: None,
        }
    }
}

pub struct Paths {
    pub save_path: PathBuf,
    pub settings_path: PathBuf,
    pub log_path: PathBuf,
}

impl Paths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            save_path: dir.join("save.json"),
            settings_path: dir.join("settings.json"),
            log_path: dir.join("plantbuddy.log"),
        }
    }
}

/// Uses `override_dir` when given, otherwise the platform data directory.
pub fn project_paths(override_dir: Option<&Path>) -> Result<Paths> {
    let dir = match override_dir {
        Some(d) => d.to_path_buf(),
        None => ProjectDirs::from("com", "plantbuddy", "PlantBuddy")
            .context("could not resolve project directories")?
            .data_local_dir()
            .to_path_buf(),
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("could not create data directory {}", dir.display()))?;
    Ok(Paths::in_dir(&dir))
}

pub fn load_settings(path: &Path) -> Settings {
    if let Ok(s) = fs::read_to_string(path) {
        if let Ok(v) = serde_json::from_str::<Settings>(&s) {
            return v;
        }
    }
    Settings::default()
}

pub fn save_settings_atomic(path: &Path, s: &Settings) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(s)?;
    fs::write(&tmp, data)?;
    atomic_rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_settings_fill_in_defaults() {
        let s: Settings = serde_json::from_str(r#"{"plant_name":"Fern","seed":9}"#).unwrap();
        assert_eq!(s.plant_name, "Fern");
        assert_eq!(s.seed, Some(9));
        assert_eq!(s.tick_ms, 1000);
        assert_eq!(s.mood_check_secs, 60);
    }

    #[test]
    fn settings_round_trip_on_disk() {
        let dir = std::env::temp_dir().join(format!("plantbuddy-cfg-{}", std::process::id()));
        let paths = project_paths(Some(&dir)).unwrap();

        assert_eq!(load_settings(&paths.settings_path), Settings::default());

        let custom = Settings {
            plant_name: "Ivy".to_string(),
            fps_cap: 15,
            ..Settings::default()
        };
        save_settings_atomic(&paths.settings_path, &custom).unwrap();
        assert_eq!(load_settings(&paths.settings_path), custom);

        let _ = fs::remove_dir_all(&dir);
    }
}
