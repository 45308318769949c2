use std::{fs::File, io::BufReader, path::Path};

use bevy::prelude::*;
use serde::Deserialize;

/// Tunable gameplay parameters, read from `assets/settings.json` at startup.
#[derive(Debug, Clone, Resource, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub mouse_sensitivity: f32,
    pub player_speed: f32,
    pub sprint_multiplier: f32,
    pub jump_impulse: f32,
}

impl Default for GameSettings {
    fn default() -> Self {
        GameSettings {
            mouse_sensitivity: 0.004,
            player_speed: 3.,
            sprint_multiplier: 2.,
            jump_impulse: 5.,
        }
    }
}

impl GameSettings {
    /// Load settings from the given JSON file, falling back to the defaults
    /// if the file is missing or malformed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match File::open(path) {
            Ok(file) => match serde_json::from_reader(BufReader::new(file)) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("malformed settings file {}: {}", path.display(), e);
                    GameSettings::default()
                }
            },
            Err(e) => {
                warn!("cannot read settings file {}: {}", path.display(), e);
                GameSettings::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = GameSettings::load_or_default("does/not/exist.json");
        assert_eq!(settings.player_speed, GameSettings::default().player_speed);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let settings: GameSettings =
            serde_json::from_str(r#"{ "player_speed": 5.0 }"#).unwrap();
        assert_eq!(settings.player_speed, 5.);
        assert_eq!(
            settings.sprint_multiplier,
            GameSettings::default().sprint_multiplier
        );
    }
}
