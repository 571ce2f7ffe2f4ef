//! Locally persisted visitor state.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Colour scheme preference.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

/// Contents of the local state file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocalState {
    pub visitor_id: String,
    #[serde(default)]
    pub theme: Theme,
    /// Convenience flag only; admin routes are guarded by the service key.
    #[serde(default)]
    pub logged_in: bool,
}

impl LocalState {
    fn fresh() -> Self {
        Self {
            visitor_id: uuid::Uuid::new_v4().to_string(),
            theme: Theme::default(),
            logged_in: false,
        }
    }
}

/// File-backed [`LocalState`], rewritten on every change.
#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    state: LocalState,
}

impl LocalStore {
    /// Open the state file, creating it with a new visitor identifier if absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();

        let state = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<LocalState>(&contents) {
                Ok(state) if !state.visitor_id.trim().is_empty() => Some(state),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!("Unreadable local state at {:?}, starting fresh: {}", path, e);
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let store = match state {
            Some(state) => Self { path, state },
            None => {
                let store = Self {
                    path,
                    state: LocalState::fresh(),
                };
                store.save()?;
                tracing::info!("Created visitor identity {}", store.state.visitor_id);
                store
            }
        };

        Ok(store)
    }

    pub fn state(&self) -> &LocalState {
        &self.state
    }

    pub fn visitor_id(&self) -> &str {
        &self.state.visitor_id
    }

    pub fn theme(&self) -> Theme {
        self.state.theme
    }

    pub fn toggle_theme(&mut self) -> Result<Theme, AppError> {
        self.state.theme = self.state.theme.toggled();
        self.save()?;
        Ok(self.state.theme)
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.logged_in
    }

    pub fn set_logged_in(&mut self, logged_in: bool) -> Result<(), AppError> {
        self.state.logged_in = logged_in;
        self.save()
    }

    fn save(&self) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.state)?)?;
        Ok(())
    }
}
