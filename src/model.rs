use serde::{
    Deserialize,
    Serialize,
};

/// A pair of point counters. Totals are always derived, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub local: u64,
    pub global: u64,
}

impl Balance {
    pub fn new(local: u64, global: u64) -> Self {
        Self { local, global }
    }

    pub fn total(&self) -> u64 {
        self.local.saturating_add(self.global)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    pub points: Balance,
    pub icon: Option<String>,
}

impl UserRecord {
    pub fn new(username: impl Into<String>, local: u64, global: u64) -> Self {
        Self {
            username: username.into(),
            points: Balance::new(local, global),
            icon: None,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn local_points(&self) -> u64 {
        self.points.local
    }

    pub fn global_points(&self) -> u64 {
        self.points.global
    }

    pub fn total_points(&self) -> u64 {
        self.points.total()
    }

    /// Icon file for the card, falling back to `<username>.png`.
    pub fn icon_file(&self) -> String {
        match &self.icon {
            Some(icon) => icon.clone(),
            None => format!("{}.png", self.username.to_lowercase()),
        }
    }
}
