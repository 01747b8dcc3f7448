use std::ffi::OsString;
use std::path::PathBuf;

/// Environment variable that overrides `SceneConfig::asset_dir`.
pub const ASSETS_ENV: &str = "PENUMBRA_ASSETS";

/// Demo scene parameters.
#[derive(Debug, Clone)]
pub struct SceneConfig {
    /// Directory holding `texture.png` and `normal.png`.
    pub asset_dir: PathBuf,

    pub sprite_columns: u32,
    pub sprite_rows: u32,
    /// Distance between neighbouring sprite origins, in pixels.
    pub sprite_spacing: f32,
    pub sprite_size: f32,

    /// Edge length of the animated and cursor lights.
    pub light_size: f32,
    /// Radius of the animated lights' motion.
    pub light_orbit: f32,
    pub cursor_light: bool,

    /// Start with the dense light grid enabled (toggled with `L`).
    pub dense_grid: bool,
    pub dense_columns: u32,
    pub dense_rows: u32,
    pub dense_spacing: f32,
    pub dense_size: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            asset_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/assets")),
            sprite_columns: 8,
            sprite_rows: 6,
            sprite_spacing: 100.0,
            sprite_size: 200.0,
            light_size: 400.0,
            light_orbit: 200.0,
            cursor_light: true,
            dense_grid: false,
            dense_columns: 160,
            dense_rows: 120,
            dense_spacing: 8.0,
            dense_size: 16.0,
        }
    }
}

impl SceneConfig {
    /// Defaults plus the `PENUMBRA_ASSETS` override.
    pub fn from_env() -> Self {
        Self::default().with_asset_override(std::env::var_os(ASSETS_ENV))
    }

    fn with_asset_override(mut self, dir: Option<OsString>) -> Self {
        if let Some(dir) = dir.filter(|d| !d.is_empty()) {
            self.asset_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn color_texture_path(&self) -> PathBuf {
        self.asset_dir.join("texture.png")
    }

    pub fn normal_texture_path(&self) -> PathBuf {
        self.asset_dir.join("normal.png")
    }
}
