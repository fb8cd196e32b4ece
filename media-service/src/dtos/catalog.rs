use crate::models::{ImageBounds, Mode, Provider};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ModeSupport {
    pub mode: Mode,
    pub min_images: usize,
    pub max_images: usize,
}

impl ModeSupport {
    pub fn new(mode: Mode, bounds: ImageBounds) -> Self {
        Self {
            mode,
            min_images: bounds.min,
            max_images: bounds.max,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub name: &'static str,
    pub provider: Provider,
    pub modes: Vec<ModeSupport>,
}

#[derive(Debug, Serialize)]
pub struct ModelCatalog {
    pub models: Vec<ModelInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub styles: Vec<&'static str>,
    pub shapes: Vec<&'static str>,
    pub default_shape: &'static str,
}
