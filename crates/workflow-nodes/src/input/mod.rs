//! Input nodes
//!
//! Nodes that bring servers and images into the workflow.

mod connector;
mod image_loader;

pub use connector::{select_model, OllamaConnectorTask, REFRESH_MODEL};
pub use image_loader::{
    input_dir, list_images, ImageLoaderTask, MultiImageLoaderTask, DEFAULT_INPUT_DIR,
    INPUT_DIR_ENV, MAX_IMAGE_INPUTS,
};
