//! Image Loader Tasks
//!
//! Load images from the input directory into tensors, and merge several
//! tensors into one batch.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use graph_flow::{Context, NextAction, Task, TaskResult};
use inference::ImageTensor;
use node_engine::{
    ContextKeys, ExecutionMode, NodeCategory, NodeEngineError, PortDataType, PortMetadata,
    TaskDescriptor, TaskMetadata,
};

use crate::context_io::{read_input, read_int, require_input};

/// Environment variable overriding the image input directory
pub const INPUT_DIR_ENV: &str = "OLLAMA_NODES_INPUT_DIR";

/// Input directory used when the environment variable is unset
pub const DEFAULT_INPUT_DIR: &str = "input";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Largest number of image inputs on the multi-image loader
pub const MAX_IMAGE_INPUTS: usize = 8;

/// Resolve the image input directory
pub fn input_dir() -> PathBuf {
    std::env::var_os(INPUT_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT_DIR))
}

/// Sorted image file names in `dir`; empty if the directory is unreadable
pub fn list_images(dir: &Path) -> Vec<String> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("Cannot list images in {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut files: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    files.sort();
    files
}

/// Image Loader Task
///
/// # Inputs (from context)
/// - `{task_id}.input.image` (required) - File name relative to the input directory
///
/// # Outputs (to context)
/// - `{task_id}.output.image` - `1 × H × W × 3` tensor, blank on failure
/// - `{task_id}.output.info` - Load summary or the error message
#[derive(Clone)]
pub struct ImageLoaderTask {
    /// Unique identifier for this task instance
    task_id: String,
    /// Directory file names are resolved against
    input_dir: PathBuf,
}

impl ImageLoaderTask {
    /// Port ID for image file name input, and the tensor output
    pub const PORT_IMAGE: &'static str = "image";
    /// Port ID for info output
    pub const PORT_INFO: &'static str = "info";

    /// Create a new image loader reading from [`input_dir`]
    pub fn new(task_id: impl Into<String>) -> Self {
        Self::with_input_dir(task_id, input_dir())
    }

    /// Create an image loader reading from a specific directory
    pub fn with_input_dir(task_id: impl Into<String>, input_dir: impl Into<PathBuf>) -> Self {
        Self {
            task_id: task_id.into(),
            input_dir: input_dir.into(),
        }
    }

    /// Get the task ID
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    async fn load(&self, context: &Context) -> node_engine::Result<(ImageTensor, String)> {
        let name: String = require_input(context, &self.task_id, Self::PORT_IMAGE).await?;
        let name = name.trim();
        if name.is_empty() {
            return Err(NodeEngineError::invalid(Self::PORT_IMAGE, "no image selected"));
        }

        let relative = Path::new(name);
        if !relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
        {
            return Err(NodeEngineError::invalid(
                Self::PORT_IMAGE,
                format!("'{}' is outside the input directory", name),
            ));
        }

        let path = self.input_dir.join(relative);
        let bytes = tokio::fs::read(&path).await?;
        let decoded = image::load_from_memory(&bytes).map_err(|e| {
            NodeEngineError::failed(format!("cannot decode '{}': {}", path.display(), e))
        })?;
        let color = decoded.color();
        let rgb = decoded.to_rgb8();

        let info = format!(
            "Loaded {} ({}x{}, {:?})",
            path.display(),
            rgb.width(),
            rgb.height(),
            color
        );
        Ok((ImageTensor::from_rgb8(&rgb), info))
    }
}

impl TaskDescriptor for ImageLoaderTask {
    fn descriptor() -> TaskMetadata {
        let files = list_images(&input_dir());
        let mut image = PortMetadata::required(Self::PORT_IMAGE, "Image", PortDataType::Enum)
            .with_tooltip("Image file in the input directory");
        if let Some(first) = files.first() {
            image = image.with_default(serde_json::json!(first));
        }

        TaskMetadata {
            node_type: "image-loader".to_string(),
            category: NodeCategory::Input,
            label: "Image Loader".to_string(),
            description: "Loads an image file from the input directory".to_string(),
            inputs: vec![image.with_options(files)],
            outputs: vec![
                PortMetadata::required(Self::PORT_IMAGE, "Image", PortDataType::Image),
                PortMetadata::required(Self::PORT_INFO, "Info", PortDataType::String),
            ],
            execution_mode: ExecutionMode::Reactive,
        }
    }
}

inventory::submit!(node_engine::DescriptorFn(ImageLoaderTask::descriptor));

#[async_trait]
impl Task for ImageLoaderTask {
    fn id(&self) -> &str {
        &self.task_id
    }

    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let (tensor, info) = match self.load(&context).await {
            Ok(loaded) => loaded,
            Err(e) => {
                log::warn!("ImageLoaderTask {}: {}", self.task_id, e);
                (ImageTensor::placeholder(), format!("Error loading image: {}", e))
            }
        };

        context
            .set(&ContextKeys::output(&self.task_id, Self::PORT_IMAGE), tensor)
            .await;
        context
            .set(&ContextKeys::output(&self.task_id, Self::PORT_INFO), info.clone())
            .await;

        Ok(TaskResult::new(Some(info), NextAction::Continue))
    }
}

/// Multi Image Loader Task
///
/// Concatenates up to eight image tensors into one batch. Inputs whose
/// frame size differs from the first valid input are skipped.
///
/// # Inputs (from context)
/// - `{task_id}.input.input_count` (optional) - How many image ports to read, 1-8 (default: 2)
/// - `{task_id}.input.image_1` .. `image_8` (optional) - Image tensors
///
/// # Outputs (to context)
/// - `{task_id}.output.images` - The combined batch, blank when nothing was valid
#[derive(Clone)]
pub struct MultiImageLoaderTask {
    /// Unique identifier for this task instance
    task_id: String,
}

impl MultiImageLoaderTask {
    /// Port ID for input count
    pub const PORT_INPUT_COUNT: &'static str = "input_count";
    /// Port ID for images output
    pub const PORT_IMAGES: &'static str = "images";

    /// Create a new multi-image loader
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
        }
    }

    /// Get the task ID
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Port ID of the nth image input, starting at 1
    pub fn image_port(index: usize) -> String {
        format!("image_{}", index)
    }

    async fn collect(&self, context: &Context) -> Vec<ImageTensor> {
        let count = match read_int(context, &self.task_id, Self::PORT_INPUT_COUNT).await {
            Ok(count) => count.unwrap_or(2),
            Err(e) => {
                log::warn!("MultiImageLoaderTask {}: {}", self.task_id, e);
                2
            }
        };
        let count = count.clamp(1, MAX_IMAGE_INPUTS as i64) as usize;

        let mut images: Vec<ImageTensor> = Vec::new();
        for index in 1..=count {
            let port = Self::image_port(index);
            let tensor = match read_input::<ImageTensor>(context, &self.task_id, &port).await {
                Ok(Some(tensor)) if !tensor.is_empty() => tensor,
                Ok(_) => {
                    log::debug!("MultiImageLoaderTask {}: {} is empty", self.task_id, port);
                    continue;
                }
                Err(e) => {
                    log::warn!("MultiImageLoaderTask {}: {}", self.task_id, e);
                    continue;
                }
            };

            if let Some(first) = images.first() {
                if !first.same_frame_shape(&tensor) {
                    log::warn!(
                        "MultiImageLoaderTask {}: skipping {} ({}x{}), expected {}x{}",
                        self.task_id,
                        port,
                        tensor.width(),
                        tensor.height(),
                        first.width(),
                        first.height()
                    );
                    continue;
                }
            }
            images.push(tensor);
        }
        images
    }
}

impl TaskDescriptor for MultiImageLoaderTask {
    fn descriptor() -> TaskMetadata {
        let mut inputs = vec![PortMetadata::required(
            Self::PORT_INPUT_COUNT,
            "Input Count",
            PortDataType::Int,
        )
        .with_default(serde_json::json!(2))
        .with_range(1.0, MAX_IMAGE_INPUTS as f64)
        .with_step(1.0)
        .with_tooltip("Number of image inputs (1-8)")];
        inputs.extend((1..=MAX_IMAGE_INPUTS).map(|i| {
            PortMetadata::optional(
                Self::image_port(i),
                format!("Image {}", i),
                PortDataType::Image,
            )
        }));

        TaskMetadata {
            node_type: "multi-image-loader".to_string(),
            category: NodeCategory::Input,
            label: "Multi Image Loader".to_string(),
            description: "Combines several images into one batch".to_string(),
            inputs,
            outputs: vec![PortMetadata::required(
                Self::PORT_IMAGES,
                "Images",
                PortDataType::Image,
            )],
            execution_mode: ExecutionMode::Reactive,
        }
    }
}

inventory::submit!(node_engine::DescriptorFn(MultiImageLoaderTask::descriptor));

#[async_trait]
impl Task for MultiImageLoaderTask {
    fn id(&self) -> &str {
        &self.task_id
    }

    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let images = self.collect(&context).await;
        let combined = if images.is_empty() {
            log::warn!("MultiImageLoaderTask {}: no valid images", self.task_id);
            ImageTensor::placeholder()
        } else {
            match ImageTensor::concat(&images) {
                Ok(batch) => batch,
                Err(e) => {
                    log::warn!("MultiImageLoaderTask {}: {}", self.task_id, e);
                    ImageTensor::placeholder()
                }
            }
        };

        let summary = format!("{} image(s) of shape {:?}", combined.batch(), combined.shape());
        context
            .set(&ContextKeys::output(&self.task_id, Self::PORT_IMAGES), combined)
            .await;

        Ok(TaskResult::new(Some(summary), NextAction::Continue))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8 * 10, y as u8 * 10, 255]));
        img.save(dir.join(name)).unwrap();
    }

    fn tensor(height: usize, width: usize, value: f32) -> ImageTensor {
        ImageTensor::new([1, height, width, 3], vec![value; height * width * 3]).unwrap()
    }

    #[test]
    fn test_list_images_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "b.png", 2, 2);
        write_png(dir.path(), "a.png", 2, 2);
        std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        assert_eq!(list_images(dir.path()), vec!["a.png", "b.png"]);
        assert!(list_images(&dir.path().join("missing")).is_empty());
    }

    #[tokio::test]
    async fn test_load_image() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "photo.png", 4, 3);

        let task = ImageLoaderTask::with_input_dir("loader", dir.path());
        let context = Context::new();
        context
            .set(&ContextKeys::input("loader", "image"), "photo.png".to_string())
            .await;

        task.run(context.clone()).await.unwrap();

        let image: ImageTensor = context
            .get(&ContextKeys::output("loader", "image"))
            .await
            .unwrap();
        assert_eq!(image.shape(), [1, 3, 4, 3]);
        assert_eq!(image.data()[2], 1.0);

        let info: String = context
            .get(&ContextKeys::output("loader", "info"))
            .await
            .unwrap();
        assert!(info.starts_with("Loaded "));
        assert!(info.contains("4x3"));
    }

    #[tokio::test]
    async fn test_missing_file_gives_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let task = ImageLoaderTask::with_input_dir("loader", dir.path());
        let context = Context::new();
        context
            .set(&ContextKeys::input("loader", "image"), "absent.png".to_string())
            .await;

        task.run(context.clone()).await.unwrap();

        let image: ImageTensor = context
            .get(&ContextKeys::output("loader", "image"))
            .await
            .unwrap();
        assert_eq!(image, ImageTensor::placeholder());
        let info: String = context
            .get(&ContextKeys::output("loader", "info"))
            .await
            .unwrap();
        assert!(info.starts_with("Error loading image: I/O error"));
    }

    #[tokio::test]
    async fn test_rejects_names_outside_input_dir() {
        let root = tempfile::tempdir().unwrap();
        let input = root.path().join("input");
        std::fs::create_dir(&input).unwrap();
        write_png(root.path(), "secret.png", 2, 2);

        let task = ImageLoaderTask::with_input_dir("loader", &input);
        let absolute = root.path().join("secret.png").display().to_string();
        for name in ["../secret.png", "sub/../../secret.png", absolute.as_str()] {
            let context = Context::new();
            context
                .set(&ContextKeys::input("loader", "image"), name.to_string())
                .await;

            task.run(context.clone()).await.unwrap();

            let image: ImageTensor = context
                .get(&ContextKeys::output("loader", "image"))
                .await
                .unwrap();
            assert_eq!(image, ImageTensor::placeholder());
            let info: String = context
                .get(&ContextKeys::output("loader", "info"))
                .await
                .unwrap();
            assert!(info.contains("is outside the input directory"), "{}", info);
        }
    }

    #[tokio::test]
    async fn test_undecodable_file_gives_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.png"), b"not a png").unwrap();
        let task = ImageLoaderTask::with_input_dir("loader", dir.path());
        let context = Context::new();
        context
            .set(&ContextKeys::input("loader", "image"), "broken.png".to_string())
            .await;

        let result = task.run(context.clone()).await.unwrap();
        assert!(result.response.unwrap().contains("cannot decode"));
    }

    #[test]
    fn test_multi_descriptor_ports() {
        let meta = MultiImageLoaderTask::descriptor();
        assert_eq!(meta.node_type, "multi-image-loader");
        assert_eq!(meta.inputs.len(), 1 + MAX_IMAGE_INPUTS);
        assert!(meta.input("image_8").is_some());
        assert!(!meta.input("image_1").unwrap().required);
    }

    #[tokio::test]
    async fn test_multi_concatenates_matching_frames() {
        let task = MultiImageLoaderTask::new("multi");
        let context = Context::new();
        context
            .set(&ContextKeys::input("multi", "input_count"), 3)
            .await;
        context
            .set(&ContextKeys::input("multi", "image_1"), tensor(4, 4, 0.1))
            .await;
        context
            .set(&ContextKeys::input("multi", "image_2"), tensor(8, 8, 0.2))
            .await;
        context
            .set(&ContextKeys::input("multi", "image_3"), tensor(4, 4, 0.3))
            .await;
        // Beyond input_count, ignored
        context
            .set(&ContextKeys::input("multi", "image_4"), tensor(4, 4, 0.4))
            .await;

        task.run(context.clone()).await.unwrap();

        let images: ImageTensor = context
            .get(&ContextKeys::output("multi", "images"))
            .await
            .unwrap();
        assert_eq!(images.shape(), [2, 4, 4, 3]);
        assert_eq!(images.frame(1).unwrap(), tensor(4, 4, 0.3));
    }

    #[tokio::test]
    async fn test_multi_skips_mismatched_tensor() {
        let task = MultiImageLoaderTask::new("multi");
        let context = Context::new();
        context
            .set(
                &ContextKeys::input("multi", "image_1"),
                serde_json::json!({ "shape": [2, 8, 8, 3], "data": [0.5] }),
            )
            .await;
        context
            .set(&ContextKeys::input("multi", "image_2"), tensor(4, 4, 0.2))
            .await;

        task.run(context.clone()).await.unwrap();

        let images: ImageTensor = context
            .get(&ContextKeys::output("multi", "images"))
            .await
            .unwrap();
        assert_eq!(images, tensor(4, 4, 0.2));
    }

    #[tokio::test]
    async fn test_multi_without_inputs_gives_placeholder() {
        let task = MultiImageLoaderTask::new("multi");
        let context = Context::new();
        context
            .set(&ContextKeys::input("multi", "image_1"), "not a tensor".to_string())
            .await;

        task.run(context.clone()).await.unwrap();

        let images: ImageTensor = context
            .get(&ContextKeys::output("multi", "images"))
            .await
            .unwrap();
        assert_eq!(images, ImageTensor::placeholder());
    }
}
