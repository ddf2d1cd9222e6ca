pub mod segmentation;
pub mod video;
