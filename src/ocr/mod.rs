pub mod bridge;
pub mod normalize;

pub use bridge::{load_detections, RawDetection, Region};
pub use normalize::normalize_detections;
