//! Domain models.

mod job;
mod property_image;

pub use job::{JobStatus, MirrorJob, MirrorJobPayload};
pub use property_image::{ImageSource, ImageStatus, MirroredImage, PropertyImage};
