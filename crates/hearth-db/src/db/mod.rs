pub mod mirror_job;
pub mod property_image;
