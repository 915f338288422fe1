pub mod image_cache;
