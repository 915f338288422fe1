pub mod batch_process;
pub mod download;
pub mod health;
pub mod serve;
pub mod status;
