pub mod analyze;
pub mod init_config;
pub mod model_info;
pub mod train;
