use crate::config::Config;

/// Settings the pipeline reads for every job.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub ocr_model: String,
    pub chat_model: String,
    pub signed_url_expiry_hours: u32,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ocr_model: config.remote.ocr_model.clone(),
            chat_model: config.remote.chat_model.clone(),
            signed_url_expiry_hours: config.remote.signed_url_expiry_hours,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
