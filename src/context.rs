use std::sync::Arc;

use crate::analysis::dependencies::ScannerRegistry;
use crate::config::AppConfig;
use crate::services::{LanguageModelService, VersionControlService};

#[derive(Clone)]
pub struct AppContext {
    pub config: AppConfig,
    pub version_control: Arc<dyn VersionControlService>,
    pub language_model: Arc<dyn LanguageModelService>,
    pub scanners: Arc<ScannerRegistry>,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        version_control: Arc<dyn VersionControlService>,
        language_model: Arc<dyn LanguageModelService>,
    ) -> Self {
        Self {
            config,
            version_control,
            language_model,
            scanners: Arc::new(ScannerRegistry::default()),
        }
    }
}
