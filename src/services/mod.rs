//! Migration services

pub mod assets;
pub mod batch;
pub mod classifier;
pub mod derivatives;
pub mod media;
pub mod pipeline;
pub mod replacer;

use std::sync::Arc;

use crate::config::AssetsConfig;

/// Container for the external collaborators of a run
pub struct Services {
    pub locator: Box<dyn assets::AssetLocator>,
    pub merger: Box<dyn media::PdfMerger>,
    pub sink: Box<dyn media::TabularSink>,
    pub deriver: Arc<dyn media::ImageDeriver>,
}

impl Services {
    /// Create the production services from configuration
    pub fn new(config: &AssetsConfig) -> Self {
        let locator: Box<dyn assets::AssetLocator> = match &config.share_root {
            Some(root) => {
                tracing::info!("Looking up digitised holdings under {}", root.display());
                Box::new(assets::ShareLocator::new(root))
            }
            None => {
                tracing::info!("No digitised holdings share configured");
                Box::new(assets::NoShare)
            }
        };
        Self {
            locator,
            merger: Box::new(media::QpdfMerger::new(&config.pdf_program)),
            sink: Box::new(media::CsvSink),
            deriver: Arc::new(media::MagickDeriver::new(&config.magick_program)),
        }
    }
}
