//! Bulk JPEG derivative generation
//!
//! Masters are found under a folder and converted on a bounded pool of
//! blocking workers. Each job is independent; a failed job is logged and
//! counted, it never stops the others.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use walkdir::WalkDir;

use super::media::ImageDeriver;
use crate::error::{AppError, AppResult};

/// Extensions treated as image masters
pub const MASTER_EXTENSIONS: &[&str] = &["tif", "tiff", "dng"];

/// Outcome of a derivative run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivativeSummary {
    pub created: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Master images below `dir`, in path order
pub fn find_masters(dir: &Path) -> Vec<PathBuf> {
    let mut masters: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .map(|ext| {
                    MASTER_EXTENSIONS
                        .iter()
                        .any(|m| ext.eq_ignore_ascii_case(m))
                })
                .unwrap_or(false)
        })
        .collect();
    masters.sort();
    masters
}

/// Bounded derivative worker pool
pub struct DerivativePool {
    deriver: Arc<dyn ImageDeriver>,
    dimension: u32,
    workers: usize,
}

impl DerivativePool {
    pub fn new(deriver: Arc<dyn ImageDeriver>, dimension: u32, workers: usize) -> Self {
        Self {
            deriver,
            dimension,
            workers: workers.max(1),
        }
    }

    /// Derive every master under `source_dir` into `out_dir`, keeping the
    /// masters' relative folder layout
    pub async fn run(&self, source_dir: &Path, out_dir: &Path) -> AppResult<DerivativeSummary> {
        let masters = find_masters(source_dir);
        tracing::info!(
            "Found {} masters under {}",
            masters.len(),
            source_dir.display()
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut jobs = JoinSet::new();
        for master in masters {
            let relative = master
                .parent()
                .and_then(|p| p.strip_prefix(source_dir).ok())
                .unwrap_or_else(|| Path::new(""));
            let target_dir = out_dir.join(relative);
            std::fs::create_dir_all(&target_dir)?;

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?;
            let deriver = self.deriver.clone();
            let dimension = self.dimension;
            jobs.spawn(async move {
                let source = master.clone();
                let result = tokio::task::spawn_blocking(move || {
                    deriver.derive(&source, &target_dir, dimension)
                })
                .await;
                drop(permit);
                (master, result)
            });
        }

        let mut summary = DerivativeSummary::default();
        while let Some(joined) = jobs.join_next().await {
            let (master, result) = joined.map_err(|e| AppError::Internal(e.to_string()))?;
            match result {
                Ok(Ok(output)) => summary.created.push(output),
                Ok(Err(e)) => {
                    tracing::warn!("Could not derive {}: {}", master.display(), e);
                    summary.failed.push(master);
                }
                Err(e) => {
                    tracing::error!("Derivative job for {} panicked: {}", master.display(), e);
                    summary.failed.push(master);
                }
            }
        }
        summary.created.sort();
        summary.failed.sort();

        tracing::info!(
            "Created {} derivatives, {} failed",
            summary.created.len(),
            summary.failed.len()
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::media::{derivative_path, MockImageDeriver};

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"master").unwrap();
    }

    #[test]
    fn test_find_masters() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b/scan2.TIF"));
        touch(&dir.path().join("a/scan1.tiff"));
        touch(&dir.path().join("a/notes.txt"));

        let masters = find_masters(dir.path());
        assert_eq!(
            masters,
            vec![dir.path().join("a/scan1.tiff"), dir.path().join("b/scan2.TIF")]
        );
    }

    #[tokio::test]
    async fn test_pool_keeps_layout_and_counts_failures() {
        let source = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        touch(&source.path().join("box1/good.tif"));
        touch(&source.path().join("box2/bad.tif"));

        let mut deriver = MockImageDeriver::new();
        deriver.expect_derive().times(2).returning(|src, out_dir, dimension| {
            assert_eq!(dimension, 1024);
            if src.ends_with("bad.tif") {
                Err(AppError::Image("corrupt".to_string()))
            } else {
                derivative_path(src, out_dir)
            }
        });

        let pool = DerivativePool::new(Arc::new(deriver), 1024, 2);
        let summary = pool.run(source.path(), out.path()).await.unwrap();

        assert_eq!(summary.created, vec![out.path().join("box1/good.jpg")]);
        assert_eq!(summary.failed, vec![source.path().join("box2/bad.tif")]);
        assert!(out.path().join("box2").is_dir());
    }
}
