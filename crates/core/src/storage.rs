//! Deterministic on-disk layout and mask persistence.
//!
//! Every path this service touches is derived from the storage root plus
//! the session id (and frame index): `videos/{id}.mp4`,
//! `frames/{id}/{index:05}.jpg`, `masks/{id}/{index:05}.png`. No two
//! sessions ever share a path.

use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::ffmpeg::frame_file_name;
use crate::mask::Mask;
use crate::types::SessionId;

/// Subdirectory holding raw uploaded videos.
pub const VIDEO_DIR: &str = "videos";

/// Subdirectory holding per-session extracted frames.
pub const FRAME_DIR: &str = "frames";

/// Subdirectory holding per-session persisted masks.
pub const MASK_DIR: &str = "masks";

/// Extension uploaded videos are stored under.
pub const VIDEO_EXT: &str = "mp4";

/// Derives every storage path from a single root directory.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the three base directories if they do not exist.
    pub async fn ensure_base_dirs(&self) -> Result<(), CoreError> {
        for dir in [VIDEO_DIR, FRAME_DIR, MASK_DIR] {
            tokio::fs::create_dir_all(self.root.join(dir)).await?;
        }
        Ok(())
    }

    /// `videos/{session}.mp4` — the raw uploaded bytes.
    pub fn video_path(&self, session: SessionId) -> PathBuf {
        self.root
            .join(VIDEO_DIR)
            .join(format!("{session}.{VIDEO_EXT}"))
    }

    /// `frames/{session}` — the extracted frame sequence.
    pub fn frame_dir(&self, session: SessionId) -> PathBuf {
        self.root.join(FRAME_DIR).join(session.to_string())
    }

    /// `frames/{session}/{index:05}.jpg`
    pub fn frame_path(&self, session: SessionId, frame_index: u32) -> PathBuf {
        self.frame_dir(session).join(frame_file_name(frame_index))
    }

    /// `masks/{session}` — persisted masks for the session.
    pub fn mask_dir(&self, session: SessionId) -> PathBuf {
        self.root.join(MASK_DIR).join(session.to_string())
    }

    /// `masks/{session}/{index:05}.png`
    pub fn mask_path(&self, session: SessionId, frame_index: u32) -> PathBuf {
        self.mask_dir(session).join(format!("{frame_index:05}.png"))
    }
}

/// Write-only persistence for binary masks.
///
/// Saving is an overwrite: a later prompt or propagation for the same
/// `(session, frame)` replaces the previous mask at the same path.
#[derive(Debug, Clone)]
pub struct MaskStore {
    layout: StorageLayout,
}

impl MaskStore {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    /// Encode `mask` as grayscale PNG and write it to the deterministic
    /// path for `(session, frame_index)`, creating directories as needed.
    /// Returns the written path.
    pub async fn save(
        &self,
        session: SessionId,
        frame_index: u32,
        mask: &Mask,
    ) -> Result<PathBuf, CoreError> {
        tokio::fs::create_dir_all(self.layout.mask_dir(session)).await?;

        let path = self.layout.mask_path(session, frame_index);
        let bytes = mask.to_png_bytes()?;
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }
}
