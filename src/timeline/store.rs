use std::path::{Path, PathBuf};

use crate::foundation::error::{VidloomError, VidloomResult};
use crate::timeline::model::{AssetKind, TimedAsset};

/// Extensions probed for still-image clips, in order.
const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png"];

/// Resolves per-asset clip files under a root directory.
///
/// Layout convention: `image/<order_id>.<ext>`, `gif/<order_id>.mp4`,
/// `text/<order_id>.mp4`. The store answers present or absent; producing the
/// files is the caller's concern.
#[derive(Clone, Debug)]
pub struct ClipStore {
    root: PathBuf,
}

impl ClipStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Subdirectory holding clips of one kind.
    pub fn kind_dir(&self, kind: AssetKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// Where the text clip for `order_id` is written and later looked up.
    pub fn text_clip_path(&self, order_id: u64) -> PathBuf {
        self.kind_dir(AssetKind::Text).join(format!("{order_id}.mp4"))
    }

    /// Resolve the clip file backing `asset`.
    ///
    /// Still images may use any of the `IMAGE_EXTS` extensions; video-backed
    /// kinds are always `.mp4`. Missing files come back as `AssetNotFound` so
    /// the compositor can skip the asset instead of aborting.
    pub fn resolve(&self, asset: &TimedAsset) -> VidloomResult<PathBuf> {
        match asset.kind {
            AssetKind::Image => {
                let dir = self.kind_dir(AssetKind::Image);
                for ext in IMAGE_EXTS {
                    let candidate = dir.join(format!("{}.{ext}", asset.order_id));
                    if candidate.is_file() {
                        return Ok(candidate);
                    }
                }
                Err(VidloomError::asset_not_found(format!(
                    "image clip for asset {} (tried image/{}.{{jpg,jpeg,png}} under '{}')",
                    asset.order_id,
                    asset.order_id,
                    self.root.display()
                )))
            }
            AssetKind::LoopClip | AssetKind::Text => {
                let candidate = self
                    .kind_dir(asset.kind)
                    .join(format!("{}.mp4", asset.order_id));
                if candidate.is_file() {
                    Ok(candidate)
                } else {
                    Err(VidloomError::asset_not_found(format!(
                        "{} clip for asset {} (expected '{}')",
                        asset.kind.dir_name(),
                        asset.order_id,
                        candidate.display()
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_root(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "vidloom_store_{tag}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .subsec_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn asset(order_id: u64, kind: AssetKind) -> TimedAsset {
        TimedAsset {
            order_id,
            text: String::new(),
            kind,
            start_ms: 0,
            end_ms: 1000,
        }
    }

    #[test]
    fn resolves_each_kind_from_its_subdir() {
        let root = scratch_root("kinds");
        for (sub, name) in [("image", "1.png"), ("gif", "2.mp4"), ("text", "3.mp4")] {
            let dir = root.join(sub);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join(name), b"x").unwrap();
        }
        let store = ClipStore::new(&root);
        assert!(store.resolve(&asset(1, AssetKind::Image)).is_ok());
        assert!(store.resolve(&asset(2, AssetKind::LoopClip)).is_ok());
        assert_eq!(
            store.resolve(&asset(3, AssetKind::Text)).unwrap(),
            store.text_clip_path(3)
        );
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn image_extensions_probe_in_declared_order() {
        let root = scratch_root("exts");
        let dir = root.join("image");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("5.jpeg"), b"x").unwrap();
        std::fs::write(dir.join("5.png"), b"x").unwrap();
        let store = ClipStore::new(&root);
        let resolved = store.resolve(&asset(5, AssetKind::Image)).unwrap();
        assert_eq!(resolved.extension().unwrap(), "jpeg");
        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn missing_clip_is_asset_not_found() {
        let root = scratch_root("missing");
        let store = ClipStore::new(&root);
        let err = store.resolve(&asset(9, AssetKind::LoopClip)).unwrap_err();
        assert!(err.is_per_asset(), "unexpected class: {err}");
        assert!(err.to_string().contains("asset not found"));
        std::fs::remove_dir_all(&root).unwrap();
    }
}
