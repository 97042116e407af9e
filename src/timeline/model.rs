use std::collections::HashSet;
use std::path::Path;

use crate::foundation::error::{VidloomError, VidloomResult};

/// Overlay media kind for a timed asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum AssetKind {
    /// A still image, stretched in time to fill its slot.
    #[serde(rename = "image")]
    Image,
    /// A short video looped to fill its slot (`"gif"` on the wire).
    #[serde(rename = "gif")]
    LoopClip,
    /// A pre-rendered animated caption clip.
    #[serde(rename = "text")]
    Text,
}

impl AssetKind {
    /// Storage subdirectory name for this kind (also the wire name).
    pub fn dir_name(self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::LoopClip => "gif",
            AssetKind::Text => "text",
        }
    }
}

/// One timed overlay produced by the external pipeline.
///
/// Timing is consumed verbatim; the compositor never re-derives or second-guesses it.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimedAsset {
    /// Unique ordering key.
    pub order_id: u64,
    /// Caption text (used by text assets; informational for the rest).
    pub text: String,
    /// Overlay kind.
    #[serde(rename = "type")]
    pub kind: AssetKind,
    /// Slot start in milliseconds.
    #[serde(rename = "start")]
    pub start_ms: u64,
    /// Slot end in milliseconds, must be greater than `start`.
    #[serde(rename = "end")]
    pub end_ms: u64,
}

impl TimedAsset {
    /// Slot start in seconds.
    pub fn start_s(&self) -> f64 {
        self.start_ms as f64 / 1000.0
    }

    /// Slot end in seconds.
    pub fn end_s(&self) -> f64 {
        self.end_ms as f64 / 1000.0
    }

    /// Slot duration in seconds.
    pub fn duration_s(&self) -> f64 {
        self.end_ms.saturating_sub(self.start_ms) as f64 / 1000.0
    }
}

/// The ordered timed-asset list consumed by clip generation and composition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Timeline {
    /// Assets in pipeline order.
    pub assets: Vec<TimedAsset>,
}

/// Both accepted wire forms: a bare JSON list, or an object wrapping it in `assets`.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum TimelineDoc {
    List(Vec<TimedAsset>),
    Object { assets: Vec<TimedAsset> },
}

impl<'de> serde::Deserialize<'de> for Timeline {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let assets = match TimelineDoc::deserialize(deserializer)? {
            TimelineDoc::List(assets) => assets,
            TimelineDoc::Object { assets } => assets,
        };
        Ok(Timeline { assets })
    }
}

impl serde::Serialize for Timeline {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.assets.serialize(serializer)
    }
}

impl Timeline {
    /// Parse a timeline from a JSON reader (either wire form).
    pub fn from_reader(reader: impl std::io::Read) -> VidloomResult<Self> {
        let timeline: Timeline =
            serde_json::from_reader(reader).map_err(|e| VidloomError::serde(e.to_string()))?;
        timeline.validate()?;
        Ok(timeline)
    }

    /// Parse a timeline from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> VidloomResult<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            VidloomError::config(format!(
                "cannot open timeline '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Structural validation: per-asset time ordering and unique ids.
    ///
    /// An empty timeline passes; emptiness is the compositor's entry check.
    pub fn validate(&self) -> VidloomResult<()> {
        let mut seen = HashSet::new();
        for asset in &self.assets {
            if asset.end_ms <= asset.start_ms {
                return Err(VidloomError::config(format!(
                    "asset {}: end ({}) must be greater than start ({})",
                    asset.order_id, asset.end_ms, asset.start_ms
                )));
            }
            if !seen.insert(asset.order_id) {
                return Err(VidloomError::config(format!(
                    "duplicate asset order_id {}",
                    asset.order_id
                )));
            }
        }
        Ok(())
    }

    /// Assets of one kind, ascending by `order_id`.
    pub fn assets_of_kind(&self, kind: AssetKind) -> Vec<&TimedAsset> {
        let mut out: Vec<&TimedAsset> = self.assets.iter().filter(|a| a.kind == kind).collect();
        out.sort_by_key(|a| a.order_id);
        out
    }

    /// Latest asset end time in seconds, `0.0` when empty.
    pub fn max_end_s(&self) -> f64 {
        self.assets
            .iter()
            .map(|a| a.end_s())
            .fold(0.0_f64, f64::max)
    }
}
