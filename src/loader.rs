//! Background asset loading.
//!
//! Each request reads and parses its file on a short-lived worker thread.
//! The parsed result travels back as a [`LoadOutcome`] through a
//! [`CompletionSink`]: the window's event loop proxy in the app, a plain
//! channel in tests. Nothing here touches the GPU or the scene; outcomes are
//! applied on the event-loop thread.

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use crate::assets::FontAtlasData;
use crate::geometry::LoadError;
use crate::model::ModelData;
use crate::typeface::Typeface;

/// What to parse a file as.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AssetKind {
    /// glTF/GLB or STL model.
    Model,
    /// Typeface JSON outline font for 3D text.
    Typeface,
    /// TTF/OTF font rasterized at `size` pixels for overlay labels.
    OverlayFont { size: f32 },
}

/// A parsed asset, ready to be uploaded.
#[derive(Debug)]
pub enum Asset {
    Model(ModelData),
    Typeface(Typeface),
    OverlayFont(FontAtlasData),
}

impl Asset {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Asset::Model(_) => "model",
            Asset::Typeface(_) => "typeface",
            Asset::OverlayFont(_) => "overlay font",
        }
    }

    pub fn into_model(self) -> Option<ModelData> {
        match self {
            Asset::Model(model) => Some(model),
            _ => None,
        }
    }

    pub fn into_typeface(self) -> Option<Typeface> {
        match self {
            Asset::Typeface(font) => Some(font),
            _ => None,
        }
    }

    pub fn into_overlay_font(self) -> Option<FontAtlasData> {
        match self {
            Asset::OverlayFont(font) => Some(font),
            _ => None,
        }
    }
}

/// Identifies one load request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

/// A finished load, successful or not.
#[derive(Debug)]
pub struct LoadOutcome {
    pub id: RequestId,
    pub path: PathBuf,
    pub result: Result<Asset, LoadError>,
}

/// Where worker threads deliver outcomes.
pub trait CompletionSink: Send + 'static {
    /// Hands over an outcome. Returns `false` if the receiver is gone.
    fn deliver(&self, outcome: LoadOutcome) -> bool;

    /// A sink for another worker thread.
    fn clone_sink(&self) -> Box<dyn CompletionSink>;
}

impl CompletionSink for mpsc::Sender<LoadOutcome> {
    fn deliver(&self, outcome: LoadOutcome) -> bool {
        self.send(outcome).is_ok()
    }

    fn clone_sink(&self) -> Box<dyn CompletionSink> {
        Box::new(self.clone())
    }
}

/// Reads and parses `path` on the calling thread.
pub fn load_asset(path: &Path, kind: AssetKind) -> Result<Asset, LoadError> {
    match kind {
        AssetKind::Model => ModelData::load(path).map(Asset::Model),
        AssetKind::Typeface => Typeface::load(path).map(Asset::Typeface),
        AssetKind::OverlayFont { size } => FontAtlasData::load(path, size).map(Asset::OverlayFont),
    }
}

/// Spawns a worker per request and reports through a sink.
pub struct AssetLoader {
    asset_dir: PathBuf,
    sink: Box<dyn CompletionSink>,
    next_id: u64,
}

impl AssetLoader {
    pub fn new(asset_dir: impl Into<PathBuf>, sink: Box<dyn CompletionSink>) -> Self {
        Self {
            asset_dir: asset_dir.into(),
            sink,
            next_id: 0,
        }
    }

    pub fn asset_dir(&self) -> &Path {
        &self.asset_dir
    }

    /// Relative paths resolve against the asset directory.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.asset_dir.join(path)
        }
    }

    /// Starts loading `path` in the background.
    pub fn request(&mut self, path: impl AsRef<Path>, kind: AssetKind) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id += 1;

        let path = self.resolve(path);
        log::info!("loading {:?} from '{}'", kind, path.display());

        let sink = self.sink.clone_sink();
        let worker_path = path.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("diorama-load-{}", id.0))
            .spawn(move || {
                let result = load_asset(&worker_path, kind);
                let outcome = LoadOutcome {
                    id,
                    path: worker_path,
                    result,
                };
                if !sink.deliver(outcome) {
                    log::debug!("load {:?} finished after its receiver closed", id);
                }
            });

        if let Err(e) = spawned {
            log::error!("could not spawn loader thread: {}", e);
            self.sink.deliver(LoadOutcome {
                id,
                result: Err(LoadError::io(&path, e)),
                path,
            });
        }

        id
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::typeface::tests::TEST_FONT;

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("diorama-loader-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn channel_loader(dir: &Path) -> (AssetLoader, mpsc::Receiver<LoadOutcome>) {
        let (tx, rx) = mpsc::channel();
        (AssetLoader::new(dir, Box::new(tx)), rx)
    }

    #[test]
    fn relative_paths_use_asset_dir() {
        let (loader, _rx) = channel_loader(Path::new("/srv/assets"));
        assert_eq!(loader.resolve("poly.glb"), PathBuf::from("/srv/assets/poly.glb"));
        assert_eq!(loader.resolve("/abs/3dpea.glb"), PathBuf::from("/abs/3dpea.glb"));
    }

    #[test]
    fn typeface_loads_in_background() {
        let path = temp_file("test.typeface.json", TEST_FONT.as_bytes());
        let (mut loader, rx) = channel_loader(path.parent().unwrap());

        let id = loader.request("test.typeface.json", AssetKind::Typeface);
        let outcome = rx.recv_timeout(Duration::from_secs(10)).unwrap();

        assert_eq!(outcome.id, id);
        let font = outcome.result.unwrap().into_typeface().unwrap();
        assert_eq!(font.glyph_count(), 5);
    }

    #[test]
    fn failures_arrive_as_outcomes() {
        let (mut loader, rx) = channel_loader(Path::new("/no/such/dir"));

        let missing = loader.request("3dpea.glb", AssetKind::Model);
        let unsupported = loader.request("notes.txt", AssetKind::Model);
        assert_ne!(missing, unsupported);

        let mut outcomes: Vec<LoadOutcome> = (0..2)
            .map(|_| rx.recv_timeout(Duration::from_secs(10)).unwrap())
            .collect();
        outcomes.sort_by_key(|o| o.id);

        assert!(matches!(outcomes[0].result, Err(LoadError::Io { .. })));
        assert!(matches!(
            outcomes[1].result,
            Err(LoadError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn wrong_asset_kind_yields_none() {
        let path = temp_file("kind.typeface.json", TEST_FONT.as_bytes());
        let asset = load_asset(&path, AssetKind::Typeface).unwrap();
        assert_eq!(asset.kind_name(), "typeface");
        assert!(asset.into_model().is_none());
    }

    #[test]
    fn closed_receiver_does_not_panic_workers() {
        let (mut loader, rx) = channel_loader(Path::new("/no/such/dir"));
        drop(rx);
        loader.request("poly.glb", AssetKind::Model);
    }
}
