//! Font registration for chart text.
//!
//! plotters looks up every string it measures or draws, in SVG as well as
//! PNG, through the face registered under [`FAMILY`]. The first call to
//! [`install`] picks that face: the configured file if it loads, otherwise
//! the first CJK system font found, otherwise the bundled DejaVu Sans, which
//! covers Latin text only.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{anyhow, Context, Result};
use plotters::style::{register_font, FontStyle};

/// Family name the chart code asks for.
pub const FAMILY: &str = "sans-serif";

static BUNDLED: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// Fonts with CJK coverage shipped by common desktop installs.
const SYSTEM_CANDIDATES: &[&str] = &[
    "C:/Windows/Fonts/msyh.ttc",
    "C:/Windows/Fonts/simhei.ttf",
    "C:/Windows/Fonts/simsun.ttc",
    "/System/Library/Fonts/PingFang.ttc",
    "/System/Library/Fonts/STHeiti Light.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/google-noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-zenhei.ttc",
];

/// Where the registered face came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSource {
    File(PathBuf),
    Bundled,
}

static INSTALLED: OnceLock<FontSource> = OnceLock::new();

/// Register the chart font once per process and report which one won.
///
/// Later calls return the first result; `preferred` is only consulted the
/// first time.
pub fn install(preferred: Option<&Path>) -> &'static FontSource {
    INSTALLED.get_or_init(|| {
        if let Some(path) = preferred {
            match register_file(path) {
                Ok(()) => {
                    tracing::info!(font = %path.display(), "using configured chart font");
                    return FontSource::File(path.to_path_buf());
                }
                Err(e) => tracing::warn!(error = %format!("{e:#}"), "configured chart font ignored"),
            }
        }

        for candidate in SYSTEM_CANDIDATES.iter().map(Path::new).filter(|p| p.is_file()) {
            match register_file(candidate) {
                Ok(()) => {
                    tracing::debug!(font = %candidate.display(), "using system chart font");
                    return FontSource::File(candidate.to_path_buf());
                }
                Err(e) => tracing::debug!(font = %candidate.display(), error = %e, "skipping system font"),
            }
        }

        if register_font(FAMILY, FontStyle::Normal, BUNDLED).is_err() {
            tracing::warn!("bundled chart font could not be parsed");
        }
        tracing::info!("no CJK font found; chart text uses the bundled Latin font");
        FontSource::Bundled
    })
}

fn register_file(path: &Path) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    // plotters keeps a &'static reference for the life of the process.
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
    register_font(FAMILY, FontStyle::Normal, bytes)
        .map_err(|_| anyhow!("{} is not a usable font file", path.display()))
}
