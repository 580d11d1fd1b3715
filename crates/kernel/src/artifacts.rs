//! Inlines screenshots referenced by a result log so the log stays usable
//! after the run's scratch directory is gone.

use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as Base64, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::ArtifactConfig;
use crate::errors::{ArtifactError, ArtifactResult};
use crate::render::{data_uri, normalize_mime, probe_image};

static IMG_SRC: Lazy<Regex> = Lazy::new(|| Regex::new(r#"img src="([^"]+)""#).unwrap());

const REPORT_LINK: &str = r#""reportURL":"report.html""#;
const NO_REPORT_LINK: &str = r#""reportURL":null"#;

/// An image found in the result log, ready to be displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub source: String,
    pub mime: String,
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReductionReport {
    pub images: Vec<EmbeddedImage>,
    /// References that could not be resolved or decoded.
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ArtifactReducer {
    settings: ArtifactConfig,
    cwd: PathBuf,
}

impl ArtifactReducer {
    pub fn new(settings: ArtifactConfig, cwd: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            cwd: cwd.into(),
        }
    }

    /// Rewrites `output` in place. Running it twice yields the same file.
    pub fn reduce(&self, output: &Path, scratch_dir: &Path) -> ArtifactResult<ReductionReport> {
        let xml = fs::read_to_string(output).map_err(|source| ArtifactError::Read {
            path: output.to_path_buf(),
            source,
        })?;
        let (reduced, report) = self.reduce_text(&xml, scratch_dir);
        if reduced != xml {
            fs::write(output, reduced).map_err(|source| ArtifactError::Write {
                path: output.to_path_buf(),
                source,
            })?;
        }
        debug!(
            images = report.images.len(),
            skipped = report.skipped.len(),
            "reduced result log"
        );
        Ok(report)
    }

    pub fn reduce_text(&self, xml: &str, scratch_dir: &Path) -> (String, ReductionReport) {
        let mut report = ReductionReport::default();
        let mut sources: Vec<String> = Vec::new();
        for captures in IMG_SRC.captures_iter(xml) {
            let src = captures[1].to_string();
            if !sources.contains(&src) {
                sources.push(src);
            }
        }

        let mut text = xml.to_string();
        for src in sources {
            let image = match self.load(&src, scratch_dir) {
                Ok(image) => image,
                Err(err) => {
                    debug!(src = %abbreviate(&src), error = %err, "skipping image reference");
                    report.skipped.push(src);
                    continue;
                }
            };
            if self.settings.embed_images {
                let uri = data_uri(&image.mime, &image.data);
                text = text.replace(&format!(r#"a href="{src}""#), "a");
                text = text.replace(
                    &format!(r#"img src="{src}" width="800px""#),
                    &format!(
                        r#"img src="{uri}" style="max-width:{}px;""#,
                        self.settings.max_image_width
                    ),
                );
                text = text.replace(&format!(r#"img src="{src}""#), &format!(r#"img src="{uri}""#));
            }
            report.images.push(image);
        }
        (text, report)
    }

    fn load(&self, src: &str, scratch_dir: &Path) -> ArtifactResult<EmbeddedImage> {
        let data = match self.resolve(src, scratch_dir) {
            Some(path) => fs::read(&path).map_err(|source| ArtifactError::Read { path, source })?,
            None if src.starts_with("data:") => decode_data_uri(src)?,
            None => return Err(ArtifactError::Unsupported(abbreviate(src))),
        };
        let declared = src
            .strip_prefix("data:")
            .and_then(|rest| rest.split(';').next())
            .map(normalize_mime);
        let (probed, width, height) =
            probe_image(&data).ok_or_else(|| ArtifactError::Unsupported(abbreviate(src)))?;
        Ok(EmbeddedImage {
            source: src.to_string(),
            mime: declared.unwrap_or(probed).to_string(),
            data,
            width,
            height,
        })
    }

    /// The path as given, then relative to the scratch directory, then
    /// relative to the working directory.
    fn resolve(&self, src: &str, scratch_dir: &Path) -> Option<PathBuf> {
        if src.starts_with("data:") {
            return None;
        }
        [
            PathBuf::from(src),
            scratch_dir.join(src),
            self.cwd.join(src),
        ]
        .into_iter()
        .find(|candidate| candidate.is_file())
    }
}

fn decode_data_uri(src: &str) -> ArtifactResult<Vec<u8>> {
    let malformed = || ArtifactError::DataUri(abbreviate(src));
    let (spec, payload) = src.split_once(',').ok_or_else(malformed)?;
    let (mime, encoding) = spec
        .strip_prefix("data:")
        .and_then(|spec| spec.split_once(';'))
        .ok_or_else(malformed)?;
    if encoding != "base64" || !mime.starts_with("image/") {
        return Err(ArtifactError::Unsupported(abbreviate(src)));
    }
    Base64.decode(payload.trim()).map_err(|_| malformed())
}

fn abbreviate(src: &str) -> String {
    if src.len() <= 64 {
        return src.to_string();
    }
    let mut end = 64;
    while !src.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &src[..end])
}

/// Nulls the report link of a rendered log; there is never a report.
pub fn strip_report_links(log: &str) -> String {
    log.replace(REPORT_LINK, NO_REPORT_LINK)
}

/// Reads `log`, strips its report link and writes it back.
pub fn finalize_log(log: &Path) -> ArtifactResult<Vec<u8>> {
    let html = fs::read_to_string(log).map_err(|source| ArtifactError::Read {
        path: log.to_path_buf(),
        source,
    })?;
    let stripped = strip_report_links(&html);
    if stripped != html {
        if let Err(source) = fs::write(log, &stripped) {
            warn!(path = %log.display(), error = %source, "could not rewrite log");
        }
    }
    Ok(stripped.into_bytes())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        image::DynamicImage::new_rgb8(width, height)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();
        bytes
    }

    fn reducer(cwd: &Path) -> ArtifactReducer {
        ArtifactReducer::new(ArtifactConfig::default(), cwd)
    }

    #[test]
    fn relative_screenshot_is_inlined() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("shot.png"), png_bytes(5, 2)).unwrap();
        let xml = r#"<msg html="true">&lt;a href="shot.png"&gt;&lt;img src="shot.png" width="800px"&gt;&lt;/a&gt;</msg>"#;

        let (text, report) = reducer(dir.path()).reduce_text(xml, dir.path());
        assert_eq!(report.images.len(), 1);
        assert_eq!((report.images[0].width, report.images[0].height), (5, 2));
        assert!(!text.contains(r#"a href="shot.png""#));
        assert!(text.contains(r#"img src="data:image/png;base64,"#));
        assert!(text.contains(r#"style="max-width:800px;""#));
    }

    #[test]
    fn apng_data_uri_is_exposed_as_png() {
        let dir = tempfile::tempdir().unwrap();
        let src = format!("data:image/apng;base64,{}", Base64.encode(png_bytes(1, 1)));
        let xml = format!(r#"&lt;img src="{src}"&gt;"#);
        let (text, report) = reducer(dir.path()).reduce_text(&xml, dir.path());
        assert_eq!(report.images[0].mime, "image/png");
        assert!(text.contains("data:image/png;base64,"));
        assert!(!text.contains("image/apng"));
    }

    #[test]
    fn reduction_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("shot.png"), png_bytes(3, 3)).unwrap();
        let output = dir.path().join("output.xml");
        fs::write(
            &output,
            r#"<robot><msg html="true">&lt;a href="shot.png"&gt;&lt;img src="shot.png" width="800px"&gt;&lt;/a&gt;</msg></robot>"#,
        )
        .unwrap();

        let reducer = reducer(dir.path());
        reducer.reduce(&output, dir.path()).unwrap();
        let once = fs::read_to_string(&output).unwrap();
        let second = reducer.reduce(&output, dir.path()).unwrap();
        let twice = fs::read_to_string(&output).unwrap();
        assert_eq!(once, twice);
        assert_eq!(second.images.len(), 1);
    }

    #[test]
    fn unresolvable_references_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let xml = r#"&lt;img src="missing.png"&gt; &lt;img src="data:text/plain;base64,eA=="&gt;"#;
        let (text, report) = reducer(dir.path()).reduce_text(xml, dir.path());
        assert_eq!(text, xml);
        assert_eq!(report.skipped.len(), 2);
        assert!(report.images.is_empty());
    }

    #[test]
    fn disabled_embedding_leaves_text_alone() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("shot.png"), png_bytes(2, 2)).unwrap();
        let settings = ArtifactConfig {
            embed_images: false,
            ..ArtifactConfig::default()
        };
        let xml = r#"&lt;img src="shot.png"&gt;"#;
        let (text, report) =
            ArtifactReducer::new(settings, dir.path()).reduce_text(xml, dir.path());
        assert_eq!(text, xml);
        assert_eq!(report.images.len(), 1);
    }

    #[test]
    fn report_link_is_nulled() {
        let log = r#"window.settings = {"reportURL":"report.html","title":"x"};"#;
        assert_eq!(
            strip_report_links(log),
            r#"window.settings = {"reportURL":null,"title":"x"};"#
        );
        assert_eq!(strip_report_links(&strip_report_links(log)), strip_report_links(log));
    }
}
