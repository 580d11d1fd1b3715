//! MIME rendering of keyword return values and the "open log" button.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as Base64, Engine as _};
use image::ImageFormat;
use robotkernel_core_types::Value;
use serde_json::json;

use crate::frontend::MimeBundle;

const LOG_ICON: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="14" height="14" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2"><path d="M14 2H6a2 2 0 0 0-2 2v16a2 2 0 0 0 2 2h12a2 2 0 0 0 2-2V8z"/><polyline points="14 2 14 8 20 8"/><line x1="16" y1="13" x2="8" y2="13"/><line x1="16" y1="17" x2="8" y2="17"/></svg>"#;

pub fn data_uri(mime: &str, data: &[u8]) -> String {
    format!("data:{mime};base64,{}", Base64.encode(data))
}

/// Browsers and some decoders report animated PNG; hosts only know PNG.
pub fn normalize_mime(mime: &str) -> &str {
    if mime == "image/apng" {
        "image/png"
    } else {
        mime
    }
}

pub fn image_mime(format: ImageFormat) -> Option<&'static str> {
    Some(match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Ico => "image/x-icon",
        ImageFormat::Tiff => "image/tiff",
        _ => return None,
    })
}

/// Format and size of encoded image bytes, without decoding the pixels.
pub fn probe_image(data: &[u8]) -> Option<(&'static str, u32, u32)> {
    let reader = image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?;
    let mime = image_mime(reader.format()?)?;
    let (width, height) = reader.into_dimensions().ok()?;
    Some((mime, width, height))
}

/// Display bundle and metadata for a value; an empty bundle means there is
/// nothing to show.
pub fn to_mime_and_metadata(value: &Value) -> (MimeBundle, MimeBundle) {
    let mut data = MimeBundle::new();
    let mut metadata = MimeBundle::new();
    match value {
        Value::Bytes(bytes) => match probe_image(bytes) {
            Some((mime, width, height)) => {
                data.insert(mime.into(), Base64.encode(bytes).into());
                metadata.insert(mime.into(), json!({"height": height, "width": width}));
            }
            None => {
                data.insert("text/plain".into(), value.to_string().into());
            }
        },
        Value::List(_) | Value::Dict(_) => {
            data.insert("application/json".into(), value.to_json());
            data.insert("text/plain".into(), value.to_string().into());
        }
        Value::String(text) if looks_like_html(text) => {
            data.insert("text/html".into(), text.clone().into());
            data.insert("text/plain".into(), text.clone().into());
        }
        Value::None => {}
        other => {
            data.insert("text/plain".into(), other.to_string().into());
        }
    }
    (data, metadata)
}

fn looks_like_html(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with('<') && trimmed.ends_with('>') && trimmed.contains("</")
}

/// Button opening the rendered log in a new browser window.
pub fn log_button(log: &[u8], filename: &str) -> String {
    let script = format!(
        "var w=window.open('','_blank');\
         if(w){{w.document.open();w.document.title='{filename}';\
         w.document.write(decodeURIComponent(escape(atob('{}'))));w.document.close();}}",
        Base64.encode(log)
    );
    format!(
        r#"<button class="jp-mod-styled jp-mod-accept" onClick="{script};event.preventDefault();event.stopPropagation();"><div style="display:inline-flex;align-self:center;"><div style="top:.125em;position:relative;margin-right:5px;">{LOG_ICON}</div> Log</div></button>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        image::DynamicImage::new_rgb8(width, height)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn images_render_with_dimensions() {
        let (data, metadata) = to_mime_and_metadata(&Value::Bytes(png(4, 3)));
        assert!(data.contains_key("image/png"));
        assert_eq!(metadata["image/png"], json!({"height": 3, "width": 4}));
    }

    #[test]
    fn plain_values_render_as_text() {
        let (data, metadata) = to_mime_and_metadata(&Value::from("1"));
        assert_eq!(data["text/plain"], "1");
        assert!(metadata.is_empty());
        assert!(to_mime_and_metadata(&Value::None).0.is_empty());
    }

    #[test]
    fn collections_render_as_json() {
        let value = Value::List(vec![Value::from("a"), Value::Integer(2)]);
        let (data, _) = to_mime_and_metadata(&value);
        assert_eq!(data["application/json"], json!(["a", 2]));
    }

    #[test]
    fn html_strings_keep_plain_fallback() {
        let (data, _) = to_mime_and_metadata(&Value::from("<b>bold</b>"));
        assert_eq!(data["text/html"], "<b>bold</b>");
        assert_eq!(data["text/plain"], "<b>bold</b>");
    }

    #[test]
    fn apng_is_reported_as_png() {
        assert_eq!(normalize_mime("image/apng"), "image/png");
        assert_eq!(normalize_mime("image/jpeg"), "image/jpeg");
    }

    #[test]
    fn data_uri_and_button() {
        assert_eq!(data_uri("image/png", b"abc"), "data:image/png;base64,YWJj");
        let button = log_button(b"<html></html>", "log.html");
        assert!(button.contains("Log</div></button>"));
        assert!(button.contains(&Base64.encode(b"<html></html>")));
    }
}
