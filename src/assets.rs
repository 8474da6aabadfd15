use crate::error::{QuoteDocError, Result};
use base64::Engine;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Image,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Asset {
    pub name: String,
    pub kind: AssetKind,
    pub data: Vec<u8>,
    pub source: Option<String>,
}

impl Asset {
    /// An image asset; only PNG and JPEG are accepted.
    pub fn image(name: impl Into<String>, data: Vec<u8>) -> Result<Self> {
        let name = name.into();
        match image::guess_format(&data) {
            Ok(image::ImageFormat::Png) | Ok(image::ImageFormat::Jpeg) => Ok(Self {
                name,
                kind: AssetKind::Image,
                data,
                source: None,
            }),
            _ => Err(QuoteDocError::Asset(format!(
                "image {name} is not a PNG or JPEG"
            ))),
        }
    }

    pub fn image_from_path(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|err| {
            QuoteDocError::Asset(format!("cannot read image {}: {err}", path.display()))
        })?;
        let mut asset = Asset::image(name, data)?;
        asset.source = Some(path.display().to_string());
        Ok(asset)
    }

    pub fn image_from_data_uri(name: impl Into<String>, uri: &str) -> Result<Self> {
        let name = name.into();
        let Some((_mime, data)) = parse_data_uri(uri) else {
            return Err(QuoteDocError::Asset(format!(
                "image {name} is not a valid data URI"
            )));
        };
        let mut asset = Asset::image(name, data)?;
        asset.source = Some("data-uri".to_string());
        Ok(asset)
    }

    pub fn bytes_len(&self) -> usize {
        self.data.len()
    }
}

/// Named binary inputs a renderer draws from (the logo, mostly).
#[derive(Debug, Clone, Default)]
pub struct AssetBundle {
    assets: Vec<Asset>,
}

impl AssetBundle {
    /// Adds `asset`, replacing an existing asset of the same name and kind.
    pub fn add(&mut self, asset: Asset) {
        self.assets
            .retain(|existing| !(existing.name == asset.name && existing.kind == asset.kind));
        self.assets.push(asset);
    }

    pub fn image(&self, name: &str) -> Option<&Asset> {
        self.assets
            .iter()
            .find(|asset| asset.kind == AssetKind::Image && asset.name == name)
    }

    pub fn images(&self) -> impl Iterator<Item = &Asset> {
        self.assets
            .iter()
            .filter(|asset| asset.kind == AssetKind::Image)
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.assets.iter().map(Asset::bytes_len).sum()
    }
}

/// Splits a `data:` URI into its MIME type and decoded payload.
pub fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.trim().strip_prefix("data:")?;
    let (header, data_part) = rest.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|mime| !mime.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains("base64") {
        base64::engine::general_purpose::STANDARD
            .decode(data_part.trim())
            .ok()?
    } else {
        data_part.as_bytes().to_vec()
    };
    Some((mime, data))
}

#[cfg(test)]
pub(crate) fn tiny_png() -> Vec<u8> {
    let mut img = image::RgbaImage::new(2, 2);
    for (x, _y, pixel) in img.enumerate_pixels_mut() {
        *pixel = image::Rgba([200, 30, 30, if x == 0 { 255 } else { 128 }]);
    }
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_round_trips_base64_payload() {
        let png = tiny_png();
        let uri = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&png)
        );
        let (mime, data) = parse_data_uri(&uri).expect("valid uri");
        assert_eq!(mime, "image/png");
        assert_eq!(data, png);
        assert!(parse_data_uri("https://example.com/logo.png").is_none());
        assert!(parse_data_uri("data:image/png;base64").is_none());
    }

    #[test]
    fn only_png_and_jpeg_images_are_accepted() {
        assert!(Asset::image("logo", tiny_png()).is_ok());
        let err = Asset::image("logo", b"GIF89a....".to_vec()).unwrap_err();
        assert!(matches!(err, QuoteDocError::Asset(_)));
    }

    #[test]
    fn adding_an_asset_replaces_the_same_name() {
        let mut bundle = AssetBundle::default();
        bundle.add(Asset::image("logo", tiny_png()).unwrap());
        bundle.add(Asset::image("logo", tiny_png()).unwrap());
        assert_eq!(bundle.images().count(), 1);
        assert!(bundle.image("logo").is_some());
        assert!(bundle.image("stamp").is_none());
        assert_eq!(bundle.total_bytes(), tiny_png().len());
        assert_eq!(AssetKind::Image.as_str(), "image");
    }
}
