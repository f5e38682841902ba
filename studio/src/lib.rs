use std::{fs, path::Path};

use color_eyre::{
    Result,
    eyre::{WrapErr as _, eyre},
};
use log::{debug, info};
use portrait_engine::{
    ImagePayload,
    config::{ProviderConfig, config_path},
    normalize::normalize_payload,
    payload::PNG_MIME,
};

pub mod cli;

/// `.env` and the process environment, replaced by a RON config file when one exists.
pub fn load_config(explicit: Option<&Path>) -> Result<ProviderConfig> {
    if let Err(e) = dotenv::dotenv() {
        debug!("No .env loaded: {e}");
    }

    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => config_path()?,
    };

    if path.exists() {
        info!("Loading config from {}", path.display());
        ProviderConfig::load(&path).wrap_err_with(|| format!("reading {}", path.display()))
    } else if explicit.is_some() {
        Err(eyre!("Config file {} doesn't exist", path.display()))
    } else {
        Ok(ProviderConfig::from_env())
    }
}

/// Reads a local image, taking the MIME type from the file extension.
pub fn read_image(path: &Path) -> Result<ImagePayload> {
    let format = image::ImageFormat::from_path(path)
        .wrap_err_with(|| format!("unsupported image type: {}", path.display()))?;
    let bytes = fs::read(path)?;
    Ok(ImagePayload::from_bytes(&bytes, format.to_mime_type()))
}

/// A `data:` URL is taken as is, anything else is read as a file.
pub fn source_image(arg: &str) -> Result<ImagePayload> {
    if arg.starts_with("data:") {
        Ok(ImagePayload::from_data_url(arg)?)
    } else {
        read_image(Path::new(arg))
    }
}

/// Writes the image as PNG, re-encoding it first if the backend sent something else.
pub fn write_png(path: &Path, image: &ImagePayload) -> Result<usize> {
    let bytes = if image.mime_type == PNG_MIME {
        image.decode_bytes()?
    } else {
        debug!("Re-encoding {} result as PNG", image.mime_type);
        normalize_payload(image)?.decode_bytes()?
    };
    fs::write(path, &bytes)?;
    Ok(bytes.len())
}

pub fn report(path: &Path, bytes: usize, seed: Option<&str>) -> String {
    let mut line = format!("Saved {}, {bytes} bytes", path.display());
    if let Some(seed) = seed {
        line.push_str(&format!(", seed {seed}"));
    }
    line
}
