use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use base64::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{HandlerError, HandlerResult};

pub const TEXT_FILE_NAME: &str = "response.txt";
pub const IMAGE_EXTENSION: &str = "png";

/// How a service response is written to disk before upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Whole JSON response as text in `response.txt`.
    Text,
    /// First entry of `images`, base64-decoded, in `<uuid>.png`.
    Image,
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputMode::Text),
            "image" => Ok(OutputMode::Image),
            other => Err(format!("unknown output mode: {other}")),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Text => f.write_str("text"),
            OutputMode::Image => f.write_str("image"),
        }
    }
}

/// Writes `response` into `dir` according to `mode` and returns the file path.
pub async fn materialize(mode: OutputMode, dir: &Path, response: &Value) -> HandlerResult<PathBuf> {
    let (path, bytes) = match mode {
        OutputMode::Text => (dir.join(TEXT_FILE_NAME), serde_json::to_vec(response)?),
        OutputMode::Image => {
            let name = format!("{}.{}", Uuid::new_v4(), IMAGE_EXTENSION);
            (dir.join(name), first_image(response)?)
        }
    };

    tokio::fs::write(&path, &bytes).await?;
    tracing::debug!(path = %path.display(), size_bytes = bytes.len(), %mode, "Wrote service response");
    Ok(path)
}

/// Decodes the first entry of the response's `images` array.
pub fn first_image(response: &Value) -> HandlerResult<Vec<u8>> {
    let images = response
        .get("images")
        .and_then(Value::as_array)
        .ok_or_else(|| HandlerError::MalformedResponse("response has no images array".into()))?;

    let encoded = images
        .first()
        .ok_or_else(|| HandlerError::MalformedResponse("images array is empty".into()))?
        .as_str()
        .ok_or_else(|| HandlerError::MalformedResponse("first image is not a string".into()))?;

    // WebUI extensions sometimes hand back data URLs.
    let encoded = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };

    Ok(BASE64_STANDARD.decode(encoded.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    #[test]
    fn output_mode_parses_case_insensitively() {
        assert_eq!("text".parse::<OutputMode>().unwrap(), OutputMode::Text);
        assert_eq!("IMAGE".parse::<OutputMode>().unwrap(), OutputMode::Image);
        assert!("gif".parse::<OutputMode>().is_err());
    }

    #[tokio::test]
    async fn image_mode_writes_decoded_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let response = json!({"images": [BASE64_STANDARD.encode(PNG_HEADER)], "info": "{}"});

        let path = materialize(OutputMode::Image, dir.path(), &response)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), PNG_HEADER);
        assert_eq!(path.extension().unwrap(), IMAGE_EXTENSION);
        let stem = path.file_stem().unwrap().to_str().unwrap();
        assert!(Uuid::parse_str(stem).is_ok(), "{stem} is not a uuid");
    }

    #[tokio::test]
    async fn image_mode_generates_a_fresh_name_each_time() {
        let dir = tempfile::tempdir().unwrap();
        let response = json!({"images": [BASE64_STANDARD.encode(b"x")]});

        let a = materialize(OutputMode::Image, dir.path(), &response).await.unwrap();
        let b = materialize(OutputMode::Image, dir.path(), &response).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn text_mode_writes_the_whole_response() {
        let dir = tempfile::tempdir().unwrap();
        let response = json!({"sd_model_checkpoint": "v1-5", "samples_save": true});

        let path = materialize(OutputMode::Text, dir.path(), &response)
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("response.txt"));
        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, response);
    }

    #[tokio::test]
    async fn missing_or_empty_images_fail_without_writing() {
        let dir = tempfile::tempdir().unwrap();

        for response in [json!({}), json!({"images": []}), json!({"images": [42]})] {
            let err = materialize(OutputMode::Image, dir.path(), &response)
                .await
                .unwrap_err();
            assert!(matches!(err, HandlerError::MalformedResponse(_)), "{response}");
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn invalid_base64_is_a_decode_error() {
        let err = first_image(&json!({"images": ["not base64!"]})).unwrap_err();
        assert!(matches!(err, HandlerError::Decode(_)));
    }

    #[test]
    fn data_url_prefix_is_stripped() {
        let encoded = format!("data:image/png;base64,{}", BASE64_STANDARD.encode(PNG_HEADER));
        assert_eq!(first_image(&json!({ "images": [encoded] })).unwrap(), PNG_HEADER);
    }
}
