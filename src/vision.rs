// src/vision.rs
use crate::genai::{GenerateRequest, Generator, InlineImage};
use crate::pipeline::PipelineError;
use crate::types::MediaAttachment;

/// Downstream prompts interpolate visual evidence unconditionally, so the
/// no-image path yields this sentinel instead of an absent value.
pub const VISUAL_ANALYSIS_SKIPPED: &str = "Visual analysis skipped: no image was provided.";

const FORENSIC_PROMPT: &str = "Analyze this image with high precision for deepfake or \
manipulation detection. Describe every detail: lighting consistency, shadows, edge blending, \
text artifacts, and the specific subject matter. If this is a famous location or person, \
identify them. Provide a forensic-level description to be used for fact-checking.";

/// Sniff the image format from magic bytes. Undecodable uploads are
/// rejected before any remote call.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]) {
        Some("image/png")
    } else if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

impl MediaAttachment {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, PipelineError> {
        let mime_type = sniff_mime(&bytes)
            .ok_or_else(|| {
                PipelineError::Input("uploaded image is not a recognized raster format".into())
            })?
            .to_string();
        Ok(MediaAttachment { bytes, mime_type })
    }
}

/// Stage 1: forensic description of the uploaded image, or the skip
/// sentinel when there is none. No retry; failures surface to the caller.
pub async fn describe_media(
    client: &dyn Generator,
    image: Option<&MediaAttachment>,
) -> Result<String, PipelineError> {
    let Some(media) = image else {
        return Ok(VISUAL_ANALYSIS_SKIPPED.to_string());
    };
    let req = GenerateRequest::text(FORENSIC_PROMPT).with_image(InlineImage {
        mime_type: media.mime_type.clone(),
        data: media.bytes.clone(),
    });
    let out = client.generate(req).await?;
    Ok(out.text)
}
