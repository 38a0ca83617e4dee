//! Relay client: upload one document, receive its PDF.
//!
//! Each call is one independent upload/response cycle with no retry. Any
//! transport failure or non-2xx status becomes a per-file
//! [`FileError::UploadFailed`]; the relay's plain-text reason is kept as the
//! detail but the caller does not branch on it.

use crate::config::{WorkflowConfig, FILE_FIELD};
use crate::error::{Docs2PdfError, FileError};
use crate::pipeline::input::{SelectedFile, OCTET_STREAM};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client bound to one relay's `/convert` endpoint.
#[derive(Debug, Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    endpoint: String,
}

impl RelayClient {
    pub fn new(config: &WorkflowConfig) -> Result<Self, Docs2PdfError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| Docs2PdfError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.convert_endpoint(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Upload `file` and return the converted PDF bytes.
    pub async fn convert(&self, file: &SelectedFile) -> Result<Bytes, FileError> {
        let fail = |status: Option<u16>, detail: String| FileError::UploadFailed {
            name: file.name.clone(),
            status,
            detail,
        };

        let part = Part::bytes(file.content.to_vec()).file_name(file.name.clone());
        let part = match part.mime_str(&file.mime_type) {
            Ok(p) => p,
            Err(_) => Part::bytes(file.content.to_vec())
                .file_name(file.name.clone())
                .mime_str(OCTET_STREAM)
                .map_err(|e| fail(None, e.to_string()))?,
        };
        let form = Form::new().part(FILE_FIELD, part);

        debug!("POST {} ({} bytes)", self.endpoint, file.size_bytes);
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| fail(None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Relay rejected {}: HTTP {} {}", file.name, status, body);
            let detail = if body.trim().is_empty() {
                status.to_string()
            } else {
                body.trim().to_string()
            };
            return Err(fail(Some(status.as_u16()), detail));
        }

        response
            .bytes()
            .await
            .map_err(|e| fail(Some(status.as_u16()), e.to_string()))
    }
}
