//! Configuration types for the conversion workflow and the relay service.
//!
//! Client behaviour is controlled through [`WorkflowConfig`], relay behaviour
//! through [`RelayConfig`]. Both are built via builders with documented
//! defaults; the binaries map CLI flags and environment variables onto them.

use crate::error::Docs2PdfError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Default relay base URL the client talks to.
pub const DEFAULT_RELAY_URL: &str = "http://localhost:5000";

/// Default relay listening port.
pub const DEFAULT_RELAY_PORT: u16 = 5000;

/// Multipart field carrying the document, shared by the relay client and
/// the relay's `/convert` handler.
pub const FILE_FIELD: &str = "file";

/// File name of the merged image document.
pub const MERGED_IMAGES_FILE_NAME: &str = "merged-images.pdf";

/// Configuration for a client-side conversion run.
///
/// Built via [`WorkflowConfig::builder()`] or using
/// [`WorkflowConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_docs2pdf::WorkflowConfig;
///
/// let config = WorkflowConfig::builder()
///     .relay_url("http://converter.internal:5000")
///     .output_dir("out")
///     .allow_upscale(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct WorkflowConfig {
    /// Base URL of the relay service. Documents are posted to `<relay_url>/convert`.
    /// Default: `http://localhost:5000`.
    pub relay_url: String,

    /// Directory that receives `merged-images.pdf` and every
    /// `converted-<name>.pdf`. Default: current directory.
    pub output_dir: PathBuf,

    /// Page geometry used for the merged image document. Default: A4 portrait, 10 mm margins.
    pub layout: PageLayout,

    /// Pixel density assumed when converting an image's pixel size to its
    /// natural physical size. Default: 96.
    pub image_dpi: f32,

    /// Allow images smaller than the printable area to be enlarged to fill it.
    /// Default: false (scale is clamped to at most 1.0).
    pub allow_upscale: bool,

    /// File name of the merged image document. Default: `merged-images.pdf`.
    pub merged_file_name: String,

    /// Number of documents uploaded to the relay at once. Default: 1.
    ///
    /// 1 keeps the strictly sequential behaviour. Higher values only help when
    /// the relay can run several conversions side by side.
    pub concurrency: usize,

    /// Per-upload HTTP timeout in seconds. Default: none.
    pub request_timeout_secs: Option<u64>,

    /// Receives status updates while the workflow runs.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            output_dir: PathBuf::from("."),
            layout: PageLayout::default(),
            image_dpi: 96.0,
            allow_upscale: false,
            merged_file_name: MERGED_IMAGES_FILE_NAME.to_string(),
            concurrency: 1,
            request_timeout_secs: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for WorkflowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowConfig")
            .field("relay_url", &self.relay_url)
            .field("output_dir", &self.output_dir)
            .field("layout", &self.layout)
            .field("image_dpi", &self.image_dpi)
            .field("allow_upscale", &self.allow_upscale)
            .field("merged_file_name", &self.merged_file_name)
            .field("concurrency", &self.concurrency)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn WorkflowProgressCallback>"),
            )
            .finish()
    }
}

impl WorkflowConfig {
    /// Create a new builder for `WorkflowConfig`.
    pub fn builder() -> WorkflowConfigBuilder {
        WorkflowConfigBuilder {
            config: Self::default(),
        }
    }

    /// Full URL of the relay's conversion endpoint.
    pub fn convert_endpoint(&self) -> String {
        format!("{}/convert", self.relay_url.trim_end_matches('/'))
    }
}

/// Builder for [`WorkflowConfig`].
#[derive(Debug)]
pub struct WorkflowConfigBuilder {
    config: WorkflowConfig,
}

impl WorkflowConfigBuilder {
    pub fn relay_url(mut self, url: impl Into<String>) -> Self {
        self.config.relay_url = url.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn layout(mut self, layout: PageLayout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn image_dpi(mut self, dpi: f32) -> Self {
        self.config.image_dpi = dpi;
        self
    }

    pub fn allow_upscale(mut self, v: bool) -> Self {
        self.config.allow_upscale = v;
        self
    }

    pub fn merged_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.merged_file_name = name.into();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<WorkflowConfig, Docs2PdfError> {
        let c = &self.config;
        if !(c.relay_url.starts_with("http://") || c.relay_url.starts_with("https://")) {
            return Err(Docs2PdfError::InvalidConfig(format!(
                "relay URL must be http:// or https://, got '{}'",
                c.relay_url
            )));
        }
        if !(c.image_dpi.is_finite() && c.image_dpi > 0.0) {
            return Err(Docs2PdfError::InvalidConfig(format!(
                "image DPI must be positive, got {}",
                c.image_dpi
            )));
        }
        if c.merged_file_name.trim().is_empty() {
            return Err(Docs2PdfError::InvalidConfig(
                "merged file name must not be empty".into(),
            ));
        }
        c.layout.validate()?;
        Ok(self.config)
    }
}

// ── Page geometry ────────────────────────────────────────────────────────

/// Physical page geometry in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub width_mm: f32,
    pub height_mm: f32,
    /// Applied identically on all four sides.
    pub margin_mm: f32,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::a4_portrait()
    }
}

impl PageLayout {
    /// ISO A4 portrait with 10 mm margins.
    pub const fn a4_portrait() -> Self {
        Self {
            width_mm: 210.0,
            height_mm: 297.0,
            margin_mm: 10.0,
        }
    }

    pub fn printable_width_mm(&self) -> f32 {
        self.width_mm - 2.0 * self.margin_mm
    }

    pub fn printable_height_mm(&self) -> f32 {
        self.height_mm - 2.0 * self.margin_mm
    }

    fn validate(&self) -> Result<(), Docs2PdfError> {
        let dims = [self.width_mm, self.height_mm, self.margin_mm];
        if dims.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return Err(Docs2PdfError::InvalidConfig(format!(
                "page layout values must be finite and non-negative: {self:?}"
            )));
        }
        if self.printable_width_mm() <= 0.0 || self.printable_height_mm() <= 0.0 {
            return Err(Docs2PdfError::InvalidConfig(format!(
                "margin {}mm leaves no printable area on {}x{}mm",
                self.margin_mm, self.width_mm, self.height_mm
            )));
        }
        Ok(())
    }
}

// ── Relay ────────────────────────────────────────────────────────────────

/// Configuration for the conversion relay service.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Interface to bind. Default: `0.0.0.0`.
    pub host: IpAddr,

    /// Port to listen on. Default: 5000. Use 0 for an ephemeral port.
    pub port: u16,

    /// Directory for uploaded files and their converted output. Default: `uploads`.
    pub upload_dir: PathBuf,

    /// Largest accepted request body in bytes. Default: 50 MiB.
    pub max_upload_bytes: usize,

    /// LibreOffice executable used by the default engine. Default: `soffice`.
    pub soffice_path: PathBuf,

    /// Abort a conversion after this many seconds. Default: none.
    pub conversion_timeout_secs: Option<u64>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_RELAY_PORT,
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 50 * 1024 * 1024,
            soffice_path: PathBuf::from("soffice"),
            conversion_timeout_secs: None,
        }
    }
}

impl RelayConfig {
    /// Create a new builder for `RelayConfig`.
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Builder for [`RelayConfig`].
#[derive(Debug)]
pub struct RelayConfigBuilder {
    config: RelayConfig,
}

impl RelayConfigBuilder {
    pub fn host(mut self, host: IpAddr) -> Self {
        self.config.host = host;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn soffice_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.soffice_path = path.into();
        self
    }

    pub fn conversion_timeout_secs(mut self, secs: u64) -> Self {
        self.config.conversion_timeout_secs = Some(secs);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RelayConfig, Docs2PdfError> {
        if self.config.max_upload_bytes == 0 {
            return Err(Docs2PdfError::InvalidConfig(
                "max upload size must be > 0".into(),
            ));
        }
        if self.config.conversion_timeout_secs == Some(0) {
            return Err(Docs2PdfError::InvalidConfig(
                "conversion timeout must be > 0 seconds".into(),
            ));
        }
        Ok(self.config)
    }
}
