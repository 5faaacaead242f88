//! Human-friendly feature display names.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::ConfigError;

/// Display names for the stock page-speed feature set.
const DEFAULT_NAMES: &[(&str, &str)] = &[
    ("page", "Page URL"),
    ("SpeedIndex", "Speed Index"),
    // Resource sizes
    ("totalBytes", "Total Page Size (Bytes)"),
    ("bytesCss", "CSS Size (Bytes)"),
    ("bytesJS", "JavaScript Size (Bytes)"),
    ("bytesImg", "Image Size (Bytes)"),
    ("bytesFont", "Font Size (Bytes)"),
    ("bytesHtml", "HTML Size (Bytes)"),
    ("bytesJSON", "JSON Size (Bytes)"),
    ("gzipSavings", "Potential Gzip Savings"),
    // Request counts
    ("reqTotal", "Total Requests (Count)"),
    ("reqCss", "CSS Requests (Count)"),
    ("reqJS", "JavaScript Requests (Count)"),
    ("reqImg", "Image Requests (Count)"),
    ("reqFont", "Font Requests (Count)"),
    ("reqHtml", "HTML Requests (Count)"),
    ("reqJSON", "JSON Requests (Count)"),
    // Network
    ("TTFB", "Time To First Byte (ms)"),
    ("numConnections", "TCP Connections (Count)"),
    ("numDomains", "Unique Domains (Count)"),
    ("numRedirects", "HTTP Redirects (Count)"),
    ("uses_cdn", "Uses CDN (Boolean)"),
    ("maxDomainReqs", "Max Requests Per Domain (Count)"),
    // Cache headers
    ("maxage0", "No Cache Resources"),
    ("maxage1", "Cached < 1 Day"),
    ("maxage30", "Cached 1-30 Days"),
    ("maxage365", "Cached 30-365 Days"),
    ("maxageMore", "Cached > 1 Year"),
    ("maxageNull", "No Cache Header"),
    // Rendering
    ("renderStart", "Render Start Time"),
    ("numDomElements", "DOM Element Count"),
    ("renderBlockingCSS", "Render-Blocking CSS"),
    ("renderBlockingJS", "Render-Blocking JavaScript"),
    // Paint metrics
    ("FirstPaint", "First Paint"),
    ("FirstContentfulPaint", "First Contentful Paint"),
    ("FirstImagePaint", "First Image Paint"),
    ("FirstMeaningfulPaint", "First Meaningful Paint"),
    ("LargestContentfulPaint", "Largest Contentful Paint"),
    ("layout_shifts_count", "Layout Shifts Count"),
    // Main-thread work
    ("num_long_tasks", "Long Tasks Count"),
    ("TotalBlockingTime", "Total Blocking Time"),
    ("EvaluateScript", "Script Evaluation Time"),
    ("FunctionCall", "Function Call Time"),
    ("Layout", "Layout Calculation Time"),
    // Images
    ("image_savings", "Potential Image Savings"),
    ("img_missing_width", "Images Missing Width"),
    ("img_missing_height", "Images Missing Height"),
    ("img_lazy_count", "Lazy Loaded Images"),
    ("svg_count", "SVG Images"),
    // Scripts
    ("scripts_total", "Total Scripts"),
    ("scripts_inline", "Inline Scripts"),
    ("scripts_async", "Async Scripts"),
    ("scripts_defer", "Deferred Scripts"),
    ("is_lcp_preloaded", "LCP Resource Preloaded"),
    // Third parties
    ("analytics", "Analytics Scripts"),
    ("ads", "Advertising Scripts"),
    ("marketing", "Marketing Scripts"),
    ("fonts_scripts", "Font Loading Scripts"),
    ("tagman", "Tag Manager Scripts"),
    ("chat", "Chat Widget Scripts"),
    // HTTP responses
    ("_responses_200", "Successful Responses (200)"),
    ("_responses_404", "Not Found Errors (404)"),
    ("_responses_other", "Other HTTP Responses"),
    // Load events
    ("loadEventDuration", "Load Event Duration"),
    ("dclDuration", "DOMContentLoaded Duration"),
];

/// Feature name → display name. Unknown names display as themselves.
///
/// # Example
///
/// ```
/// use aislow::report::FeatureNames;
///
/// let names = FeatureNames::builtin();
/// assert_eq!(names.display("TTFB"), "Time To First Byte (ms)");
/// assert_eq!(names.display("my_custom_metric"), "my_custom_metric");
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureNames {
    names: HashMap<String, String>,
}

impl FeatureNames {
    /// No substitutions.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in page-speed names.
    pub fn builtin() -> Self {
        Self {
            names: DEFAULT_NAMES
                .iter()
                .map(|&(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Built-in names overlaid with a JSON object of `{"feature": "Display name"}`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let overrides: HashMap<String, String> =
            serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
                path: PathBuf::from(path),
                message: e.to_string(),
            })?;
        tracing::debug!(path = %path.display(), n_names = overrides.len(), "loaded display names");
        Ok(Self::builtin().with_overrides(overrides))
    }

    /// Add or replace display names.
    pub fn with_overrides(mut self, overrides: impl IntoIterator<Item = (String, String)>) -> Self {
        self.names.extend(overrides);
        self
    }

    pub fn display<'a>(&'a self, name: &'a str) -> &'a str {
        self.names.get(name).map_or(name, String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
