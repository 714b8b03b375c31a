//! OGC WMS `GetMap` renderer.

use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};
use reqwest::{blocking::Client, redirect::Policy, header::CONTENT_TYPE};
use zonegeom::{Crs, TileBounds};

use super::{image_size, RasterImage, RenderError, Renderer};
use crate::config::{RenderSettings, ResolutionMode};

/// Fetches tiles from a WMS 1.3.0 server.
#[derive(Debug)]
pub struct WmsRenderer {
    client: Client,
    settings: RenderSettings,
}

impl WmsRenderer {
    pub fn new(settings: &RenderSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("treezone/", env!("CARGO_PKG_VERSION")))
            .redirect(Policy::limited(10))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("[render::wms] Failed to build HTTP client")?;
        Ok(Self { client, settings: settings.clone() })
    }

    /// `GetMap` query parameters for `bounds` at the given image size.
    fn query(&self, bounds: &TileBounds, width: u32, height: u32) -> Vec<(&'static str, String)> {
        // WMS 1.3.0 follows the CRS authority axis order: lat/lon for geographic systems.
        let geographic = Crs::from_epsg(bounds.epsg())
            .map(|crs| crs.is_geographic())
            .unwrap_or(false);
        let [xmin, ymin, xmax, ymax] = bounds.as_array();
        let bbox = if geographic {
            format!("{ymin},{xmin},{ymax},{xmax}")
        } else {
            format!("{xmin},{ymin},{xmax},{ymax}")
        };

        vec![
            ("SERVICE", "WMS".to_string()),
            ("VERSION", "1.3.0".to_string()),
            ("REQUEST", "GetMap".to_string()),
            ("LAYERS", self.settings.layer.clone()),
            ("STYLES", self.settings.style.clone()),
            ("CRS", format!("EPSG:{}", bounds.epsg())),
            ("BBOX", bbox),
            ("WIDTH", width.to_string()),
            ("HEIGHT", height.to_string()),
            ("FORMAT", self.settings.format.clone()),
        ]
    }

    fn transport_error(&self, e: reqwest::Error) -> RenderError {
        if e.is_timeout() {
            RenderError::Timeout(self.settings.timeout_secs)
        } else {
            RenderError::Transport(e.to_string())
        }
    }
}

impl Renderer for WmsRenderer {
    fn render(&self, bounds: &TileBounds, mode: ResolutionMode) -> Result<RasterImage, RenderError> {
        let pixel_size = self.settings.pixel_size_for(mode);
        let (width, height) = image_size(bounds, pixel_size, self.settings.max_dimension)?;
        info!("[render::wms] requesting {width}x{height} tile of {} ({mode} resolution)", self.settings.layer);

        let response = self.client.get(&self.settings.url)
            .query(&self.query(bounds, width, height))
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let content_type = response.headers().get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.bytes().map_err(|e| self.transport_error(e))?;
        debug!("[render::wms] HTTP {status}, {content_type}, {} bytes", body.len());

        if !status.is_success() {
            return Err(RenderError::Http {
                status: status.as_u16(),
                message: service_exception_message(&String::from_utf8_lossy(&body)),
            });
        }
        if content_type.contains("xml") || content_type.starts_with("text/") {
            return Err(RenderError::Service(service_exception_message(&String::from_utf8_lossy(&body))));
        }

        let image = image::load_from_memory(&body)?.to_rgb8();
        RasterImage::from_rgb(image, *bounds)
    }
}

/// Pull the human-readable message out of a WMS `ServiceExceptionReport`,
/// falling back to the trimmed body.
fn service_exception_message(body: &str) -> String {
    // Anchor on the closing tag: `<ServiceException` is also a prefix of the
    // `<ServiceExceptionReport>` wrapper.
    let message = body.find("</ServiceException>")
        .and_then(|close| {
            let open_end = body[..close].rfind('>')? + 1;
            Some(body[open_end..close].trim())
        })
        .unwrap_or_else(|| body.trim());
    message.chars().take(500).collect()
}
