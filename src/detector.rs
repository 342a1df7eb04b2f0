//! Detection service client.
//! Posts the captured frame (PNG, base64) to an object-detection server and returns the raw
//! batch of labels, boxes and scores. The model itself runs out of process.
//! Accepts either a bare batch or the inferencer-style `{"predictions": [batch, ...]}` body.
//! Latency: network + inference, typically 50-300ms on a local GPU server.

use std::io::Cursor;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, ImageFormat};
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::DetectionConfig;
use crate::detection::DetectionBatch;
use crate::error::ReconstructError;

// *************** Request/Response Types ***************

#[derive(Serialize)]
struct DetectRequest {
    image: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DetectResponse {
    Wrapped { predictions: Vec<DetectionBatch> },
    Bare(DetectionBatch),
}

// *************** Public API ***************

pub struct Detector {
    client: Client,
    endpoint: String,
    max_retries: u32,
}

impl Detector {
    pub fn new(config: &DetectionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            max_retries: config.max_retries,
        })
    }

    /// Runs detection on one frame. Transport failures are retried; a malformed answer is not.
    pub async fn detect(&self, image: &DynamicImage) -> Result<DetectionBatch> {
        let request = DetectRequest { image: encode_png_base64(image)? };

        let mut last_error = None;
        for attempt in 1..=self.max_retries + 1 {
            match self.call(&request).await {
                Ok(body) => return Ok(parse_response(&body)?),
                Err(e) => {
                    warn!(
                        "Detector attempt {}/{} failed: {:#}",
                        attempt,
                        self.max_retries + 1,
                        e
                    );
                    last_error = Some(e);
                    if attempt <= self.max_retries {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Detector was never called")))
    }

    async fn call(&self, request: &DetectRequest) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .with_context(|| format!("Failed to reach detector at {}", self.endpoint))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Detector error {}: {}", status, body);
        }

        response
            .text()
            .await
            .context("Failed to read detector response")
    }
}

// *************** Internal Functions ***************

fn encode_png_base64(image: &DynamicImage) -> Result<String> {
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .context("Failed to encode frame as PNG")?;
    debug!("Frame encoded: {} bytes PNG", png.len());
    Ok(general_purpose::STANDARD.encode(&png))
}

/// Extracts the first batch from a detector response body.
fn parse_response(body: &str) -> Result<DetectionBatch, ReconstructError> {
    let response: DetectResponse =
        serde_json::from_str(body).map_err(|e| ReconstructError::MalformedBatch {
            reason: format!("unreadable detector response: {}", e),
        })?;

    match response {
        DetectResponse::Bare(batch) => Ok(batch),
        DetectResponse::Wrapped { predictions } => {
            predictions
                .into_iter()
                .next()
                .ok_or_else(|| ReconstructError::MalformedBatch {
                    reason: "empty 'predictions' list".to_string(),
                })
        }
    }
}

// *************** Tests ***************
