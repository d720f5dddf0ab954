// ============================================================
// Layer 6 — Predict Client
// ============================================================
// The monitor's HTTP view of the inference service: one
// multipart POST per image, field name "file", blocking, with a
// fixed timeout.
//
// Error mapping:
//   timeout                 → CycleError::Timeout
//   connect / non-2xx / ... → CycleError::Network
//   body without a label    → CycleError::InvalidResponse

use std::time::Duration;

use reqwest::blocking::{multipart, Client};

use crate::domain::prediction::RemotePrediction;
use crate::domain::traits::PredictClient;
use crate::error::CycleError;

pub struct HttpPredictClient {
    client: Client,
    url:    String,
}

impl HttpPredictClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }
}

fn transport_error(err: reqwest::Error) -> CycleError {
    if err.is_timeout() {
        CycleError::Timeout(err.to_string())
    } else {
        CycleError::Network(err.to_string())
    }
}

impl PredictClient for HttpPredictClient {
    fn endpoint(&self) -> &str {
        &self.url
    }

    fn predict(&self, file_name: &str, bytes: Vec<u8>) -> Result<RemotePrediction, CycleError> {
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type_for(file_name))
            .map_err(|e| CycleError::InvalidResponse(e.to_string()))?;
        let form = multipart::Form::new().part("file", part);

        let resp = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(CycleError::Network(format!("{status} from {}: {body}", self.url)));
        }

        resp.json::<RemotePrediction>().map_err(|e| {
            if e.is_timeout() {
                CycleError::Timeout(e.to_string())
            } else {
                CycleError::InvalidResponse(e.to_string())
            }
        })
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_by_extension() {
        assert_eq!(content_type_for("a.PNG"), "image/png");
        assert_eq!(content_type_for("b.webp"), "image/webp");
        assert_eq!(content_type_for("c.jpg"), "image/jpeg");
    }

    #[test]
    fn test_connection_refused_is_network_error() {
        let client = HttpPredictClient::new("http://127.0.0.1:9/predict", Duration::from_secs(2)).unwrap();
        let err    = client.predict("x.png", vec![0u8; 4]).unwrap_err();
        assert!(matches!(err, CycleError::Network(_) | CycleError::Timeout(_)));
    }
}
