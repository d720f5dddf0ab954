// ============================================================
// Layer 6 — MLflow REST Tracker
// ============================================================
// Talks to an MLflow tracking server over its REST API using a
// blocking reqwest client (training and monitoring are
// synchronous, so no async runtime is needed here).
//
//   experiments/get-by-name  → find the experiment id
//   experiments/create       → create it when missing
//   runs/create              → one run per start_run()
//   runs/log-parameter       → log_param
//   runs/log-metric          → log_metric
//   runs/update              → finish (FINISHED / FAILED)
//   mlflow-artifacts proxy   → log_artifact (HTTP PUT per file)
//
// The experiment id is resolved once when the tracker is built.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use walkdir::WalkDir;

use crate::config::HTTP_TIMEOUT_SECS;
use crate::error::Error;
use crate::domain::traits::{ExperimentTracker, RunStatus, TrackerRun};
use crate::infra::tracker::now_millis;

const API: &str = "api/2.0/mlflow";
const ARTIFACT_API: &str = "api/2.0/mlflow-artifacts/artifacts";
const ARTIFACT_SCHEME: &str = "mlflow-artifacts:/";

pub struct MlflowTracker {
    client:        Client,
    base:          String,
    experiment_id: String,
}

#[derive(Deserialize)]
struct GetExperimentResponse {
    experiment: ExperimentInfo,
}

#[derive(Deserialize)]
struct ExperimentInfo {
    experiment_id: String,
}

#[derive(Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Deserialize)]
struct CreateRunResponse {
    run: RunBody,
}

#[derive(Deserialize)]
struct RunBody {
    info: RunInfo,
}

#[derive(Deserialize)]
struct RunInfo {
    run_id: String,
    #[serde(default)]
    artifact_uri: String,
}

impl MlflowTracker {
    pub fn new(base_url: &str, experiment: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .context("Cannot build HTTP client")?;
        let base = base_url.trim_end_matches('/').to_string();
        let experiment_id = resolve_experiment(&client, &base, experiment)?;
        tracing::info!("Using MLflow experiment '{}' (id {})", experiment, experiment_id);
        Ok(Self { client, base, experiment_id })
    }
}

fn resolve_experiment(client: &Client, base: &str, name: &str) -> Result<String> {
    let resp = client
        .get(format!("{base}/{API}/experiments/get-by-name"))
        .query(&[("experiment_name", name)])
        .send()
        .with_context(|| format!("Cannot reach MLflow at {base}"))?;

    if resp.status().is_success() {
        let body: GetExperimentResponse = resp.json().context("Bad get-by-name response")?;
        return Ok(body.experiment.experiment_id);
    }
    if resp.status() != reqwest::StatusCode::NOT_FOUND {
        return Err(Error::tracker(format!("get-by-name returned {}", resp.status())).into());
    }

    let body: CreateExperimentResponse = post_json(
        client,
        &format!("{base}/{API}/experiments/create"),
        &json!({ "name": name }),
    )?
    .json()
    .context("Bad experiments/create response")?;
    Ok(body.experiment_id)
}

fn post_json(
    client: &Client,
    url:    &str,
    body:   &serde_json::Value,
) -> Result<reqwest::blocking::Response> {
    let resp = client
        .post(url)
        .json(body)
        .send()
        .with_context(|| format!("POST {url}"))?;
    if !resp.status().is_success() {
        let status = resp.status();
        let text   = resp.text().unwrap_or_default();
        return Err(Error::tracker(format!("POST {url} returned {status}: {text}")).into());
    }
    Ok(resp)
}

impl ExperimentTracker for MlflowTracker {
    fn start_run(&self, name: &str) -> Result<Box<dyn TrackerRun>> {
        let body: CreateRunResponse = post_json(
            &self.client,
            &format!("{}/{API}/runs/create", self.base),
            &json!({
                "experiment_id": self.experiment_id,
                "run_name":      name,
                "start_time":    now_millis(),
            }),
        )?
        .json()
        .context("Bad runs/create response")?;

        let info = body.run.info;
        let artifact_root = match info.artifact_uri.strip_prefix(ARTIFACT_SCHEME) {
            Some(rest) => rest.trim_matches('/').to_string(),
            None => format!("{}/{}/artifacts", self.experiment_id, info.run_id),
        };

        tracing::info!("Started MLflow run '{}' ({})", name, info.run_id);
        Ok(Box::new(MlflowRun {
            client: self.client.clone(),
            base:   self.base.clone(),
            run_id: info.run_id,
            artifact_root,
        }))
    }
}

struct MlflowRun {
    client:        Client,
    base:          String,
    run_id:        String,
    artifact_root: String,
}

impl MlflowRun {
    fn post(&self, endpoint: &str, body: serde_json::Value) -> Result<()> {
        post_json(&self.client, &format!("{}/{API}/{endpoint}", self.base), &body)?;
        Ok(())
    }

    fn upload(&self, file: &Path, remote: &str) -> Result<()> {
        let bytes = fs::read(file).with_context(|| format!("Cannot read '{}'", file.display()))?;
        let url   = format!("{}/{ARTIFACT_API}/{}/{}", self.base, self.artifact_root, remote);
        let resp  = self.client.put(&url).body(bytes).send().with_context(|| format!("PUT {url}"))?;
        if !resp.status().is_success() {
            return Err(Error::tracker(format!("artifact upload to {url} returned {}", resp.status())).into());
        }
        Ok(())
    }
}

impl TrackerRun for MlflowRun {
    fn log_param(&mut self, key: &str, value: &str) -> Result<()> {
        self.post("runs/log-parameter", json!({ "run_id": self.run_id, "key": key, "value": value }))
    }

    fn log_metric(&mut self, key: &str, value: f64, step: Option<u64>) -> Result<()> {
        self.post(
            "runs/log-metric",
            json!({
                "run_id":    self.run_id,
                "key":       key,
                "value":     value,
                "timestamp": now_millis(),
                "step":      step.unwrap_or(0),
            }),
        )
    }

    fn log_artifact(&mut self, path: &Path, destination: &str) -> Result<()> {
        let destination = destination.trim_matches('/');
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Cannot read artifact '{}'", path.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = match entry.path().strip_prefix(path) {
                Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
                _ => PathBuf::from(entry.file_name()),
            };
            let remote = remote_path(destination, &relative);
            self.upload(entry.path(), &remote)?;
        }
        Ok(())
    }

    fn finish(self: Box<Self>, status: RunStatus) -> Result<()> {
        self.post(
            "runs/update",
            json!({
                "run_id":   self.run_id,
                "status":   status.as_str(),
                "end_time": now_millis(),
            }),
        )?;
        tracing::info!("MLflow run {} ended: {}", self.run_id, status.as_str());
        Ok(())
    }
}

/// `dest/a/b.json` with forward slashes regardless of platform.
fn remote_path(destination: &str, relative: &Path) -> String {
    let rel: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if destination.is_empty() {
        rel.join("/")
    } else {
        format!("{destination}/{}", rel.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_path_joins_with_slashes() {
        assert_eq!(remote_path("model", Path::new("model.bin")), "model/model.bin");
        assert_eq!(remote_path("", Path::new("a/b.json")), "a/b.json");
    }

    #[test]
    fn test_run_response_parses() {
        let body: CreateRunResponse = serde_json::from_str(
            r#"{"run":{"info":{"run_id":"abc","artifact_uri":"mlflow-artifacts:/1/abc/artifacts"}}}"#,
        )
        .unwrap();
        assert_eq!(body.run.info.run_id, "abc");
        assert_eq!(
            body.run.info.artifact_uri.strip_prefix(ARTIFACT_SCHEME).unwrap(),
            "1/abc/artifacts"
        );
    }

    /// Answers a single request with `status` and closes the connection.
    fn one_shot_server(status: &'static str) -> String {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr     = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            let reply = format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
            stream.write_all(reply.as_bytes()).unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_server_error_is_a_tracker_error() {
        let base = one_shot_server("500 Internal Server Error");
        let err  = MlflowTracker::new(&base, "exp").err().unwrap();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Tracker(_))), "{err:#}");
    }

    #[test]
    fn test_unreachable_server_is_an_error() {
        assert!(MlflowTracker::new("http://127.0.0.1:9", "exp").is_err());
    }
}
