// src/tracking/mlflow.rs
//! Thin MLflow REST client.
//!
//! The "current experiment" is an explicit [`ExperimentContext`] value handed to
//! `start_run`, so two pipelines in one process never share tracker state.
//! Server failures are returned as-is; there is no retry or validation here.

use anyhow::{anyhow, bail, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::Display;

use crate::config::pipeline::TrackingSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentContext {
    pub experiment_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Finished,
    Failed,
    Killed,
}

impl RunStatus {
    fn as_str(self) -> &'static str {
        match self {
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed => "FAILED",
            RunStatus::Killed => "KILLED",
        }
    }
}

#[derive(Deserialize)]
struct ExperimentResp {
    experiment: ExperimentBody,
}
#[derive(Deserialize)]
struct ExperimentBody {
    experiment_id: String,
}
#[derive(Deserialize)]
struct CreateExperimentResp {
    experiment_id: String,
}
#[derive(Deserialize)]
struct RunResp {
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
#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    error_code: String,
}

#[derive(Clone)]
pub struct MlflowClient {
    http: Client,
    base_url: String,
}

impl MlflowClient {
    pub fn new(tracking_uri: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: tracking_uri.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_settings(s: &TrackingSettings) -> Self {
        Self::new(s.resolve_uri())
    }

    pub fn tracking_uri(&self) -> &str {
        &self.base_url
    }

    fn api(&self, path: &str) -> String {
        format!("{}/api/2.0/mlflow/{}", self.base_url, path)
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<reqwest::Response> {
        Ok(self
            .http
            .post(self.api(path))
            .json(body)
            .send()
            .await?
            .error_for_status()?)
    }

    /// Look up an experiment by name, creating it when it does not exist.
    pub async fn set_experiment(&self, name: &str) -> Result<ExperimentContext> {
        let resp = self
            .http
            .get(self.api("experiments/get-by-name"))
            .query(&[("experiment_name", name)])
            .send()
            .await?;

        if resp.status().is_success() {
            let body: ExperimentResp = resp.json().await?;
            tracing::info!(experiment = name, id = %body.experiment.experiment_id, "using mlflow experiment");
            return Ok(ExperimentContext {
                experiment_id: body.experiment.experiment_id,
                name: name.to_string(),
            });
        }

        let status = resp.status();
        let text = resp.text().await?;
        let code = serde_json::from_str::<ApiError>(&text)
            .map(|e| e.error_code)
            .unwrap_or_default();
        if status != StatusCode::NOT_FOUND && code != "RESOURCE_DOES_NOT_EXIST" {
            bail!("mlflow get-by-name returned {status}: {text}");
        }

        let created: CreateExperimentResp = self
            .post("experiments/create", &json!({ "name": name }))
            .await?
            .json()
            .await?;
        tracing::info!(experiment = name, id = %created.experiment_id, "created mlflow experiment");
        Ok(ExperimentContext {
            experiment_id: created.experiment_id,
            name: name.to_string(),
        })
    }

    pub async fn start_run(
        &self,
        ctx: &ExperimentContext,
        run_name: Option<&str>,
    ) -> Result<ActiveRun<'_>> {
        let mut body = json!({
            "experiment_id": ctx.experiment_id,
            "start_time": chrono::Utc::now().timestamp_millis(),
        });
        if let Some(n) = run_name {
            body["run_name"] = json!(n);
            body["tags"] = json!([{ "key": "mlflow.runName", "value": n }]);
        }
        let resp: RunResp = self.post("runs/create", &body).await?.json().await?;
        tracing::info!(run_id = %resp.run.info.run_id, experiment = %ctx.name, "mlflow run started");
        Ok(ActiveRun {
            client: self,
            run_id: resp.run.info.run_id,
            artifact_uri: resp.run.info.artifact_uri,
            ended: false,
        })
    }
}

/// A started run. Call [`ActiveRun::end`] to close it; dropping an open run only logs.
pub struct ActiveRun<'a> {
    client: &'a MlflowClient,
    run_id: String,
    artifact_uri: String,
    ended: bool,
}

impl ActiveRun<'_> {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub async fn log_params<I, K, V>(&self, params: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Display,
    {
        for (k, v) in params {
            self.client
                .post(
                    "runs/log-parameter",
                    &json!({ "run_id": self.run_id, "key": k.as_ref(), "value": v.to_string() }),
                )
                .await?;
        }
        Ok(())
    }

    pub async fn log_metrics<I, K>(&self, metrics: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let ts = chrono::Utc::now().timestamp_millis();
        for (k, v) in metrics {
            self.client
                .post(
                    "runs/log-metric",
                    &json!({ "run_id": self.run_id, "key": k.as_ref(), "value": v, "timestamp": ts, "step": 0 }),
                )
                .await?;
        }
        Ok(())
    }

    /// Upload a serializable model as `<artifact_path>/model.json` through the
    /// server's artifact proxy (`mlflow-artifacts:` URIs only).
    pub async fn log_model<M: Serialize>(&self, model: &M, artifact_path: &str) -> Result<()> {
        let rest = self
            .artifact_uri
            .strip_prefix("mlflow-artifacts:")
            .ok_or_else(|| {
                anyhow!(
                    "artifact uri {:?} is not served by the tracking server",
                    self.artifact_uri
                )
            })?
            .trim_start_matches('/');
        let url = format!(
            "{}/api/2.0/mlflow-artifacts/artifacts/{}/{}/model.json",
            self.client.base_url,
            rest.trim_end_matches('/'),
            artifact_path.trim_matches('/')
        );
        let body = serde_json::to_vec(model)?;
        self.client
            .http
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        tracing::info!(run_id = %self.run_id, artifact_path, "model logged");
        Ok(())
    }

    pub async fn end(self) -> Result<()> {
        self.end_with(RunStatus::Finished).await
    }

    pub async fn end_with(mut self, status: RunStatus) -> Result<()> {
        self.ended = true;
        self.client
            .post(
                "runs/update",
                &json!({
                    "run_id": self.run_id,
                    "status": status.as_str(),
                    "end_time": chrono::Utc::now().timestamp_millis(),
                }),
            )
            .await?;
        tracing::info!(run_id = %self.run_id, status = status.as_str(), "mlflow run ended");
        Ok(())
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        if !self.ended {
            tracing::warn!(run_id = %self.run_id, "mlflow run dropped without end()");
        }
    }
}
