//! Create/read/delete smoke checks against the pets API.
//!
//! The script is fixed and ordered:
//! 1. `GET /pets` returns an array
//! 2. `POST /pets` returns an object with an `id`
//! 3. `GET /pets` again contains that `id`
//! 4. `DELETE /pets/{id}` returns 204
//!
//! Every step depends on the previous one, so the first failure stops the
//! run and the remaining steps are reported as not run. A successful run
//! deletes the pet it created.

use crate::error::{Error, Result};
use reqwest::{Client, StatusCode, Url, header};
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{info, warn};

/// Per-request timeout for smoke requests.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub const SMOKE_PET_NAME: &str = "smoke-pet";
pub const SMOKE_PET_TAG: &str = "smoke";

/// The four smoke steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    ListPets,
    CreatePet,
    VerifyCreated,
    DeletePet,
}

impl Step {
    pub const ALL: [Step; 4] = [
        Step::ListPets,
        Step::CreatePet,
        Step::VerifyCreated,
        Step::DeletePet,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Step::ListPets => "list_pets",
            Step::CreatePet => "create_pet",
            Step::VerifyCreated => "verify_created",
            Step::DeletePet => "delete_pet",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Step::ListPets => "GET /pets returns an array",
            Step::CreatePet => "POST /pets returns a pet with an id",
            Step::VerifyCreated => "GET /pets contains the created pet",
            Step::DeletePet => "DELETE /pets/{id} returns 204",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed(String),
    NotRun,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: Step,
    pub status: StepStatus,
    /// What was observed on success (e.g. array length, created id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Ordered per-step results of one smoke run.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub steps: Vec<StepReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_id: Option<Value>,
}

impl Default for CheckOutcome {
    fn default() -> Self {
        Self {
            steps: Step::ALL
                .iter()
                .map(|&step| StepReport {
                    step,
                    status: StepStatus::NotRun,
                    detail: None,
                })
                .collect(),
            created_id: None,
        }
    }
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Passed)
    }

    pub fn status(&self, step: Step) -> Option<&StepStatus> {
        self.steps.iter().find(|s| s.step == step).map(|s| &s.status)
    }

    pub fn first_failure(&self) -> Option<&StepReport> {
        self.steps
            .iter()
            .find(|s| matches!(s.status, StepStatus::Failed(_)))
    }

    fn record(&mut self, step: Step, status: StepStatus, detail: Option<String>) {
        if let Some(report) = self.steps.iter_mut().find(|s| s.step == step) {
            report.status = status;
            report.detail = detail;
        }
    }

    fn pass(&mut self, step: Step, detail: impl Into<String>) {
        self.record(step, StepStatus::Passed, Some(detail.into()));
    }
}

/// Runs the smoke script against one base URL.
pub struct SmokeCheckRunner {
    client: Client,
    base_url: String,
}

impl SmokeCheckRunner {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run all steps, recording progress into `outcome`.
    ///
    /// Returns the error of the first failing step; later steps stay `NotRun`.
    pub async fn run(&self, outcome: &mut CheckOutcome) -> Result<()> {
        info!("Running smoke checks against {}", self.base_url);
        match self.execute(outcome).await {
            Ok(()) => {
                info!("All smoke checks passed");
                Ok(())
            }
            Err((step, e)) => {
                warn!("Smoke step {} failed: {}", step.name(), e);
                let message = match &e {
                    Error::Assertion { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                outcome.record(step, StepStatus::Failed(message), None);
                Err(e)
            }
        }
    }

    async fn execute(&self, outcome: &mut CheckOutcome) -> std::result::Result<(), (Step, Error)> {
        let pets = self
            .list_pets(Step::ListPets)
            .await
            .map_err(|e| (Step::ListPets, e))?;
        info!("GET /pets returned array length {}", pets.len());
        outcome.pass(Step::ListPets, format!("{} pets", pets.len()));

        let id = self.create_pet().await.map_err(|e| (Step::CreatePet, e))?;
        info!("Created pet id {}", id);
        outcome.created_id = Some(id.clone());
        outcome.pass(Step::CreatePet, format!("id {}", id));

        let pets = self
            .list_pets(Step::VerifyCreated)
            .await
            .map_err(|e| (Step::VerifyCreated, e))?;
        if !pets.iter().any(|p| p.get("id") == Some(&id)) {
            return Err((
                Step::VerifyCreated,
                Error::assertion(
                    Step::VerifyCreated.name(),
                    format!("created pet {} not found in GET /pets results", id),
                ),
            ));
        }
        outcome.pass(Step::VerifyCreated, format!("found among {} pets", pets.len()));

        let status = self.delete_pet(&id).await.map_err(|e| (Step::DeletePet, e))?;
        if status != StatusCode::NO_CONTENT {
            return Err((
                Step::DeletePet,
                Error::assertion(
                    Step::DeletePet.name(),
                    format!("DELETE did not return 204 (got {})", status.as_u16()),
                ),
            ));
        }
        info!("DELETE returned 204 as expected");
        outcome.pass(Step::DeletePet, "204 No Content");

        Ok(())
    }

    async fn list_pets(&self, step: Step) -> Result<Vec<Value>> {
        let response = self
            .client
            .get(format!("{}/pets", self.base_url))
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::assertion(
                step.name(),
                format!("GET /pets returned status {}", status.as_u16()),
            ));
        }

        match response.json::<Value>().await? {
            Value::Array(pets) => Ok(pets),
            other => Err(Error::assertion(
                step.name(),
                format!("GET /pets did not return a JSON array (got {})", kind(&other)),
            )),
        }
    }

    async fn create_pet(&self) -> Result<Value> {
        let step = Step::CreatePet.name();
        let response = self
            .client
            .post(format!("{}/pets", self.base_url))
            .header(header::ACCEPT, "application/json")
            .json(&json!({ "name": SMOKE_PET_NAME, "tag": SMOKE_PET_TAG }))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(Error::assertion(
                step,
                format!("POST /pets returned status {}, expected 200 or 201", status.as_u16()),
            ));
        }

        let fields = match response.json::<Value>().await? {
            Value::Object(fields) => fields,
            other => {
                return Err(Error::assertion(
                    step,
                    format!("POST /pets did not return a JSON object (got {})", kind(&other)),
                ));
            }
        };

        fields.get("id").cloned().ok_or_else(|| {
            Error::assertion(step, "POST /pets response is missing required field `id`")
        })
    }

    async fn delete_pet(&self, id: &Value) -> Result<StatusCode> {
        let id = match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let mut url = Url::parse(&format!("{}/pets", self.base_url))
            .map_err(|e| Error::Other(format!("invalid base URL {}: {}", self.base_url, e)))?;
        // Server-issued ids are opaque; escape them as a single segment
        url.path_segments_mut()
            .map_err(|()| Error::Other(format!("invalid base URL {}", self.base_url)))?
            .push(&id);

        let response = self.client.delete(url).send().await?;
        Ok(response.status())
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
