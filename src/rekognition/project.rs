//! `aws_rekognition_project`: a Custom Labels or Content Moderation project.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_rekognition::types::{CustomizationFeature, ProjectAutoUpdate, ProjectDescription};
use tracing::{debug, info};

use crate::config::AwsClients;
use crate::error::{sdk_error, NotFoundExt, ProviderError};
use crate::resource::{read_back, Resource};
use crate::retry::{wait_for_status, StatusWait};
use crate::schema::{Attribute, Diagnostic, Schema, Validator};
use crate::state::State;

const TIMEOUT: Duration = Duration::from_secs(10 * 60);

const DEFAULT_FEATURE: &str = "CUSTOM_LABELS";

/// A Rekognition project. The ID is the project name.
pub struct Project;

async fn find_project(clients: &AwsClients, name: &str) -> Result<Option<ProjectDescription>, ProviderError> {
    let mut next_token = None;
    loop {
        let output = clients
            .rekognition
            .describe_projects()
            .project_names(name)
            .features(CustomizationFeature::CustomLabels)
            .features(CustomizationFeature::ContentModeration)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("reading Rekognition Project ({name})"), e))?;

        if let Some(project) = output.project_descriptions().iter().find(|p| project_name(p) == Some(name)) {
            return Ok(Some(project.clone()));
        }
        match output.next_token() {
            Some(token) if !token.is_empty() => next_token = Some(token.to_owned()),
            _ => return Ok(None),
        }
    }
}

/// The project name is the last segment of `arn:aws:rekognition:<region>:<account>:project/<name>/<timestamp>`.
fn project_name(project: &ProjectDescription) -> Option<&str> {
    let arn = project.project_arn()?;
    let (_, rest) = arn.split_once(":project/")?;
    rest.split('/').next()
}

fn status_of(project: &ProjectDescription) -> String {
    project.status().map(|s| s.as_str().to_owned()).unwrap_or_default()
}

#[async_trait]
impl Resource for Project {
    fn type_name(&self) -> &'static str {
        "aws_rekognition_project"
    }

    fn schema(&self) -> Schema {
        Schema::resource()
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_validator(Validator::length(1, 255))
                    .with_validator(Validator::pattern(
                        r"^[a-zA-Z0-9_.\-]+$",
                        "must contain only letters, digits, '_', '.' and '-'",
                    )),
            )
            .with_attribute(
                "feature",
                Attribute::optional_computed_string()
                    .one_of(&["CUSTOM_LABELS", "CONTENT_MODERATION"])
                    .with_default(DEFAULT_FEATURE)
                    .with_force_new(),
            )
            .with_attribute(
                "auto_update",
                Attribute::optional_computed_string()
                    .one_of(&["ENABLED", "DISABLED"])
                    .with_force_new(),
            )
            .with_attribute("arn", Attribute::computed_string())
    }

    fn validate(&self, config: &State) -> Vec<Diagnostic> {
        let feature = config.str("feature").unwrap_or(DEFAULT_FEATURE);
        if config.str("auto_update").is_some() && feature != "CONTENT_MODERATION" {
            return vec![Diagnostic::error("auto_update requires feature CONTENT_MODERATION")
                .with_detail(format!("auto_update cannot be set for a {feature} project."))
                .with_attribute("auto_update")];
        }
        Vec::new()
    }

    async fn create(&self, clients: &AwsClients, planned: State) -> Result<State, ProviderError> {
        let name = planned.required_str("name")?.to_owned();
        let feature = planned.str("feature").unwrap_or(DEFAULT_FEATURE);
        debug!(name, feature, "creating Rekognition Project");

        clients
            .rekognition
            .create_project()
            .project_name(&name)
            .feature(CustomizationFeature::from(feature))
            .set_auto_update(planned.enum_value::<ProjectAutoUpdate>("auto_update"))
            .send()
            .await
            .map_err(|e| sdk_error(&format!("creating Rekognition Project ({name})"), e))?;

        let lookup = name.as_str();
        let wait = StatusWait::new(&["CREATING"], &["CREATED"], TIMEOUT);
        wait_for_status("Rekognition Project", &wait, || async move {
            Ok(find_project(clients, lookup).await?.map(|project| {
                let status = status_of(&project);
                (project, status)
            }))
        })
        .await?;
        info!(name, "created Rekognition Project");

        let state = planned.with("id", name.as_str());
        read_back(&format!("Rekognition Project ({name})"), self.read(clients, state).await?)
    }

    async fn read(&self, clients: &AwsClients, current: State) -> Result<Option<State>, ProviderError> {
        let id = current.id()?.to_owned();
        let Some(project) = find_project(clients, &id).await.optional()?.flatten() else {
            debug!(id, "Rekognition Project not found, removing from state");
            return Ok(None);
        };

        let mut state = current
            .with("name", id.as_str())
            .with("arn", project.project_arn());
        state.set_enum("feature", project.feature());
        state.set_enum("auto_update", project.auto_update());
        Ok(Some(state))
    }

    async fn update(&self, clients: &AwsClients, prior: State, planned: State) -> Result<State, ProviderError> {
        // Every configurable attribute forces replacement.
        let id = prior.id()?.to_owned();
        let state = planned.with("id", id.as_str());
        read_back(&format!("Rekognition Project ({id})"), self.read(clients, state).await?)
    }

    async fn delete(&self, clients: &AwsClients, current: State) -> Result<(), ProviderError> {
        let id = current.id()?;
        let arn = match current.str("arn") {
            Some(arn) => arn.to_owned(),
            None => match find_project(clients, id).await?.and_then(|p| p.project_arn) {
                Some(arn) => arn,
                None => return Ok(()),
            },
        };
        debug!(id, arn, "deleting Rekognition Project");

        let deleted = clients
            .rekognition
            .delete_project()
            .project_arn(&arn)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("deleting Rekognition Project ({id})"), e))
            .optional()?;
        if deleted.is_none() {
            return Ok(());
        }

        let wait = StatusWait::gone(&["DELETING", "CREATED"], TIMEOUT);
        wait_for_status("Rekognition Project", &wait, || async move {
            Ok(find_project(clients, id).await?.map(|project| ((), status_of(&project))))
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;
    use serde_json::json;

    fn state(value: serde_json::Value) -> State {
        State::from_value(value).unwrap()
    }

    #[test]
    fn test_project_name_from_arn() {
        let project = ProjectDescription::builder()
            .project_arn("arn:aws:rekognition:us-east-1:123456789012:project/my-labels/1700000000000")
            .build();
        assert_eq!(project_name(&project), Some("my-labels"));

        let bare = ProjectDescription::builder().build();
        assert_eq!(project_name(&bare), None);
    }

    #[test]
    fn test_auto_update_requires_content_moderation() {
        let moderation = state(json!({"name": "p", "feature": "CONTENT_MODERATION", "auto_update": "ENABLED"}));
        assert!(Project.validate(&moderation).is_empty());

        let labels = state(json!({"name": "p", "auto_update": "ENABLED"}));
        let diagnostics = Project.validate(&labels);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("auto_update"));
    }

    #[test]
    fn test_name_validation() {
        let schema = Project.schema();

        assert!(validate(&schema, &json!({"name": "my_project.v2"})).is_empty());
        assert!(!validate(&schema, &json!({"name": "my project"})).is_empty());
        assert!(!validate(&schema, &json!({"name": "p", "feature": "FACES"})).is_empty());
    }

    #[test]
    fn test_feature_default() {
        let schema = Project.schema();
        assert_eq!(schema.block.attributes["feature"].default, Some(json!(DEFAULT_FEATURE)));
    }
}
