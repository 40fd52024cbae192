//! `aws_appsync_domain_name_api_association`: routes a custom domain to an API.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::AwsClients;
use crate::error::{sdk_error, NotFoundExt, ProviderError};
use crate::resource::{read_back, Resource};
use crate::retry::{wait_for_status, StatusWait};
use crate::schema::{Attribute, Schema};
use crate::state::State;

const TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// The API a custom domain points at. The ID is the domain name.
pub struct DomainNameApiAssociation;

async fn get_association(
    clients: &AwsClients,
    domain_name: &str,
) -> Result<Option<aws_sdk_appsync::types::ApiAssociation>, ProviderError> {
    let output = clients
        .appsync
        .get_api_association()
        .domain_name(domain_name)
        .send()
        .await
        .map_err(|e| sdk_error(&format!("reading AppSync Domain Name API Association ({domain_name})"), e))
        .optional()?;
    Ok(output.and_then(|o| o.api_association))
}

async fn associate(clients: &AwsClients, domain_name: &str, api_id: &str) -> Result<(), ProviderError> {
    debug!(domain_name, api_id, "associating AppSync API with domain");
    clients
        .appsync
        .associate_api()
        .domain_name(domain_name)
        .api_id(api_id)
        .send()
        .await
        .map_err(|e| sdk_error(&format!("associating AppSync API ({api_id}) with domain ({domain_name})"), e))?;

    let wait = StatusWait::new(&["PROCESSING"], &["SUCCESS"], TIMEOUT).with_delay(Duration::from_secs(2));
    wait_for_status("AppSync Domain Name API Association", &wait, || async move {
        let Some(association) = get_association(clients, domain_name).await? else {
            return Ok(None);
        };
        let status = association
            .association_status()
            .map(|s| s.as_str().to_owned())
            .unwrap_or_default();
        if status == "FAILED" {
            return Err(ProviderError::FailedPrecondition(format!(
                "associating AppSync API with domain ({domain_name}) failed: {}",
                association.deployment_detail().unwrap_or_default()
            )));
        }
        Ok(Some(((), status)))
    })
    .await?;
    info!(domain_name, api_id, "AppSync API associated with domain");
    Ok(())
}

#[async_trait]
impl Resource for DomainNameApiAssociation {
    fn type_name(&self) -> &'static str {
        "aws_appsync_domain_name_api_association"
    }

    fn schema(&self) -> Schema {
        Schema::resource()
            .with_attribute("domain_name", Attribute::required_string().with_force_new())
            .with_attribute("api_id", Attribute::required_string())
    }

    async fn create(&self, clients: &AwsClients, planned: State) -> Result<State, ProviderError> {
        let domain_name = planned.required_str("domain_name")?.to_owned();
        associate(clients, &domain_name, planned.required_str("api_id")?).await?;

        let state = planned.with("id", domain_name.as_str());
        read_back(
            &format!("AppSync Domain Name API Association ({domain_name})"),
            self.read(clients, state).await?,
        )
    }

    async fn read(&self, clients: &AwsClients, current: State) -> Result<Option<State>, ProviderError> {
        let id = current.id()?.to_owned();
        let Some(association) = get_association(clients, &id).await? else {
            debug!(id, "AppSync Domain Name API Association not found, removing from state");
            return Ok(None);
        };
        // A domain with no API attached reports an association without an API ID.
        let Some(api_id) = association.api_id() else {
            return Ok(None);
        };

        Ok(Some(
            current
                .with("domain_name", association.domain_name())
                .with("api_id", api_id),
        ))
    }

    async fn update(&self, clients: &AwsClients, prior: State, planned: State) -> Result<State, ProviderError> {
        let id = prior.id()?.to_owned();
        associate(clients, &id, planned.required_str("api_id")?).await?;

        let state = planned.with("id", id.as_str());
        read_back(&format!("AppSync Domain Name API Association ({id})"), self.read(clients, state).await?)
    }

    async fn delete(&self, clients: &AwsClients, current: State) -> Result<(), ProviderError> {
        let id = current.id()?;
        debug!(id, "disassociating AppSync API from domain");

        let gone = clients
            .appsync
            .disassociate_api()
            .domain_name(id)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("deleting AppSync Domain Name API Association ({id})"), e))
            .optional()?
            .is_none();
        if gone {
            return Ok(());
        }

        let wait = StatusWait::gone(&["PROCESSING"], TIMEOUT);
        wait_for_status("AppSync Domain Name API Association", &wait, || async move {
            Ok(get_association(clients, id).await?.and_then(|association| {
                association.api_id()?;
                let status = association.association_status()?.as_str().to_owned();
                Some(((), status))
            }))
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::plan;
    use serde_json::json;

    #[test]
    fn test_api_change_updates_in_place() {
        let schema = DomainNameApiAssociation.schema();
        let prior = json!({"id": "api.example.com", "domain_name": "api.example.com", "api_id": "a"});
        let proposed = json!({"domain_name": "api.example.com", "api_id": "b"});

        let result = plan(&schema, &prior, &proposed).unwrap();
        assert!(!result.requires_replace);
        assert_eq!(result.planned_state["id"], json!("api.example.com"));
    }

    #[test]
    fn test_domain_change_replaces() {
        let schema = DomainNameApiAssociation.schema();
        let prior = json!({"id": "a.example.com", "domain_name": "a.example.com", "api_id": "a"});
        let proposed = json!({"domain_name": "b.example.com", "api_id": "a"});

        assert!(plan(&schema, &prior, &proposed).unwrap().requires_replace);
    }
}
