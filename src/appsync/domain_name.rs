//! `aws_appsync_domain_name`: a custom domain for AppSync APIs.

use async_trait::async_trait;
use tracing::debug;

use crate::config::AwsClients;
use crate::error::{sdk_error, NotFoundExt, ProviderError};
use crate::resource::{read_back, Resource};
use crate::schema::{Attribute, Schema};
use crate::state::State;

/// A custom domain name.
pub struct DomainName;

#[async_trait]
impl Resource for DomainName {
    fn type_name(&self) -> &'static str {
        "aws_appsync_domain_name"
    }

    fn schema(&self) -> Schema {
        Schema::resource()
            .with_attribute("domain_name", Attribute::required_string().with_force_new())
            .with_attribute("certificate_arn", Attribute::required_string().with_force_new())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("appsync_domain_name", Attribute::computed_string())
            .with_attribute("hosted_zone_id", Attribute::computed_string())
    }

    async fn create(&self, clients: &AwsClients, planned: State) -> Result<State, ProviderError> {
        let domain_name = planned.required_str("domain_name")?.to_owned();
        debug!(domain_name, "creating AppSync Domain Name");

        clients
            .appsync
            .create_domain_name()
            .domain_name(&domain_name)
            .certificate_arn(planned.required_str("certificate_arn")?)
            .set_description(planned.string("description"))
            .send()
            .await
            .map_err(|e| sdk_error(&format!("creating AppSync Domain Name ({domain_name})"), e))?;

        let state = planned.with("id", domain_name.as_str());
        read_back(&format!("AppSync Domain Name ({domain_name})"), self.read(clients, state).await?)
    }

    async fn read(&self, clients: &AwsClients, current: State) -> Result<Option<State>, ProviderError> {
        let id = current.id()?.to_owned();
        let output = clients
            .appsync
            .get_domain_name()
            .domain_name(&id)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("reading AppSync Domain Name ({id})"), e))
            .optional()?;
        let Some(config) = output.and_then(|o| o.domain_name_config) else {
            debug!(id, "AppSync Domain Name not found, removing from state");
            return Ok(None);
        };

        Ok(Some(
            current
                .with("domain_name", config.domain_name())
                .with("certificate_arn", config.certificate_arn())
                .with("description", config.description())
                .with("appsync_domain_name", config.appsync_domain_name())
                .with("hosted_zone_id", config.hosted_zone_id()),
        ))
    }

    async fn update(&self, clients: &AwsClients, prior: State, planned: State) -> Result<State, ProviderError> {
        let id = prior.id()?.to_owned();

        if planned.changed(&prior, "description") {
            clients
                .appsync
                .update_domain_name()
                .domain_name(&id)
                .set_description(planned.string("description"))
                .send()
                .await
                .map_err(|e| sdk_error(&format!("updating AppSync Domain Name ({id})"), e))?;
        }

        let state = planned.with("id", id.as_str());
        read_back(&format!("AppSync Domain Name ({id})"), self.read(clients, state).await?)
    }

    async fn delete(&self, clients: &AwsClients, current: State) -> Result<(), ProviderError> {
        let id = current.id()?;
        debug!(id, "deleting AppSync Domain Name");
        clients
            .appsync
            .delete_domain_name()
            .domain_name(id)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("deleting AppSync Domain Name ({id})"), e))
            .optional()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;
    use serde_json::json;

    #[test]
    fn test_schema() {
        let schema = DomainName.schema();

        assert!(schema.block.attributes["domain_name"].force_new);
        assert!(schema.block.attributes["hosted_zone_id"].flags.is_computed_only());
        assert!(!validate(&schema, &json!({"domain_name": "api.example.com"})).is_empty());
        assert!(validate(
            &schema,
            &json!({"domain_name": "api.example.com", "certificate_arn": "arn:aws:acm:us-east-1:1:certificate/x"})
        )
        .is_empty());
    }
}
