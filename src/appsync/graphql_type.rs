//! `aws_appsync_type`: one type of a GraphQL API's schema.

use async_trait::async_trait;
use aws_sdk_appsync::types::TypeDefinitionFormat;
use tracing::{debug, info};

use super::with_schema_lock;
use crate::config::AwsClients;
use crate::error::{sdk_error, NotFoundExt, ProviderError};
use crate::id::IdFormat;
use crate::resource::{read_back, Resource};
use crate::schema::{Attribute, Schema};
use crate::state::State;

const ID: IdFormat = IdFormat::new(":", &["api-id", "format", "type-name"]);

/// A GraphQL type managed outside the API's SDL schema.
pub struct GraphqlType;

#[async_trait]
impl Resource for GraphqlType {
    fn type_name(&self) -> &'static str {
        "aws_appsync_type"
    }

    fn schema(&self) -> Schema {
        Schema::resource()
            .with_attribute("api_id", Attribute::required_string().with_force_new())
            .with_attribute(
                "format",
                Attribute::required_string().one_of(&["SDL", "JSON"]).with_force_new(),
            )
            .with_attribute("definition", Attribute::required_string())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("arn", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string())
    }

    async fn create(&self, clients: &AwsClients, planned: State) -> Result<State, ProviderError> {
        let api_id = planned.required_str("api_id")?;
        let format = planned.required_str("format")?;
        let definition = planned.required_str("definition")?;
        debug!(api_id, format, "creating AppSync Type");

        let output = with_schema_lock(clients, api_id, "creating AppSync Type", || async move {
            clients
                .appsync
                .create_type()
                .api_id(api_id)
                .format(TypeDefinitionFormat::from(format))
                .definition(definition)
                .send()
                .await
                .map_err(|e| sdk_error(&format!("creating AppSync Type ({api_id})"), e))
        })
        .await?;

        let name = output
            .r#type()
            .and_then(|t| t.name())
            .ok_or_else(|| ProviderError::empty_response("creating AppSync Type"))?;
        let id = ID.encode(&[api_id, format, name]);
        info!(id, "created AppSync Type");

        let state = planned.with("id", id.as_str());
        read_back(&format!("AppSync Type ({id})"), self.read(clients, state).await?)
    }

    async fn read(&self, clients: &AwsClients, current: State) -> Result<Option<State>, ProviderError> {
        let id = current.id()?.to_owned();
        let (api_id, format, name) = ID.decode_triple(&id)?;

        let output = clients
            .appsync
            .get_type()
            .api_id(api_id)
            .format(TypeDefinitionFormat::from(format))
            .type_name(name)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("reading AppSync Type ({id})"), e))
            .optional()?;
        let Some(found) = output.and_then(|o| o.r#type) else {
            debug!(id, "AppSync Type not found, removing from state");
            return Ok(None);
        };

        let mut state = current
            .with("api_id", api_id)
            .with("name", found.name())
            .with("arn", found.arn())
            .with("description", found.description())
            .with("definition", found.definition());
        state.set_enum("format", found.format());
        Ok(Some(state))
    }

    async fn update(&self, clients: &AwsClients, prior: State, planned: State) -> Result<State, ProviderError> {
        let id = prior.id()?.to_owned();
        let (api_id, format, name) = ID.decode_triple(&id)?;
        let definition = planned.required_str("definition")?;
        let what = &format!("updating AppSync Type ({id})");

        with_schema_lock(clients, api_id, "updating AppSync Type", || async move {
            clients
                .appsync
                .update_type()
                .api_id(api_id)
                .type_name(name)
                .format(TypeDefinitionFormat::from(format))
                .definition(definition)
                .send()
                .await
                .map_err(|e| sdk_error(what, e))
        })
        .await?;

        let state = planned.with("id", id.as_str());
        read_back(&format!("AppSync Type ({id})"), self.read(clients, state).await?)
    }

    async fn delete(&self, clients: &AwsClients, current: State) -> Result<(), ProviderError> {
        let id = current.id()?;
        let (api_id, _, name) = ID.decode_triple(id)?;
        debug!(id, "deleting AppSync Type");

        with_schema_lock(clients, api_id, "deleting AppSync Type", || async move {
            clients
                .appsync
                .delete_type()
                .api_id(api_id)
                .type_name(name)
                .send()
                .await
                .map_err(|e| sdk_error(&format!("deleting AppSync Type ({id})"), e))
                .optional()
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

    #[test]
    fn test_id() {
        assert_eq!(ID.encode(&["abc", "SDL", "Mutation"]), "abc:SDL:Mutation");
        assert_eq!(ID.decode_triple("abc:SDL:Mutation").unwrap(), ("abc", "SDL", "Mutation"));
        assert!(ID.decode_triple("abc:SDL").is_err());
        assert!(ID.decode_triple("abc::Mutation").is_err());
    }

    #[test]
    fn test_format_validation() {
        let schema = GraphqlType.schema();
        let definition = "type Mutation { putPost(id: ID!): Post }";

        assert!(validate(&schema, &json!({"api_id": "a", "format": "SDL", "definition": definition})).is_empty());
        assert!(!validate(&schema, &json!({"api_id": "a", "format": "YAML", "definition": definition})).is_empty());
    }
}
