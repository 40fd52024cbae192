//! `aws_rekognition_collection`: a face collection.

use async_trait::async_trait;
use tracing::{debug, info};

use super::{list_tags, update_tags};
use crate::config::AwsClients;
use crate::error::{sdk_error, NotFoundExt, ProviderError};
use crate::resource::{read_back, Resource};
use crate::schema::{Attribute, Schema, Validator};
use crate::state::State;
use crate::tags::tags_from;

/// A collection of indexed faces. The ID is the collection ID.
pub struct Collection;

#[async_trait]
impl Resource for Collection {
    fn type_name(&self) -> &'static str {
        "aws_rekognition_collection"
    }

    fn schema(&self) -> Schema {
        Schema::resource()
            .with_attribute(
                "collection_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_validator(Validator::length(1, 255))
                    .with_validator(Validator::pattern(
                        r"^[a-zA-Z0-9_.\-]+$",
                        "must contain only letters, digits, '_', '.' and '-'",
                    )),
            )
            .with_attribute("arn", Attribute::computed_string())
            .with_attribute("face_model_version", Attribute::computed_string())
            .with_tags()
    }

    async fn create(&self, clients: &AwsClients, planned: State) -> Result<State, ProviderError> {
        let collection_id = planned.required_str("collection_id")?;
        debug!(collection_id, "creating Rekognition Collection");

        clients
            .rekognition
            .create_collection()
            .collection_id(collection_id)
            .set_tags(tags_from(&planned))
            .send()
            .await
            .map_err(|e| sdk_error(&format!("creating Rekognition Collection ({collection_id})"), e))?;
        info!(collection_id, "created Rekognition Collection");

        let id = collection_id.to_owned();
        let state = planned.with("id", id.as_str());
        read_back(&format!("Rekognition Collection ({id})"), self.read(clients, state).await?)
    }

    async fn read(&self, clients: &AwsClients, current: State) -> Result<Option<State>, ProviderError> {
        let id = current.id()?.to_owned();
        let output = clients
            .rekognition
            .describe_collection()
            .collection_id(&id)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("reading Rekognition Collection ({id})"), e))
            .optional()?;
        let Some(collection) = output else {
            debug!(id, "Rekognition Collection not found, removing from state");
            return Ok(None);
        };

        let mut state = current
            .with("collection_id", id.as_str())
            .with("arn", collection.collection_arn())
            .with("face_model_version", collection.face_model_version());
        if let Some(arn) = collection.collection_arn() {
            state.set_string_map("tags", Some(&list_tags(clients, arn).await?));
        }
        Ok(Some(state))
    }

    async fn update(&self, clients: &AwsClients, prior: State, planned: State) -> Result<State, ProviderError> {
        let id = prior.id()?.to_owned();

        if planned.changed(&prior, "tags") {
            let arn = prior.required_str("arn")?;
            update_tags(clients, arn, &prior, &planned).await?;
        }

        let state = planned.with("id", id.as_str());
        read_back(&format!("Rekognition Collection ({id})"), self.read(clients, state).await?)
    }

    async fn delete(&self, clients: &AwsClients, current: State) -> Result<(), ProviderError> {
        let id = current.id()?;
        debug!(id, "deleting Rekognition Collection");

        clients
            .rekognition
            .delete_collection()
            .collection_id(id)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("deleting Rekognition Collection ({id})"), e))
            .optional()?;
        Ok(())
    }
}
