//! AWS Rekognition resources: face collections, custom-label and moderation projects,
//! and video stream processors.

use std::collections::HashMap;

use crate::config::AwsClients;
use crate::error::{sdk_error, ProviderError};
use crate::state::State;
use crate::tags::TagDiff;

pub mod collection;
pub mod project;
pub mod stream_processor;

/// Tags currently set on `arn`.
pub async fn list_tags(clients: &AwsClients, arn: &str) -> Result<HashMap<String, String>, ProviderError> {
    let output = clients
        .rekognition
        .list_tags_for_resource()
        .resource_arn(arn)
        .send()
        .await
        .map_err(|e| sdk_error(&format!("listing tags for Rekognition resource ({arn})"), e))?;
    Ok(output.tags.unwrap_or_default())
}

/// Reconcile the tags of `arn` from `prior` to `planned`.
pub async fn update_tags(
    clients: &AwsClients,
    arn: &str,
    prior: &State,
    planned: &State,
) -> Result<(), ProviderError> {
    let diff = TagDiff::new(&prior.string_map("tags"), &planned.string_map("tags"));
    if !diff.remove.is_empty() {
        clients
            .rekognition
            .untag_resource()
            .resource_arn(arn)
            .set_tag_keys(Some(diff.remove))
            .send()
            .await
            .map_err(|e| sdk_error(&format!("untagging Rekognition resource ({arn})"), e))?;
    }
    if !diff.upsert.is_empty() {
        clients
            .rekognition
            .tag_resource()
            .resource_arn(arn)
            .set_tags(Some(diff.upsert))
            .send()
            .await
            .map_err(|e| sdk_error(&format!("tagging Rekognition resource ({arn})"), e))?;
    }
    Ok(())
}
