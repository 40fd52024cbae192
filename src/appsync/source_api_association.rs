//! `aws_appsync_source_api_association`: merges a source API into a merged API.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_appsync::types::{MergeType, SourceApiAssociationConfig};
use tracing::{debug, info};

use crate::config::AwsClients;
use crate::error::{sdk_error, NotFoundExt, ProviderError};
use crate::id::IdFormat;
use crate::resource::{read_back, Resource};
use crate::retry::{wait_for_status, StatusWait};
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::state::State;

const ID: IdFormat = IdFormat::new(",", &["merged-api-id", "association-id"]);

const TIMEOUT: Duration = Duration::from_secs(5 * 60);

const MERGE_PENDING: &[&str] = &["MERGE_SCHEDULED", "MERGE_IN_PROGRESS"];
const MERGE_TARGET: &[&str] = &["MERGE_SUCCESS"];
const MERGE_FAILED: &[&str] = &["MERGE_FAILED", "AUTO_MERGE_SCHEDULE_FAILED"];
const DELETE_PENDING: &[&str] = &["DELETION_SCHEDULED", "DELETION_IN_PROGRESS"];

/// Association of a source GraphQL API with a merged API.
pub struct SourceApiAssociation;

/// One of `id_key`/`arn_key`, whichever is configured.
fn identifier<'a>(state: &'a State, id_key: &str, arn_key: &str) -> Result<&'a str, ProviderError> {
    state.str(id_key).or_else(|| state.str(arn_key)).ok_or_else(|| {
        ProviderError::Validation(format!("one of '{id_key}' or '{arn_key}' is required"))
    })
}

fn exactly_one(config: &State, id_key: &str, arn_key: &str) -> Option<Diagnostic> {
    match (config.str(id_key).is_some(), config.str(arn_key).is_some()) {
        (true, false) | (false, true) => None,
        (true, true) => Some(
            Diagnostic::error(format!("Conflicting attributes '{id_key}' and '{arn_key}'"))
                .with_detail(format!("Only one of '{id_key}' or '{arn_key}' may be set."))
                .with_attribute(id_key),
        ),
        (false, false) => Some(
            Diagnostic::error(format!("Missing '{id_key}' or '{arn_key}'"))
                .with_detail(format!("Exactly one of '{id_key}' or '{arn_key}' must be set."))
                .with_attribute(id_key),
        ),
    }
}

fn expand_config(planned: &State) -> Option<SourceApiAssociationConfig> {
    planned.block("source_api_association_config").map(|block| {
        SourceApiAssociationConfig::builder()
            .set_merge_type(block.enum_value::<MergeType>("merge_type"))
            .build()
    })
}

async fn get_association(
    clients: &AwsClients,
    merged_api_id: &str,
    association_id: &str,
) -> Result<Option<aws_sdk_appsync::types::SourceApiAssociation>, ProviderError> {
    let output = clients
        .appsync
        .get_source_api_association()
        .merged_api_identifier(merged_api_id)
        .association_id(association_id)
        .send()
        .await
        .map_err(|e| {
            sdk_error(
                &format!("reading AppSync Source API Association ({merged_api_id},{association_id})"),
                e,
            )
        })
        .optional()?;
    Ok(output.and_then(|o| o.source_api_association))
}

fn status_of(association: &aws_sdk_appsync::types::SourceApiAssociation) -> String {
    association
        .source_api_association_status()
        .map(|s| s.as_str().to_owned())
        .unwrap_or_default()
}

async fn wait_merged(clients: &AwsClients, merged_api_id: &str, association_id: &str) -> Result<(), ProviderError> {
    let wait = StatusWait::new(MERGE_PENDING, MERGE_TARGET, TIMEOUT);
    wait_for_status("AppSync Source API Association", &wait, || async move {
        let Some(association) = get_association(clients, merged_api_id, association_id).await? else {
            return Ok(None);
        };
        let status = status_of(&association);
        if MERGE_FAILED.contains(&status.as_str()) {
            return Err(ProviderError::FailedPrecondition(format!(
                "AppSync Source API Association ({merged_api_id},{association_id}) {status}: {}",
                association.source_api_association_status_detail().unwrap_or_default()
            )));
        }
        Ok(Some(((), status)))
    })
    .await?;
    info!(merged_api_id, association_id, "AppSync Source API Association merged");
    Ok(())
}

#[async_trait]
impl Resource for SourceApiAssociation {
    fn type_name(&self) -> &'static str {
        "aws_appsync_source_api_association"
    }

    fn schema(&self) -> Schema {
        Schema::resource()
            .with_attribute("merged_api_id", Attribute::optional_computed_string().with_force_new())
            .with_attribute("merged_api_arn", Attribute::optional_computed_string().with_force_new())
            .with_attribute("source_api_id", Attribute::optional_computed_string().with_force_new())
            .with_attribute("source_api_arn", Attribute::optional_computed_string().with_force_new())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("association_id", Attribute::computed_string())
            .with_attribute("arn", Attribute::computed_string())
            .with_block(
                "source_api_association_config",
                NestedBlock::single(Block::new().with_attribute(
                    "merge_type",
                    Attribute::optional_computed_string().one_of(&["AUTO_MERGE", "MANUAL_MERGE"]),
                )),
            )
    }

    fn validate(&self, config: &State) -> Vec<Diagnostic> {
        [
            exactly_one(config, "merged_api_id", "merged_api_arn"),
            exactly_one(config, "source_api_id", "source_api_arn"),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    async fn create(&self, clients: &AwsClients, planned: State) -> Result<State, ProviderError> {
        let merged = identifier(&planned, "merged_api_id", "merged_api_arn")?;
        let source = identifier(&planned, "source_api_id", "source_api_arn")?;
        debug!(merged, source, "creating AppSync Source API Association");

        let output = clients
            .appsync
            .associate_source_graphql_api()
            .merged_api_identifier(merged)
            .source_api_identifier(source)
            .set_description(planned.string("description"))
            .set_source_api_association_config(expand_config(&planned))
            .send()
            .await
            .map_err(|e| sdk_error(&format!("creating AppSync Source API Association ({merged})"), e))?;

        let association = output
            .source_api_association()
            .ok_or_else(|| ProviderError::empty_response("creating AppSync Source API Association"))?;
        let (Some(merged_api_id), Some(association_id)) = (association.merged_api_id(), association.association_id())
        else {
            return Err(ProviderError::empty_response("creating AppSync Source API Association"));
        };
        let id = ID.encode(&[merged_api_id, association_id]);
        info!(id, "created AppSync Source API Association");

        wait_merged(clients, merged_api_id, association_id).await?;

        let state = planned.with("id", id.as_str());
        read_back(&format!("AppSync Source API Association ({id})"), self.read(clients, state).await?)
    }

    async fn read(&self, clients: &AwsClients, current: State) -> Result<Option<State>, ProviderError> {
        let id = current.id()?.to_owned();
        let (merged_api_id, association_id) = ID.decode_pair(&id)?;

        let Some(association) = get_association(clients, merged_api_id, association_id).await? else {
            debug!(id, "AppSync Source API Association not found, removing from state");
            return Ok(None);
        };

        let mut state = current
            .with("association_id", association.association_id())
            .with("arn", association.association_arn())
            .with("description", association.description())
            .with("merged_api_id", association.merged_api_id())
            .with("merged_api_arn", association.merged_api_arn())
            .with("source_api_id", association.source_api_id())
            .with("source_api_arn", association.source_api_arn());
        state.set_block(
            "source_api_association_config",
            association.source_api_association_config().map(|config| {
                let mut block = State::new();
                block.set_enum("merge_type", config.merge_type());
                block
            }),
        );
        Ok(Some(state))
    }

    async fn update(&self, clients: &AwsClients, prior: State, planned: State) -> Result<State, ProviderError> {
        let id = prior.id()?.to_owned();
        let (merged_api_id, association_id) = ID.decode_pair(&id)?;

        if planned.any_changed(&prior, &["description", "source_api_association_config"]) {
            clients
                .appsync
                .update_source_api_association()
                .merged_api_identifier(merged_api_id)
                .association_id(association_id)
                .set_description(planned.string("description"))
                .set_source_api_association_config(expand_config(&planned))
                .send()
                .await
                .map_err(|e| sdk_error(&format!("updating AppSync Source API Association ({id})"), e))?;

            wait_merged(clients, merged_api_id, association_id).await?;
        }

        let state = planned.with("id", id.as_str());
        read_back(&format!("AppSync Source API Association ({id})"), self.read(clients, state).await?)
    }

    async fn delete(&self, clients: &AwsClients, current: State) -> Result<(), ProviderError> {
        let id = current.id()?;
        let (merged_api_id, association_id) = ID.decode_pair(id)?;
        debug!(id, "deleting AppSync Source API Association");

        let gone = clients
            .appsync
            .disassociate_source_graphql_api()
            .merged_api_identifier(merged_api_id)
            .association_id(association_id)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("deleting AppSync Source API Association ({id})"), e))
            .optional()?
            .is_none();
        if gone {
            return Ok(());
        }

        let wait = StatusWait::gone(DELETE_PENDING, TIMEOUT);
        wait_for_status("AppSync Source API Association", &wait, || async move {
            Ok(get_association(clients, merged_api_id, association_id)
                .await?
                .map(|association| ((), status_of(&association))))
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::service_error_meta;
    use aws_sdk_appsync::operation::associate_source_graphql_api::AssociateSourceGraphqlApiOutput;
    use aws_sdk_appsync::operation::disassociate_source_graphql_api::DisassociateSourceGraphqlApiError;
    use aws_sdk_appsync::operation::get_source_api_association::{
        GetSourceApiAssociationError, GetSourceApiAssociationOutput,
    };
    use aws_sdk_appsync::types::error::NotFoundException;
    use aws_sdk_appsync::types::SourceApiAssociationStatus;
    use aws_smithy_mocks::{mock, mock_client, RuleMode};
    use serde_json::json;

    fn not_found() -> NotFoundException {
        NotFoundException::builder()
            .message("Source API association not found.")
            .meta(service_error_meta("NotFoundException"))
            .build()
    }

    fn association(status: SourceApiAssociationStatus) -> aws_sdk_appsync::types::SourceApiAssociation {
        aws_sdk_appsync::types::SourceApiAssociation::builder()
            .association_id("assoc")
            .association_arn("arn:aws:appsync:us-east-1:123456789012:sourceApiAssociations/assoc")
            .merged_api_id("merged")
            .merged_api_arn("arn:aws:appsync:us-east-1:123456789012:apis/merged")
            .source_api_id("source")
            .source_api_arn("arn:aws:appsync:us-east-1:123456789012:apis/source")
            .source_api_association_config(
                SourceApiAssociationConfig::builder().merge_type(MergeType::AutoMerge).build(),
            )
            .source_api_association_status(status)
            .build()
    }

    fn state(value: serde_json::Value) -> State {
        State::from_value(value).unwrap()
    }

    #[test]
    fn test_id() {
        assert_eq!(ID.encode(&["merged", "assoc"]), "merged,assoc");
        assert_eq!(ID.decode_pair("merged,assoc").unwrap(), ("merged", "assoc"));
        assert!(ID.decode_pair("merged-assoc").is_err());
    }

    #[test]
    fn test_validate_requires_one_of_each_pair() {
        let ok = state(json!({"merged_api_id": "m", "source_api_arn": "arn:aws:appsync:s"}));
        assert!(SourceApiAssociation.validate(&ok).is_empty());

        let neither = state(json!({"source_api_id": "s"}));
        let diagnostics = SourceApiAssociation.validate(&neither);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("merged_api_id"));

        let both = state(json!({
            "merged_api_id": "m",
            "merged_api_arn": "arn:aws:appsync:m",
            "source_api_id": "s",
            "source_api_arn": "arn:aws:appsync:s",
        }));
        assert_eq!(SourceApiAssociation.validate(&both).len(), 2);
    }

    #[test]
    fn test_identifier_prefers_id() {
        let planned = state(json!({"merged_api_arn": "arn:aws:appsync:m"}));
        assert_eq!(identifier(&planned, "merged_api_id", "merged_api_arn").unwrap(), "arn:aws:appsync:m");
        assert!(identifier(&planned, "source_api_id", "source_api_arn").is_err());
    }

    #[test]
    fn test_expand_config() {
        let planned = state(json!({"source_api_association_config": {"merge_type": "AUTO_MERGE"}}));
        let config = expand_config(&planned).unwrap();
        assert_eq!(config.merge_type(), Some(&MergeType::AutoMerge));

        assert!(expand_config(&State::new()).is_none());
    }

    #[tokio::test]
    async fn test_read_rejects_malformed_id() {
        let clients = AwsClients::offline("us-east-1");
        let err = SourceApiAssociation
            .read(&clients, State::new().with("id", "no-separator"))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_read_missing_association_is_none() {
        let get = mock!(aws_sdk_appsync::Client::get_source_api_association)
            .match_requests(|req| req.merged_api_identifier() == Some("merged") && req.association_id() == Some("assoc"))
            .then_error(|| GetSourceApiAssociationError::NotFoundException(not_found()));
        let clients = AwsClients::with_appsync(mock_client!(aws_sdk_appsync, RuleMode::MatchAny, [&get]));

        let state = SourceApiAssociation
            .read(&clients, State::new().with("id", "merged,assoc"))
            .await
            .unwrap();
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_association_succeeds() {
        let disassociate = mock!(aws_sdk_appsync::Client::disassociate_source_graphql_api)
            .then_error(|| DisassociateSourceGraphqlApiError::NotFoundException(not_found()));
        let clients = AwsClients::with_appsync(mock_client!(aws_sdk_appsync, RuleMode::MatchAny, [&disassociate]));

        SourceApiAssociation
            .delete(&clients, State::new().with("id", "merged,assoc"))
            .await
            .unwrap();
        assert_eq!(disassociate.num_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_waits_for_merge() {
        let associate = mock!(aws_sdk_appsync::Client::associate_source_graphql_api).then_output(|| {
            AssociateSourceGraphqlApiOutput::builder()
                .source_api_association(association(SourceApiAssociationStatus::MergeScheduled))
                .build()
        });
        let get = mock!(aws_sdk_appsync::Client::get_source_api_association)
            .sequence()
            .output(|| {
                GetSourceApiAssociationOutput::builder()
                    .source_api_association(association(SourceApiAssociationStatus::MergeInProgress))
                    .build()
            })
            .output(|| {
                GetSourceApiAssociationOutput::builder()
                    .source_api_association(association(SourceApiAssociationStatus::MergeSuccess))
                    .build()
            })
            .times(2)
            .build();
        let clients =
            AwsClients::with_appsync(mock_client!(aws_sdk_appsync, RuleMode::MatchAny, [&associate, &get]));

        let planned = state(json!({
            "merged_api_id": "merged",
            "source_api_arn": "arn:aws:appsync:us-east-1:123456789012:apis/source",
        }));
        let created = SourceApiAssociation.create(&clients, planned).await.unwrap();

        assert_eq!(created.str("id"), Some("merged,assoc"));
        assert_eq!(created.str("source_api_id"), Some("source"));
        assert_eq!(created.block("source_api_association_config").unwrap().str("merge_type"), Some("AUTO_MERGE"));
        assert_eq!(get.num_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_merge_is_reported() {
        let associate = mock!(aws_sdk_appsync::Client::associate_source_graphql_api).then_output(|| {
            AssociateSourceGraphqlApiOutput::builder()
                .source_api_association(association(SourceApiAssociationStatus::MergeScheduled))
                .build()
        });
        let get = mock!(aws_sdk_appsync::Client::get_source_api_association).then_output(|| {
            GetSourceApiAssociationOutput::builder()
                .source_api_association(association(SourceApiAssociationStatus::MergeFailed))
                .build()
        });
        let clients =
            AwsClients::with_appsync(mock_client!(aws_sdk_appsync, RuleMode::MatchAny, [&associate, &get]));

        let planned = state(json!({"merged_api_id": "merged", "source_api_id": "source"}));
        let err = SourceApiAssociation.create(&clients, planned).await.unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)), "{err}");
    }
}
