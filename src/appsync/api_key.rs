//! `aws_appsync_api_key`: an API key for a GraphQL API.

use async_trait::async_trait;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::config::AwsClients;
use crate::error::{sdk_error, NotFoundExt, ProviderError};
use crate::id::IdFormat;
use crate::resource::{read_back, Resource};
use crate::schema::{Attribute, Schema, Validator};
use crate::state::State;

const ID: IdFormat = IdFormat::new(":", &["api-id", "key-id"]);

const DEFAULT_DESCRIPTION: &str = "Managed by Hemmer";

const SECONDS_PER_HOUR: i64 = 60 * 60;

/// An API key. The key value is only known after creation.
pub struct ApiKey;

/// Seconds since the epoch of an RFC 3339 timestamp.
fn parse_expires(value: &str) -> Result<i64, ProviderError> {
    OffsetDateTime::parse(value, &Rfc3339)
        .map(|t| t.unix_timestamp())
        .map_err(|e| ProviderError::Validation(format!("expires {value:?} is not an RFC 3339 timestamp: {e}")))
}

fn format_expires(seconds: i64) -> Result<String, ProviderError> {
    OffsetDateTime::from_unix_timestamp(seconds)
        .map_err(|e| ProviderError::Sdk(format!("API key expiry {seconds} out of range: {e}")))?
        .format(&Rfc3339)
        .map_err(|e| ProviderError::Sdk(format!("formatting API key expiry {seconds}: {e}")))
}

/// Seven days from `now`, rounded down to the hour as AppSync does.
fn default_expiry(now: OffsetDateTime) -> i64 {
    let expires = (now + time::Duration::days(7)).unix_timestamp();
    expires - expires.rem_euclid(SECONDS_PER_HOUR)
}

fn expiry(planned: &State) -> Result<i64, ProviderError> {
    match planned.str("expires") {
        Some(value) => parse_expires(value),
        None => Ok(default_expiry(OffsetDateTime::now_utc())),
    }
}

async fn find_key(
    clients: &AwsClients,
    api_id: &str,
    key_id: &str,
) -> Result<Option<aws_sdk_appsync::types::ApiKey>, ProviderError> {
    let mut next_token = None;
    loop {
        let output = clients
            .appsync
            .list_api_keys()
            .api_id(api_id)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("listing AppSync API Keys ({api_id})"), e))?;

        if let Some(key) = output.api_keys().iter().find(|key| key.id() == Some(key_id)) {
            return Ok(Some(key.clone()));
        }
        match output.next_token() {
            Some(token) if !token.is_empty() => next_token = Some(token.to_owned()),
            _ => return Ok(None),
        }
    }
}

#[async_trait]
impl Resource for ApiKey {
    fn type_name(&self) -> &'static str {
        "aws_appsync_api_key"
    }

    fn schema(&self) -> Schema {
        Schema::resource()
            .with_attribute("api_id", Attribute::required_string().with_force_new())
            .with_attribute(
                "description",
                Attribute::optional_string().with_default(DEFAULT_DESCRIPTION),
            )
            .with_attribute(
                "expires",
                Attribute::optional_computed_string()
                    .with_validator(Validator::Rfc3339)
                    .with_description("RFC 3339 expiry, rounded down to the hour by AppSync"),
            )
            .with_attribute("key", Attribute::computed_string().sensitive())
            .with_attribute("api_key_id", Attribute::computed_string())
    }

    async fn create(&self, clients: &AwsClients, planned: State) -> Result<State, ProviderError> {
        let api_id = planned.required_str("api_id")?.to_owned();
        let expires = expiry(&planned)?;
        debug!(api_id, expires, "creating AppSync API Key");

        let output = clients
            .appsync
            .create_api_key()
            .api_id(&api_id)
            .description(planned.str("description").unwrap_or(DEFAULT_DESCRIPTION))
            .expires(expires)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("creating AppSync API Key ({api_id})"), e))?;

        let key_id = output
            .api_key()
            .and_then(|key| key.id())
            .ok_or_else(|| ProviderError::empty_response("creating AppSync API Key"))?;
        let id = ID.encode(&[api_id.as_str(), key_id]);
        info!(api_id, "created AppSync API Key");

        let state = planned.with("id", id.as_str());
        read_back(&format!("AppSync API Key ({api_id})"), self.read(clients, state).await?)
    }

    async fn read(&self, clients: &AwsClients, current: State) -> Result<Option<State>, ProviderError> {
        let id = current.id()?.to_owned();
        let (api_id, key_id) = ID.decode_pair(&id)?;

        // Keys of a deleted API are gone with it.
        let Some(key) = find_key(clients, api_id, key_id).await.optional()?.flatten() else {
            debug!(api_id, "AppSync API Key not found, removing from state");
            return Ok(None);
        };

        Ok(Some(
            current
                .with("api_id", api_id)
                .with("api_key_id", key_id)
                .with("key", key.id())
                .with("description", key.description())
                .with("expires", format_expires(key.expires())?),
        ))
    }

    async fn update(&self, clients: &AwsClients, prior: State, planned: State) -> Result<State, ProviderError> {
        let id = prior.id()?.to_owned();
        let (api_id, key_id) = ID.decode_pair(&id)?;

        if planned.any_changed(&prior, &["description", "expires"]) {
            clients
                .appsync
                .update_api_key()
                .api_id(api_id)
                .id(key_id)
                .description(planned.str("description").unwrap_or(DEFAULT_DESCRIPTION))
                .expires(expiry(&planned)?)
                .send()
                .await
                .map_err(|e| sdk_error(&format!("updating AppSync API Key ({api_id})"), e))?;
        }

        let state = planned.with("id", id.as_str());
        read_back(&format!("AppSync API Key ({api_id})"), self.read(clients, state).await?)
    }

    async fn delete(&self, clients: &AwsClients, current: State) -> Result<(), ProviderError> {
        let id = current.id()?;
        let (api_id, key_id) = ID.decode_pair(id)?;
        debug!(api_id, "deleting AppSync API Key");

        clients
            .appsync
            .delete_api_key()
            .api_id(api_id)
            .id(key_id)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("deleting AppSync API Key ({api_id})"), e))
            .optional()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;
    use aws_sdk_appsync::operation::create_api_key::CreateApiKeyOutput;
    use aws_sdk_appsync::operation::list_api_keys::ListApiKeysOutput;
    use aws_smithy_mocks::{mock, mock_client, RuleMode};
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn test_id_allows_dashes_in_key() {
        assert_eq!(ID.decode_pair("abc:da2-xyz").unwrap(), ("abc", "da2-xyz"));
    }

    #[test]
    fn test_default_expiry_is_truncated_to_hour() {
        let now = datetime!(2024-03-01 10:42:17 UTC);
        let expected = datetime!(2024-03-08 10:00:00 UTC).unix_timestamp();

        assert_eq!(default_expiry(now), expected);
    }

    #[test]
    fn test_expires_round_trip() {
        let seconds = parse_expires("2030-01-02T03:00:00Z").unwrap();
        assert_eq!(format_expires(seconds).unwrap(), "2030-01-02T03:00:00Z");

        assert!(matches!(parse_expires("next week"), Err(ProviderError::Validation(_))));
    }

    #[test]
    fn test_expires_validation() {
        let schema = ApiKey.schema();

        assert!(validate(&schema, &json!({"api_id": "a", "expires": "2030-01-02T03:00:00Z"})).is_empty());
        assert!(!validate(&schema, &json!({"api_id": "a", "expires": "2030-01-02"})).is_empty());
    }

    #[test]
    fn test_key_is_sensitive() {
        assert!(ApiKey.schema().block.attributes["key"].flags.sensitive);
    }

    fn issued_key() -> aws_sdk_appsync::types::ApiKey {
        aws_sdk_appsync::types::ApiKey::builder()
            .id("da2-abcdefghijklmnopqrstuvwxyz")
            .description(DEFAULT_DESCRIPTION)
            .expires(1_893_456_000)
            .build()
    }

    #[tokio::test]
    async fn test_create_reads_key_back() {
        let create = mock!(aws_sdk_appsync::Client::create_api_key)
            .match_requests(|req| req.api_id() == Some("abc") && req.expires() == Some(1_893_456_000))
            .then_output(|| CreateApiKeyOutput::builder().api_key(issued_key()).build());
        let list = mock!(aws_sdk_appsync::Client::list_api_keys)
            .then_output(|| ListApiKeysOutput::builder().api_keys(issued_key()).build());
        let clients = AwsClients::with_appsync(mock_client!(aws_sdk_appsync, RuleMode::MatchAny, [&create, &list]));

        let planned = State::from_value(json!({"api_id": "abc", "expires": "2030-01-01T00:00:00Z"})).unwrap();
        let state = ApiKey.create(&clients, planned).await.unwrap();

        assert_eq!(state.str("id"), Some("abc:da2-abcdefghijklmnopqrstuvwxyz"));
        assert_eq!(state.str("key"), Some("da2-abcdefghijklmnopqrstuvwxyz"));
        assert_eq!(state.str("expires"), Some("2030-01-01T00:00:00Z"));
        assert_eq!(create.num_calls(), 1);
    }

    #[tokio::test]
    async fn test_read_key_of_deleted_api_is_none() {
        let list = mock!(aws_sdk_appsync::Client::list_api_keys).then_output(|| ListApiKeysOutput::builder().build());
        let clients = AwsClients::with_appsync(mock_client!(aws_sdk_appsync, RuleMode::MatchAny, [&list]));

        let state = ApiKey
            .read(&clients, State::new().with("id", "abc:da2-gone"))
            .await
            .unwrap();
        assert!(state.is_none());
    }
}
