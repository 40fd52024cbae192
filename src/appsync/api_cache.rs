//! `aws_appsync_api_cache`: the server-side cache of a GraphQL API.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_appsync::types::{ApiCacheType, ApiCachingBehavior};
use tracing::{debug, info};

use crate::config::AwsClients;
use crate::error::{sdk_error, NotFoundExt, ProviderError};
use crate::resource::{read_back, Resource};
use crate::retry::{wait_for_status, StatusWait};
use crate::schema::{Attribute, Schema, Validator};
use crate::state::State;

const TIMEOUT: Duration = Duration::from_secs(60 * 60);

const CACHE_TYPES: &[&str] = &[
    "SMALL",
    "MEDIUM",
    "LARGE",
    "XLARGE",
    "LARGE_2X",
    "LARGE_4X",
    "LARGE_8X",
    "LARGE_12X",
    "T2_SMALL",
    "T2_MEDIUM",
    "R4_LARGE",
    "R4_XLARGE",
    "R4_2XLARGE",
    "R4_4XLARGE",
    "R4_8XLARGE",
];

/// The cache of one API. The ID is the API ID.
pub struct ApiCache;

async fn get_cache(
    clients: &AwsClients,
    api_id: &str,
) -> Result<Option<aws_sdk_appsync::types::ApiCache>, ProviderError> {
    let output = clients
        .appsync
        .get_api_cache()
        .api_id(api_id)
        .send()
        .await
        .map_err(|e| sdk_error(&format!("reading AppSync API Cache ({api_id})"), e))
        .optional()?;
    Ok(output.and_then(|o| o.api_cache))
}

fn status_of(cache: &aws_sdk_appsync::types::ApiCache) -> String {
    cache.status().map(|s| s.as_str().to_owned()).unwrap_or_default()
}

async fn wait_available(clients: &AwsClients, api_id: &str) -> Result<(), ProviderError> {
    let wait = StatusWait::new(&["CREATING", "MODIFYING"], &["AVAILABLE"], TIMEOUT);
    wait_for_status("AppSync API Cache", &wait, || async move {
        Ok(get_cache(clients, api_id).await?.map(|cache| {
            let status = status_of(&cache);
            (cache, status)
        }))
    })
    .await?;
    info!(api_id, "AppSync API Cache available");
    Ok(())
}

#[async_trait]
impl Resource for ApiCache {
    fn type_name(&self) -> &'static str {
        "aws_appsync_api_cache"
    }

    fn schema(&self) -> Schema {
        Schema::resource()
            .with_attribute("api_id", Attribute::required_string().with_force_new())
            .with_attribute(
                "api_caching_behavior",
                Attribute::required_string().one_of(&[
                    "FULL_REQUEST_CACHING",
                    "PER_RESOLVER_CACHING",
                    "OPERATION_LEVEL_CACHING",
                ]),
            )
            .with_attribute("type", Attribute::required_string().one_of(CACHE_TYPES))
            .with_attribute(
                "ttl",
                Attribute::required_int64().with_validator(Validator::int_range(1, 3600)),
            )
            .with_attribute(
                "at_rest_encryption_enabled",
                Attribute::optional_bool().with_default(false).with_force_new(),
            )
            .with_attribute(
                "transit_encryption_enabled",
                Attribute::optional_bool().with_default(false).with_force_new(),
            )
    }

    async fn create(&self, clients: &AwsClients, planned: State) -> Result<State, ProviderError> {
        let api_id = planned.required_str("api_id")?.to_owned();
        let ttl = planned
            .i64("ttl")
            .ok_or_else(|| ProviderError::Validation("attribute 'ttl' is required".to_string()))?;
        debug!(api_id, "creating AppSync API Cache");

        // AppSync encrypts new caches regardless; the flags only matter for older ones.
        #[allow(deprecated)]
        let request = clients
            .appsync
            .create_api_cache()
            .api_id(&api_id)
            .ttl(ttl)
            .set_api_caching_behavior(planned.enum_value::<ApiCachingBehavior>("api_caching_behavior"))
            .set_type(planned.enum_value::<ApiCacheType>("type"))
            .set_at_rest_encryption_enabled(planned.bool("at_rest_encryption_enabled"))
            .set_transit_encryption_enabled(planned.bool("transit_encryption_enabled"));
        request
            .send()
            .await
            .map_err(|e| sdk_error(&format!("creating AppSync API Cache ({api_id})"), e))?;

        wait_available(clients, &api_id).await?;

        let state = planned.with("id", api_id.as_str());
        read_back(&format!("AppSync API Cache ({api_id})"), self.read(clients, state).await?)
    }

    async fn read(&self, clients: &AwsClients, current: State) -> Result<Option<State>, ProviderError> {
        let api_id = current.id()?.to_owned();
        let Some(cache) = get_cache(clients, &api_id).await? else {
            debug!(api_id, "AppSync API Cache not found, removing from state");
            return Ok(None);
        };

        #[allow(deprecated)]
        let mut state = current
            .with("api_id", api_id.as_str())
            .with("ttl", cache.ttl())
            .with("at_rest_encryption_enabled", cache.at_rest_encryption_enabled())
            .with("transit_encryption_enabled", cache.transit_encryption_enabled());
        state.set_enum("api_caching_behavior", cache.api_caching_behavior());
        state.set_enum("type", cache.r#type());
        Ok(Some(state))
    }

    async fn update(&self, clients: &AwsClients, prior: State, planned: State) -> Result<State, ProviderError> {
        let api_id = prior.id()?.to_owned();

        if planned.any_changed(&prior, &["api_caching_behavior", "type", "ttl"]) {
            clients
                .appsync
                .update_api_cache()
                .api_id(&api_id)
                .set_ttl(planned.i64("ttl"))
                .set_api_caching_behavior(planned.enum_value::<ApiCachingBehavior>("api_caching_behavior"))
                .set_type(planned.enum_value::<ApiCacheType>("type"))
                .send()
                .await
                .map_err(|e| sdk_error(&format!("updating AppSync API Cache ({api_id})"), e))?;
            wait_available(clients, &api_id).await?;
        }

        let state = planned.with("id", api_id.as_str());
        read_back(&format!("AppSync API Cache ({api_id})"), self.read(clients, state).await?)
    }

    async fn delete(&self, clients: &AwsClients, current: State) -> Result<(), ProviderError> {
        let api_id = current.id()?;
        debug!(api_id, "deleting AppSync API Cache");

        let deleted = clients
            .appsync
            .delete_api_cache()
            .api_id(api_id)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("deleting AppSync API Cache ({api_id})"), e))
            .optional()?;
        if deleted.is_none() {
            return Ok(());
        }

        let wait = StatusWait::gone(&["DELETING", "AVAILABLE"], TIMEOUT);
        wait_for_status("AppSync API Cache", &wait, || async move {
            Ok(get_cache(clients, api_id).await?.map(|cache| {
                let status = status_of(&cache);
                ((), status)
            }))
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

    fn config() -> serde_json::Value {
        json!({"api_id": "a", "api_caching_behavior": "FULL_REQUEST_CACHING", "type": "SMALL", "ttl": 60})
    }

    #[test]
    fn test_schema_validation() {
        let schema = ApiCache.schema();
        assert!(validate(&schema, &config()).is_empty());

        let mut bad_ttl = config();
        bad_ttl["ttl"] = json!(7200);
        assert!(!validate(&schema, &bad_ttl).is_empty());

        let mut bad_type = config();
        bad_type["type"] = json!("HUGE");
        assert!(!validate(&schema, &bad_type).is_empty());
    }

    #[test]
    fn test_encryption_change_replaces() {
        let schema = ApiCache.schema();
        let mut prior = config();
        prior["id"] = json!("a");
        let mut proposed = config();
        proposed["transit_encryption_enabled"] = json!(true);

        assert!(crate::resource::plan(&schema, &prior, &proposed).unwrap().requires_replace);
    }

    #[test]
    fn test_unset_encryption_flags_match_read_back() {
        let schema = ApiCache.schema();
        let mut prior = config();
        prior["id"] = json!("a");
        prior["at_rest_encryption_enabled"] = json!(false);
        prior["transit_encryption_enabled"] = json!(false);

        let plan = crate::resource::plan(&schema, &prior, &config()).unwrap();
        assert!(!plan.has_changes(), "{:?}", plan.changes);
        assert_eq!(plan.planned_state["transit_encryption_enabled"], json!(false));
    }

    #[test]
    fn test_cache_types_parse() {
        for name in CACHE_TYPES {
            assert!(ApiCacheType::values().contains(name), "{name}");
        }
    }
}
