//! `aws_rekognition_stream_processor`: analyzes a Kinesis video stream.
//!
//! A processor either searches faces against a collection (`settings.face_search`)
//! or detects labels for connected-home devices (`settings.connected_home`). Only
//! the connected-home settings, regions of interest, data sharing preference and tags
//! can change in place; clearing an optional setting is sent as a parameter to delete.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_rekognition::operation::describe_stream_processor::DescribeStreamProcessorOutput;
use aws_sdk_rekognition::types::{
    BoundingBox, ConnectedHomeSettings, ConnectedHomeSettingsForUpdate, FaceSearchSettings,
    KinesisDataStream, KinesisVideoStream, Point, RegionOfInterest, S3Destination,
    StreamProcessorDataSharingPreference, StreamProcessorInput, StreamProcessorNotificationChannel,
    StreamProcessorOutput, StreamProcessorParameterToDelete, StreamProcessorSettings,
    StreamProcessorSettingsForUpdate,
};
use tracing::{debug, info, warn};

use super::{list_tags, update_tags};
use crate::config::AwsClients;
use crate::error::{sdk_error, NotFoundExt, ProviderError};
use crate::resource::{read_back, Resource};
use crate::retry::{wait_for_status, StatusWait};
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema, Validator};
use crate::state::State;
use crate::tags::tags_from;

const CREATE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const UPDATE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const DELETE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const PENDING: &[&str] = &["STARTING", "UPDATING", "STOPPING"];
const SETTLED: &[&str] = &["STOPPED", "RUNNING"];
const ANY_STATUS: &[&str] = &["STOPPED", "STARTING", "RUNNING", "FAILED", "STOPPING", "UPDATING"];

const LABELS: &[&str] = &["PERSON", "PET", "PACKAGE", "ALL"];

/// A stream processor. The ID is its name.
pub struct StreamProcessor;

fn ratio() -> Attribute {
    Attribute::optional_float64().with_validator(Validator::float_range(0.0, 1.0))
}

fn percentage() -> Attribute {
    Attribute::optional_float64().with_validator(Validator::float_range(0.0, 100.0))
}

fn expand_input(planned: &State) -> Option<StreamProcessorInput> {
    planned.block("input").map(|input| {
        StreamProcessorInput::builder()
            .set_kinesis_video_stream(
                input
                    .block("kinesis_video_stream")
                    .map(|stream| KinesisVideoStream::builder().set_arn(stream.string("arn")).build()),
            )
            .build()
    })
}

fn expand_output(planned: &State) -> Option<StreamProcessorOutput> {
    planned.block("output").map(|output| {
        StreamProcessorOutput::builder()
            .set_kinesis_data_stream(
                output
                    .block("kinesis_data_stream")
                    .map(|stream| KinesisDataStream::builder().set_arn(stream.string("arn")).build()),
            )
            .set_s3_destination(output.block("s3_destination").map(|s3| {
                S3Destination::builder()
                    .set_bucket(s3.string("bucket"))
                    .set_key_prefix(s3.string("key_prefix"))
                    .build()
            }))
            .build()
    })
}

fn expand_settings(planned: &State) -> Result<Option<StreamProcessorSettings>, ProviderError> {
    let Some(settings) = planned.block("settings") else {
        return Ok(None);
    };
    let connected_home = match settings.block("connected_home") {
        Some(home) => Some(
            ConnectedHomeSettings::builder()
                .set_labels(Some(home.strings("labels")))
                .set_min_confidence(home.f32("min_confidence"))
                .build()?,
        ),
        None => None,
    };
    let face_search = settings.block("face_search").map(|search| {
        FaceSearchSettings::builder()
            .set_collection_id(search.string("collection_id"))
            .set_face_match_threshold(search.f32("face_match_threshold"))
            .build()
    });
    Ok(Some(
        StreamProcessorSettings::builder()
            .set_connected_home(connected_home)
            .set_face_search(face_search)
            .build(),
    ))
}

fn expand_notification_channel(planned: &State) -> Result<Option<StreamProcessorNotificationChannel>, ProviderError> {
    let Some(channel) = planned.block("notification_channel") else {
        return Ok(None);
    };
    Ok(Some(
        StreamProcessorNotificationChannel::builder()
            .sns_topic_arn(channel.required_str("sns_topic_arn")?)
            .build()?,
    ))
}

fn expand_data_sharing(planned: &State) -> Option<StreamProcessorDataSharingPreference> {
    planned.block("data_sharing_preference").map(|preference| {
        StreamProcessorDataSharingPreference::builder()
            .opt_in(preference.bool("opt_in").unwrap_or_default())
            .build()
    })
}

fn expand_regions(planned: &State) -> Option<Vec<RegionOfInterest>> {
    let regions: Vec<RegionOfInterest> = planned
        .blocks("regions_of_interest")
        .iter()
        .map(|region| {
            let polygon: Vec<Point> = region
                .blocks("polygon")
                .iter()
                .map(|point| Point::builder().set_x(point.f32("x")).set_y(point.f32("y")).build())
                .collect();
            RegionOfInterest::builder()
                .set_bounding_box(region.block("bounding_box").map(|bbox| {
                    BoundingBox::builder()
                        .set_height(bbox.f32("height"))
                        .set_left(bbox.f32("left"))
                        .set_top(bbox.f32("top"))
                        .set_width(bbox.f32("width"))
                        .build()
                }))
                .set_polygon((!polygon.is_empty()).then_some(polygon))
                .build()
        })
        .collect();
    (!regions.is_empty()).then_some(regions)
}

fn flatten_regions(regions: &[RegionOfInterest]) -> Vec<State> {
    regions
        .iter()
        .map(|region| {
            let mut block = State::new();
            block.set_block(
                "bounding_box",
                region.bounding_box().map(|bbox| {
                    State::new()
                        .with_f32("height", bbox.height())
                        .with_f32("left", bbox.left())
                        .with_f32("top", bbox.top())
                        .with_f32("width", bbox.width())
                }),
            );
            block.set_blocks(
                "polygon",
                region
                    .polygon()
                    .iter()
                    .map(|point| State::new().with_f32("x", point.x()).with_f32("y", point.y())),
            );
            block
        })
        .collect()
}

fn flatten_settings(settings: &StreamProcessorSettings) -> State {
    let mut block = State::new();
    block.set_block(
        "connected_home",
        settings.connected_home().map(|home| {
            let mut state = State::new().with_f32("min_confidence", home.min_confidence());
            state.set_strings("labels", home.labels());
            state
        }),
    );
    block.set_block(
        "face_search",
        settings.face_search().map(|search| {
            State::new()
                .with("collection_id", search.collection_id())
                .with_f32("face_match_threshold", search.face_match_threshold())
        }),
    );
    block
}

fn connected_home(state: &State) -> Option<State> {
    state.block("settings")?.block("connected_home")
}

fn face_search(state: &State) -> Option<State> {
    state.block("settings")?.block("face_search")
}

/// Optional settings present in `prior` and cleared in `planned`.
fn parameters_to_delete(prior: &State, planned: &State) -> Vec<StreamProcessorParameterToDelete> {
    let mut parameters = Vec::new();
    let had_min_confidence = connected_home(prior).and_then(|home| home.f64("min_confidence")).is_some();
    let has_min_confidence = connected_home(planned).and_then(|home| home.f64("min_confidence")).is_some();
    if had_min_confidence && !has_min_confidence {
        parameters.push(StreamProcessorParameterToDelete::ConnectedHomeMinConfidence);
    }
    if !prior.blocks("regions_of_interest").is_empty() && planned.blocks("regions_of_interest").is_empty() {
        parameters.push(StreamProcessorParameterToDelete::RegionsOfInterest);
    }
    parameters
}

async fn describe(clients: &AwsClients, name: &str) -> Result<Option<DescribeStreamProcessorOutput>, ProviderError> {
    clients
        .rekognition
        .describe_stream_processor()
        .name(name)
        .send()
        .await
        .map_err(|e| sdk_error(&format!("reading Rekognition Stream Processor ({name})"), e))
        .optional()
}

fn status_of(output: &DescribeStreamProcessorOutput) -> String {
    output.status().map(|s| s.as_str().to_owned()).unwrap_or_default()
}

async fn wait_settled(clients: &AwsClients, name: &str, timeout: Duration) -> Result<String, ProviderError> {
    let wait = StatusWait::new(PENDING, SETTLED, timeout);
    let settled = wait_for_status("Rekognition Stream Processor", &wait, || async move {
        let Some(output) = describe(clients, name).await? else {
            return Ok(None);
        };
        let status = status_of(&output);
        if status == "FAILED" {
            return Err(ProviderError::FailedPrecondition(format!(
                "Rekognition Stream Processor ({name}) failed: {}",
                output.status_message().unwrap_or_default()
            )));
        }
        Ok(Some((status.clone(), status)))
    })
    .await?;
    Ok(settled.unwrap_or_default())
}

#[async_trait]
impl Resource for StreamProcessor {
    fn type_name(&self) -> &'static str {
        "aws_rekognition_stream_processor"
    }

    fn schema(&self) -> Schema {
        Schema::resource()
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_validator(Validator::length(1, 128))
                    .with_validator(Validator::pattern(
                        r"^[a-zA-Z0-9_.\-]+$",
                        "must contain only letters, digits, '_', '.' and '-'",
                    )),
            )
            .with_attribute("role_arn", Attribute::required_string().with_force_new())
            .with_attribute("kms_key_id", Attribute::optional_string().with_force_new())
            .with_attribute("arn", Attribute::computed_string())
            .with_tags()
            .with_block(
                "input",
                NestedBlock::required_single(Block::new().with_block(
                    "kinesis_video_stream",
                    NestedBlock::required_single(
                        Block::new().with_attribute("arn", Attribute::required_string().with_force_new()),
                    ),
                )),
            )
            .with_block(
                "output",
                NestedBlock::required_single(
                    Block::new()
                        .with_block(
                            "kinesis_data_stream",
                            NestedBlock::single(
                                Block::new().with_attribute("arn", Attribute::optional_string().with_force_new()),
                            ),
                        )
                        .with_block(
                            "s3_destination",
                            NestedBlock::single(
                                Block::new()
                                    .with_attribute("bucket", Attribute::optional_string().with_force_new())
                                    .with_attribute("key_prefix", Attribute::optional_string().with_force_new()),
                            ),
                        ),
                ),
            )
            .with_block(
                "settings",
                NestedBlock::required_single(
                    Block::new()
                        .with_block(
                            "connected_home",
                            NestedBlock::single(
                                Block::new()
                                    .with_attribute(
                                        "labels",
                                        Attribute::string_list(AttributeFlags::required()).one_of(LABELS),
                                    )
                                    .with_attribute("min_confidence", percentage()),
                            ),
                        )
                        .with_block(
                            "face_search",
                            NestedBlock::single(
                                Block::new()
                                    .with_attribute("collection_id", Attribute::required_string())
                                    .with_attribute(
                                        "face_match_threshold",
                                        // AWS reports 80 when left unset.
                                        Attribute::optional_computed_float64()
                                            .with_validator(Validator::float_range(0.0, 100.0)),
                                    ),
                            ),
                        ),
                ),
            )
            .with_block(
                "notification_channel",
                NestedBlock::single(
                    Block::new().with_attribute("sns_topic_arn", Attribute::required_string().with_force_new()),
                ),
            )
            .with_block(
                "data_sharing_preference",
                NestedBlock::single(Block::new().with_attribute("opt_in", Attribute::required_bool())),
            )
            .with_block(
                "regions_of_interest",
                NestedBlock::list(
                    Block::new()
                        .with_block(
                            "bounding_box",
                            NestedBlock::single(
                                Block::new()
                                    .with_attribute("height", ratio())
                                    .with_attribute("left", ratio())
                                    .with_attribute("top", ratio())
                                    .with_attribute("width", ratio()),
                            ),
                        )
                        .with_block(
                            "polygon",
                            NestedBlock::list(Block::new().with_attribute("x", ratio()).with_attribute("y", ratio()))
                                .with_min_items(3),
                        ),
                )
                .with_max_items(10),
            )
    }

    /// Face search settings are immutable, and a processor cannot switch between
    /// face search and connected home.
    fn requires_replace(&self, prior: &State, planned: &State) -> bool {
        let switched = face_search(prior).is_some() != face_search(planned).is_some()
            || connected_home(prior).is_some() != connected_home(planned).is_some();
        let searching_differently = match (face_search(prior), face_search(planned)) {
            (Some(before), Some(after)) => after.any_changed(&before, &["collection_id", "face_match_threshold"]),
            _ => false,
        };
        switched || searching_differently
    }

    async fn create(&self, clients: &AwsClients, planned: State) -> Result<State, ProviderError> {
        let name = planned.required_str("name")?.to_owned();
        debug!(name, "creating Rekognition Stream Processor");

        clients
            .rekognition
            .create_stream_processor()
            .name(&name)
            .role_arn(planned.required_str("role_arn")?)
            .set_kms_key_id(planned.string("kms_key_id"))
            .set_input(expand_input(&planned))
            .set_output(expand_output(&planned))
            .set_settings(expand_settings(&planned)?)
            .set_notification_channel(expand_notification_channel(&planned)?)
            .set_data_sharing_preference(expand_data_sharing(&planned))
            .set_regions_of_interest(expand_regions(&planned))
            .set_tags(tags_from(&planned))
            .send()
            .await
            .map_err(|e| sdk_error(&format!("creating Rekognition Stream Processor ({name})"), e))?;

        wait_settled(clients, &name, CREATE_TIMEOUT).await?;
        info!(name, "created Rekognition Stream Processor");

        let state = planned.with("id", name.as_str());
        read_back(&format!("Rekognition Stream Processor ({name})"), self.read(clients, state).await?)
    }

    async fn read(&self, clients: &AwsClients, current: State) -> Result<Option<State>, ProviderError> {
        let id = current.id()?.to_owned();
        let Some(output) = describe(clients, &id).await? else {
            debug!(id, "Rekognition Stream Processor not found, removing from state");
            return Ok(None);
        };

        let mut state = current
            .with("name", output.name())
            .with("arn", output.stream_processor_arn())
            .with("role_arn", output.role_arn())
            .with("kms_key_id", output.kms_key_id());
        state.set_block(
            "input",
            output.input().map(|input| {
                let mut block = State::new();
                block.set_block(
                    "kinesis_video_stream",
                    input
                        .kinesis_video_stream()
                        .map(|stream| State::new().with("arn", stream.arn())),
                );
                block
            }),
        );
        state.set_block(
            "output",
            output.output().map(|out| {
                let mut block = State::new();
                block.set_block(
                    "kinesis_data_stream",
                    out.kinesis_data_stream()
                        .map(|stream| State::new().with("arn", stream.arn())),
                );
                block.set_block(
                    "s3_destination",
                    out.s3_destination().map(|s3| {
                        State::new()
                            .with("bucket", s3.bucket())
                            .with("key_prefix", s3.key_prefix())
                    }),
                );
                block
            }),
        );
        state.set_block("settings", output.settings().map(flatten_settings));
        state.set_block(
            "notification_channel",
            output
                .notification_channel()
                .map(|channel| State::new().with("sns_topic_arn", channel.sns_topic_arn())),
        );
        state.set_block(
            "data_sharing_preference",
            output
                .data_sharing_preference()
                .map(|preference| State::new().with("opt_in", preference.opt_in())),
        );
        state.set_blocks("regions_of_interest", flatten_regions(output.regions_of_interest()));
        if let Some(arn) = output.stream_processor_arn() {
            state.set_string_map("tags", Some(&list_tags(clients, arn).await?));
        }
        Ok(Some(state))
    }

    async fn update(&self, clients: &AwsClients, prior: State, planned: State) -> Result<State, ProviderError> {
        let id = prior.id()?.to_owned();

        if planned.any_changed(&prior, &["settings", "regions_of_interest", "data_sharing_preference"]) {
            let settings = connected_home(&planned)
                .filter(|home| connected_home(&prior).as_ref() != Some(home))
                .map(|home| {
                    StreamProcessorSettingsForUpdate::builder()
                        .connected_home_for_update(
                            ConnectedHomeSettingsForUpdate::builder()
                                .set_labels(Some(home.strings("labels")))
                                .set_min_confidence(home.f32("min_confidence"))
                                .build(),
                        )
                        .build()
                });
            let regions = planned
                .changed(&prior, "regions_of_interest")
                .then(|| expand_regions(&planned))
                .flatten();
            let data_sharing = planned
                .changed(&prior, "data_sharing_preference")
                .then(|| expand_data_sharing(&planned))
                .flatten();
            let to_delete = parameters_to_delete(&prior, &planned);
            debug!(id, ?to_delete, "updating Rekognition Stream Processor");

            clients
                .rekognition
                .update_stream_processor()
                .name(&id)
                .set_settings_for_update(settings)
                .set_regions_of_interest_for_update(regions)
                .set_data_sharing_preference_for_update(data_sharing)
                .set_parameters_to_delete((!to_delete.is_empty()).then_some(to_delete))
                .send()
                .await
                .map_err(|e| sdk_error(&format!("updating Rekognition Stream Processor ({id})"), e))?;

            wait_settled(clients, &id, UPDATE_TIMEOUT).await?;
        }

        if planned.changed(&prior, "tags") {
            let arn = prior.required_str("arn")?;
            update_tags(clients, arn, &prior, &planned).await?;
        }

        let state = planned.with("id", id.as_str());
        read_back(&format!("Rekognition Stream Processor ({id})"), self.read(clients, state).await?)
    }

    async fn delete(&self, clients: &AwsClients, current: State) -> Result<(), ProviderError> {
        let id = current.id()?;
        let Some(output) = describe(clients, id).await? else {
            return Ok(());
        };

        // A running processor has to be stopped before it can be deleted.
        let mut status = status_of(&output);
        if PENDING.contains(&status.as_str()) {
            status = wait_settled(clients, id, DELETE_TIMEOUT).await?;
        }
        if status == "RUNNING" {
            warn!(id, "stopping running Rekognition Stream Processor before delete");
            clients
                .rekognition
                .stop_stream_processor()
                .name(id)
                .send()
                .await
                .map_err(|e| sdk_error(&format!("stopping Rekognition Stream Processor ({id})"), e))?;
            wait_settled(clients, id, DELETE_TIMEOUT).await?;
        }

        debug!(id, "deleting Rekognition Stream Processor");
        let gone = clients
            .rekognition
            .delete_stream_processor()
            .name(id)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("deleting Rekognition Stream Processor ({id})"), e))
            .optional()?
            .is_none();
        if gone {
            return Ok(());
        }

        let wait = StatusWait::gone(ANY_STATUS, DELETE_TIMEOUT);
        wait_for_status("Rekognition Stream Processor", &wait, || async move {
            Ok(describe(clients, id).await?.map(|output| ((), status_of(&output))))
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::service_error_meta;
    use crate::resource::plan_with;
    use crate::validation::validate;
    use aws_sdk_rekognition::operation::delete_stream_processor::DeleteStreamProcessorOutput;
    use aws_sdk_rekognition::operation::describe_stream_processor::DescribeStreamProcessorError;
    use aws_sdk_rekognition::operation::stop_stream_processor::StopStreamProcessorOutput;
    use aws_sdk_rekognition::types::error::ResourceNotFoundException;
    use aws_sdk_rekognition::types::StreamProcessorStatus;
    use aws_smithy_mocks::{mock, mock_client, RuleMode};
    use serde_json::json;

    fn state(value: serde_json::Value) -> State {
        State::from_value(value).unwrap()
    }

    fn connected_home_config() -> serde_json::Value {
        json!({
            "name": "doorbell",
            "role_arn": "arn:aws:iam::123456789012:role/rekognition",
            "input": {"kinesis_video_stream": {"arn": "arn:aws:kinesisvideo:us-east-1:123456789012:stream/door/1"}},
            "output": {"s3_destination": {"bucket": "clips", "key_prefix": "door/"}},
            "settings": {"connected_home": {"labels": ["PERSON", "PACKAGE"], "min_confidence": 80}},
            "notification_channel": {"sns_topic_arn": "arn:aws:sns:us-east-1:123456789012:door"},
            "regions_of_interest": [{"polygon": [{"x": 0.5, "y": 0.25}, {"x": 0.75, "y": 0.25}, {"x": 0.5, "y": 0.5}]}],
        })
    }

    #[test]
    fn test_schema_validation() {
        let schema = StreamProcessor.schema();
        assert!(validate(&schema, &connected_home_config()).is_empty());

        let mut bad_label = connected_home_config();
        bad_label["settings"]["connected_home"]["labels"] = json!(["CAR"]);
        assert!(!validate(&schema, &bad_label).is_empty());

        let mut missing_input = connected_home_config();
        missing_input.as_object_mut().unwrap().remove("input");
        assert!(!validate(&schema, &missing_input).is_empty());

        let mut triangle_too_small = connected_home_config();
        triangle_too_small["regions_of_interest"][0]["polygon"] = json!([{"x": 0.5, "y": 0.5}]);
        assert!(!validate(&schema, &triangle_too_small).is_empty());
    }

    #[test]
    fn test_expand_settings_and_regions() {
        let planned = state(connected_home_config());

        let settings = expand_settings(&planned).unwrap().unwrap();
        let home = settings.connected_home().unwrap();
        assert_eq!(home.labels(), ["PERSON", "PACKAGE"]);
        assert_eq!(home.min_confidence(), Some(80.0));
        assert!(settings.face_search().is_none());

        let regions = expand_regions(&planned).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].polygon().len(), 3);
        assert!(regions[0].bounding_box().is_none());

        let flat = flatten_regions(&regions);
        assert_eq!(flat[0].blocks("polygon")[0].f64("x"), Some(0.5));
        assert_eq!(flat[0].get("bounding_box"), Some(&serde_json::Value::Null));

        let flat_settings = flatten_settings(&settings);
        assert_eq!(flat_settings.block("connected_home").unwrap().strings("labels"), vec!["PERSON", "PACKAGE"]);
    }

    #[test]
    fn test_notification_channel_requires_topic() {
        let channel = state(json!({"notification_channel": {}}));
        assert!(expand_notification_channel(&channel).is_err());
        assert!(expand_notification_channel(&State::new()).unwrap().is_none());
    }

    #[test]
    fn test_parameters_to_delete() {
        let prior = state(connected_home_config());
        let mut cleared = connected_home_config();
        cleared["settings"]["connected_home"] = json!({"labels": ["PERSON"]});
        cleared["regions_of_interest"] = json!([]);

        assert_eq!(
            parameters_to_delete(&prior, &state(cleared)),
            vec![
                StreamProcessorParameterToDelete::ConnectedHomeMinConfidence,
                StreamProcessorParameterToDelete::RegionsOfInterest,
            ]
        );
        assert!(parameters_to_delete(&prior, &prior).is_empty());
    }

    #[test]
    fn test_plan_replacement_rules() {
        let schema = StreamProcessor.schema();
        let mut prior = connected_home_config();
        prior["id"] = json!("doorbell");
        let replace = |p: &State, n: &State| StreamProcessor.requires_replace(p, n);

        let mut labels = connected_home_config();
        labels["settings"]["connected_home"]["labels"] = json!(["ALL"]);
        assert!(!plan_with(&schema, &prior, &labels, replace).unwrap().requires_replace);

        let mut face_search = connected_home_config();
        face_search["settings"] = json!({"face_search": {"collection_id": "faces"}});
        assert!(plan_with(&schema, &prior, &face_search, replace).unwrap().requires_replace);

        let mut stream = connected_home_config();
        stream["input"]["kinesis_video_stream"]["arn"] = json!("arn:aws:kinesisvideo:us-east-1:123456789012:stream/back/2");
        assert!(plan_with(&schema, &prior, &stream, replace).unwrap().requires_replace);
    }

    fn face_search_config() -> serde_json::Value {
        json!({
            "name": "lobby",
            "role_arn": "arn:aws:iam::123456789012:role/rekognition",
            "input": {"kinesis_video_stream": {"arn": "arn:aws:kinesisvideo:us-east-1:123456789012:stream/lobby/1"}},
            "output": {"kinesis_data_stream": {"arn": "arn:aws:kinesis:us-east-1:123456789012:stream/matches"}},
            "settings": {"face_search": {"collection_id": "staff"}},
        })
    }

    /// State as read back from AWS, which fills in the default match threshold.
    fn face_search_state() -> serde_json::Value {
        let settings = StreamProcessorSettings::builder()
            .face_search(
                FaceSearchSettings::builder()
                    .collection_id("staff")
                    .face_match_threshold(80.0)
                    .build(),
            )
            .build();
        let mut state = face_search_config();
        state["id"] = json!("lobby");
        state["arn"] = json!("arn:aws:rekognition:us-east-1:123456789012:streamprocessor/lobby");
        state["settings"] = flatten_settings(&settings).into_value();
        state["regions_of_interest"] = json!([]);
        state["tags"] = json!({});
        state
    }

    #[test]
    fn test_default_match_threshold_is_not_a_replacement() {
        let schema = StreamProcessor.schema();
        let prior = face_search_state();
        let replace = |p: &State, n: &State| StreamProcessor.requires_replace(p, n);

        let plan = plan_with(&schema, &prior, &face_search_config(), replace).unwrap();
        assert!(!plan.requires_replace);
        assert!(!plan.has_changes(), "{:?}", plan.changes);
        assert_eq!(plan.planned_state["settings"]["face_search"]["face_match_threshold"], json!(80.0));

        let mut stricter = face_search_config();
        stricter["settings"]["face_search"]["face_match_threshold"] = json!(90);
        assert!(plan_with(&schema, &prior, &stricter, replace).unwrap().requires_replace);

        let mut other_collection = face_search_config();
        other_collection["settings"]["face_search"]["collection_id"] = json!("visitors");
        assert!(plan_with(&schema, &prior, &other_collection, replace).unwrap().requires_replace);
    }

    #[test]
    fn test_read_back_regions_match_config() {
        let schema = StreamProcessor.schema();
        let mut config = connected_home_config();
        config["regions_of_interest"] = json!([
            {"bounding_box": {"height": 0.1, "left": 0.2, "top": 0.3, "width": 0.4}},
        ]);

        let regions = expand_regions(&state(config.clone())).unwrap();
        let bbox = flatten_regions(&regions)[0].block("bounding_box").unwrap();
        assert_eq!(bbox.f64("height"), Some(0.1));
        assert_eq!(bbox.f64("top"), Some(0.3));

        let settings = expand_settings(&state(config.clone())).unwrap().unwrap();
        let mut prior = config.clone();
        prior["id"] = json!("doorbell");
        prior["settings"] = flatten_settings(&settings).into_value();
        prior["regions_of_interest"] =
            serde_json::Value::Array(flatten_regions(&regions).into_iter().map(State::into_value).collect());

        let plan = plan_with(&schema, &prior, &config, |_, _| false).unwrap();
        assert!(!plan.has_changes(), "{:?}", plan.changes);
    }

    fn not_found() -> DescribeStreamProcessorError {
        DescribeStreamProcessorError::ResourceNotFoundException(
            ResourceNotFoundException::builder()
                .message("Stream processor not found.")
                .meta(service_error_meta("ResourceNotFoundException"))
                .build(),
        )
    }

    fn described(status: StreamProcessorStatus) -> DescribeStreamProcessorOutput {
        DescribeStreamProcessorOutput::builder()
            .name("doorbell")
            .stream_processor_arn("arn:aws:rekognition:us-east-1:123456789012:streamprocessor/doorbell")
            .status(status)
            .build()
    }

    #[tokio::test]
    async fn test_read_missing_processor_is_none() {
        let describe = mock!(aws_sdk_rekognition::Client::describe_stream_processor)
            .match_requests(|req| req.name() == Some("doorbell"))
            .then_error(not_found);
        let clients = AwsClients::with_rekognition(mock_client!(aws_sdk_rekognition, RuleMode::MatchAny, [&describe]));

        let state = StreamProcessor
            .read(&clients, State::new().with("id", "doorbell"))
            .await
            .unwrap();
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_processor_succeeds() {
        let describe = mock!(aws_sdk_rekognition::Client::describe_stream_processor).then_error(not_found);
        let delete = mock!(aws_sdk_rekognition::Client::delete_stream_processor)
            .then_output(|| DeleteStreamProcessorOutput::builder().build());
        let clients = AwsClients::with_rekognition(mock_client!(
            aws_sdk_rekognition,
            RuleMode::MatchAny,
            [&describe, &delete]
        ));

        StreamProcessor
            .delete(&clients, State::new().with("id", "doorbell"))
            .await
            .unwrap();
        assert_eq!(delete.num_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_stops_running_processor_first() {
        let describe = mock!(aws_sdk_rekognition::Client::describe_stream_processor)
            .sequence()
            .output(|| described(StreamProcessorStatus::Running))
            .output(|| described(StreamProcessorStatus::Stopping))
            .output(|| described(StreamProcessorStatus::Stopped))
            .error(not_found)
            .build();
        let stop = mock!(aws_sdk_rekognition::Client::stop_stream_processor)
            .then_output(|| StopStreamProcessorOutput::builder().build());
        let delete = mock!(aws_sdk_rekognition::Client::delete_stream_processor)
            .then_output(|| DeleteStreamProcessorOutput::builder().build());
        let clients = AwsClients::with_rekognition(mock_client!(
            aws_sdk_rekognition,
            RuleMode::MatchAny,
            [&describe, &stop, &delete]
        ));

        StreamProcessor
            .delete(&clients, State::new().with("id", "doorbell"))
            .await
            .unwrap();
        assert_eq!(describe.num_calls(), 4);
        assert_eq!(stop.num_calls(), 1);
        assert_eq!(delete.num_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_processor_stops_the_wait() {
        let describe = mock!(aws_sdk_rekognition::Client::describe_stream_processor)
            .sequence()
            .output(|| described(StreamProcessorStatus::Starting))
            .output(|| {
                DescribeStreamProcessorOutput::builder()
                    .name("doorbell")
                    .status(StreamProcessorStatus::Failed)
                    .status_message("Kinesis stream not found")
                    .build()
            })
            .build();
        let clients = AwsClients::with_rekognition(mock_client!(aws_sdk_rekognition, RuleMode::MatchAny, [&describe]));

        let err = wait_settled(&clients, "doorbell", CREATE_TIMEOUT).await.unwrap_err();
        assert!(err.to_string().contains("Kinesis stream not found"), "{err}");
    }
}
