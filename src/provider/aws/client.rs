//! EC2 and SSM through the official AWS SDK.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ec2::config::{Credentials, Region};
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::types::{
    BlockDeviceMapping, EbsBlockDevice, HttpTokensState, IamInstanceProfileSpecification,
    InstanceInterruptionBehavior, InstanceMarketOptionsRequest, InstanceMetadataEndpointState,
    InstanceMetadataOptionsRequest, InstanceType, MarketType, Placement, ResourceType,
    ShutdownBehavior, SpotInstanceType, SpotMarketOptions, Tag, TagSpecification, Tenancy,
    VolumeType,
};
use base64::Engine;
use tracing::debug;

use crate::config::{AwsAccessKey, LaunchOptions};
use crate::error::{ComputeError, ProviderError, Result};

use super::{Ec2Api, RunInstancesSpec, PROVIDER};

/// Error codes AWS returns when it rejects the caller's credentials.
///
/// Permission failures such as `AccessDenied` or `UnauthorizedOperation` stay
/// API errors.
const CREDENTIAL_ERROR_CODES: &[&str] = &[
    "AuthFailure",
    "InvalidClientTokenId",
    "SignatureDoesNotMatch",
    "UnrecognizedClientException",
];

/// EC2 and SSM clients sharing one credential set.
#[derive(Debug, Clone)]
pub struct SdkEc2Client {
    ec2: aws_sdk_ec2::Client,
    ssm: aws_sdk_ssm::Client,
}

impl SdkEc2Client {
    /// Configures the SDK clients with static credentials for `region`.
    ///
    /// # Errors
    ///
    /// Returns a credential error if the key is blank.
    pub async fn connect(auth: &AwsAccessKey, region: &str) -> Result<Self> {
        if auth.aws_access_key_id.trim().is_empty() || auth.aws_secret_access_key.trim().is_empty() {
            return Err(ComputeError::credential(PROVIDER, "access key id and secret are required"));
        }

        debug!("Configuring AWS SDK for region {region}");
        let credentials = Credentials::new(
            auth.aws_access_key_id.clone(),
            auth.aws_secret_access_key.clone(),
            None,
            None,
            "compute-creator",
        );
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials)
            .load()
            .await;

        Ok(Self {
            ec2: aws_sdk_ec2::Client::new(&shared),
            ssm: aws_sdk_ssm::Client::new(&shared),
        })
    }
}

#[async_trait]
impl Ec2Api for SdkEc2Client {
    async fn latest_image_id(&self, parameter: &str) -> Result<String> {
        let response = self
            .ssm
            .get_parameter()
            .name(parameter)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| from_sdk(&e))?;

        response
            .parameter()
            .and_then(|p| p.value())
            .map(String::from)
            .ok_or_else(|| {
                ProviderError::invalid_response(
                    PROVIDER,
                    format!("SSM parameter {parameter} has no value"),
                )
                .into()
            })
    }

    async fn create_key_pair(&self, key_name: &str) -> Result<String> {
        let response = self
            .ec2
            .create_key_pair()
            .key_name(key_name)
            .send()
            .await
            .map_err(|e| from_sdk(&e))?;

        response.key_material().map(String::from).ok_or_else(|| {
            ProviderError::invalid_response(
                PROVIDER,
                format!("CreateKeyPair for {key_name} returned no key material"),
            )
            .into()
        })
    }

    async fn run_instances(&self, spec: &RunInstancesSpec) -> Result<Vec<String>> {
        let mut request = self
            .ec2
            .run_instances()
            .image_id(&spec.image_id)
            .instance_type(InstanceType::from(spec.instance_type.as_str()))
            .key_name(&spec.key_name)
            .min_count(to_i32(spec.min_count, "min_instance_count")?)
            .max_count(to_i32(spec.max_count, "max_instance_count")?)
            .set_security_group_ids(if spec.security_group_ids.is_empty() {
                None
            } else {
                Some(spec.security_group_ids.clone())
            });

        if let Some(options) = &spec.launch_options {
            request = apply_launch_options(request, options)?;
        }

        let response = request.send().await.map_err(|e| from_sdk(&e))?;
        Ok(response
            .instances()
            .iter()
            .filter_map(|instance| instance.instance_id().map(String::from))
            .collect())
    }
}

type RunInstancesBuilder = aws_sdk_ec2::operation::run_instances::builders::RunInstancesFluentBuilder;

fn apply_launch_options(
    mut request: RunInstancesBuilder,
    options: &LaunchOptions,
) -> Result<RunInstancesBuilder> {
    for mapping in &options.block_device_mappings {
        let ebs = match &mapping.ebs {
            Some(volume) => Some(
                EbsBlockDevice::builder()
                    .set_volume_size(opt_i32(volume.volume_size, "volume_size")?)
                    .set_volume_type(volume.volume_type.map(|t| VolumeType::from(t.as_str())))
                    .set_iops(opt_i32(volume.iops, "iops")?)
                    .set_throughput(opt_i32(volume.throughput, "throughput")?)
                    .set_encrypted(volume.encrypted)
                    .set_snapshot_id(volume.snapshot_id.clone())
                    .set_kms_key_id(volume.kms_key_id.clone())
                    .set_delete_on_termination(volume.delete_on_termination)
                    .build(),
            ),
            None => None,
        };
        request = request.block_device_mappings(
            BlockDeviceMapping::builder()
                .device_name(&mapping.device_name)
                .set_ebs(ebs)
                .build(),
        );
    }

    if let Some(profile) = &options.iam_instance_profile {
        debug!("Using IAM instance profile");
        request = request.iam_instance_profile(
            IamInstanceProfileSpecification::builder()
                .set_name(profile.name.clone())
                .set_arn(profile.arn.clone())
                .build(),
        );
    }

    if let Some(placement) = &options.placement {
        request = request.placement(
            Placement::builder()
                .set_availability_zone(placement.availability_zone.clone())
                .set_tenancy(placement.tenancy.map(|t| Tenancy::from(t.as_str())))
                .set_group_name(placement.group_name.clone())
                .build(),
        );
    }

    if let Some(spot) = &options.spot {
        debug!("Launching as spot instance");
        let spot_options = SpotMarketOptions::builder()
            .set_max_price(spot.max_price.clone())
            .set_spot_instance_type(spot.spot_instance_type.map(|t| SpotInstanceType::from(t.as_str())))
            .set_instance_interruption_behavior(
                spot.interruption_behavior
                    .map(|b| InstanceInterruptionBehavior::from(b.as_str())),
            )
            .build();
        request = request.instance_market_options(
            InstanceMarketOptionsRequest::builder()
                .market_type(MarketType::Spot)
                .spot_options(spot_options)
                .build(),
        );
    }

    if let Some(metadata) = &options.metadata_options {
        request = request.metadata_options(
            InstanceMetadataOptionsRequest::builder()
                .set_http_tokens(metadata.http_tokens.map(|t| HttpTokensState::from(t.as_str())))
                .set_http_endpoint(
                    metadata
                        .http_endpoint
                        .map(|e| InstanceMetadataEndpointState::from(e.as_str())),
                )
                .set_http_put_response_hop_limit(opt_i32(
                    metadata.http_put_response_hop_limit,
                    "http_put_response_hop_limit",
                )?)
                .build(),
        );
    }

    if !options.tags.is_empty() {
        request = request.tag_specifications(
            TagSpecification::builder()
                .resource_type(ResourceType::Instance)
                .set_tags(Some(
                    options
                        .tags
                        .iter()
                        .map(|(k, v)| Tag::builder().key(k).value(v).build())
                        .collect(),
                ))
                .build(),
        );
    }

    Ok(request
        .set_subnet_id(options.subnet_id.clone())
        .set_private_ip_address(options.private_ip_address.clone())
        .set_user_data(
            options
                .user_data
                .as_ref()
                .map(|script| base64::engine::general_purpose::STANDARD.encode(script)),
        )
        .set_ebs_optimized(options.ebs_optimized)
        .set_disable_api_termination(options.disable_api_termination)
        .set_instance_initiated_shutdown_behavior(
            options
                .shutdown_behavior
                .map(|b| ShutdownBehavior::from(b.as_str())),
        ))
}

fn to_i32(value: u32, field: &str) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| ComputeError::internal(format!("{field} {value} exceeds the EC2 API range")))
}

fn opt_i32(value: Option<u32>, field: &str) -> Result<Option<i32>> {
    value.map(|v| to_i32(v, field)).transpose()
}

fn is_credential_code(code: &str) -> bool {
    CREDENTIAL_ERROR_CODES.contains(&code)
}

/// Maps an SDK failure, keeping the service error code and message verbatim.
fn from_sdk<E, R>(err: &SdkError<E, R>) -> ComputeError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let detail = DisplayErrorContext(err).to_string();
    match err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            ProviderError::network(PROVIDER, detail).into()
        }
        _ => match err.code() {
            Some(code) if is_credential_code(code) => {
                ComputeError::credential(PROVIDER, err.message().unwrap_or(code).to_string())
            }
            code => ProviderError::api(
                PROVIDER,
                None,
                code.map(String::from),
                err.message().map_or(detail, String::from),
            )
            .into(),
        },
    }
}
