use autosnap_common::AutosnapError;
use autosnap_providers::{CloudProvider, ImdsClient, InstanceMetadata, StaticInstanceId};

use crate::settings::Settings;

pub struct ProviderManager;

impl ProviderManager {
    pub async fn get_provider(settings: &Settings) -> Result<Box<dyn CloudProvider>, AutosnapError> {
        match settings.provider.as_str() {
            #[cfg(feature = "provider-ec2")]
            "ec2" | "aws" => Ok(Box::new(
                autosnap_providers::ec2::Ec2Provider::from_env(settings.region.clone()).await,
            )),
            #[cfg(feature = "provider-mock")]
            "mock" => {
                use autosnap_providers::mock::{MockFixture, MockProvider};
                let fixture = match &settings.mock_fixture {
                    Some(path) => MockFixture::load(path)
                        .map_err(|e| AutosnapError::Config(format!("{:#}", e)))?,
                    None => MockFixture::default(),
                };
                Ok(Box::new(MockProvider::from_fixture(fixture)))
            }
            // Add other providers here.
            other => Err(AutosnapError::Config(format!(
                "provider '{}' is unknown or not compiled in",
                other
            ))),
        }
    }

    /// Metadata source for the current instance id: the configured override
    /// when present, otherwise the instance metadata service.
    pub fn get_metadata(settings: &Settings) -> Result<Box<dyn InstanceMetadata>, AutosnapError> {
        if let Some(instance_id) = &settings.instance_id {
            return Ok(Box::new(StaticInstanceId::new(instance_id.clone())));
        }
        let client = ImdsClient::new(&settings.imds_endpoint)
            .map_err(|e| AutosnapError::Metadata(format!("{:#}", e)))?;
        Ok(Box::new(client))
    }
}
