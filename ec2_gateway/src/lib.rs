use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_cloudwatch::primitives::DateTime;
use aws_sdk_cloudwatch::types::{Datapoint, Dimension, StandardUnit, Statistic};
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::types::Instance;
use chrono::Utc;
use hearth_core::{CloudOperationError, InstanceGateway, InstanceState, UsageSample};

const CPU_WINDOW_SECONDS: i64 = 600;
const CPU_PERIOD_SECONDS: i32 = 300;

pub struct Ec2Gateway {
    ec2: aws_sdk_ec2::Client,
    cloudwatch: aws_sdk_cloudwatch::Client,
}

impl Ec2Gateway {
    /// Credentials come from the default provider chain (env, profile, IMDS).
    pub async fn for_region(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_sdk_ec2::config::Region::new(region.to_owned()))
            .load()
            .await;

        Self {
            ec2: aws_sdk_ec2::Client::new(&config),
            cloudwatch: aws_sdk_cloudwatch::Client::new(&config),
        }
    }

    async fn describe(&self, instance_id: &str) -> Result<Instance, CloudOperationError> {
        self.ec2
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|err| CloudOperationError::new("describe", format!("{}", DisplayErrorContext(err))))?
            .reservations()
            .iter()
            .flat_map(|reservation| reservation.instances())
            .find(|instance| instance.instance_id() == Some(instance_id))
            .cloned()
            .ok_or_else(|| CloudOperationError::new("describe", format!("'{instance_id}' not found")))
    }
}

#[async_trait]
impl InstanceGateway for Ec2Gateway {
    async fn status(&self, instance_id: &str) -> Result<InstanceState, CloudOperationError> {
        let instance = self.describe(instance_id).await?;
        let raw = instance
            .state()
            .and_then(|state| state.name())
            .map(|name| name.as_str())
            .unwrap_or_default();

        Ok(InstanceState::from_provider(raw))
    }

    async fn start(&self, instance_id: &str) -> Result<(), CloudOperationError> {
        tracing::info!("Requesting start of {instance_id}");
        self.ec2
            .start_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| CloudOperationError::new("start", format!("{}", DisplayErrorContext(err))))
    }

    async fn stop(&self, instance_id: &str) -> Result<(), CloudOperationError> {
        tracing::info!("Requesting stop of {instance_id}");
        self.ec2
            .stop_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| CloudOperationError::new("stop", format!("{}", DisplayErrorContext(err))))
    }

    async fn public_address(
        &self,
        instance_id: &str,
    ) -> Result<Option<String>, CloudOperationError> {
        let instance = self.describe(instance_id).await?;
        Ok(instance.public_ip_address().map(str::to_owned))
    }

    async fn cpu_utilization(
        &self,
        instance_id: &str,
    ) -> Result<UsageSample, CloudOperationError> {
        let end = Utc::now().timestamp();
        let start = end - CPU_WINDOW_SECONDS;
        let dimension = Dimension::builder()
            .name("InstanceId")
            .value(instance_id)
            .build()
            .map_err(|err| CloudOperationError::new("metrics", format!("{err}")))?;

        let output = self
            .cloudwatch
            .get_metric_statistics()
            .namespace("AWS/EC2")
            .metric_name("CPUUtilization")
            .dimensions(dimension)
            .start_time(DateTime::from_secs(start))
            .end_time(DateTime::from_secs(end))
            .period(CPU_PERIOD_SECONDS)
            .statistics(Statistic::Maximum)
            .statistics(Statistic::Average)
            .unit(StandardUnit::Percent)
            .send()
            .await
            .map_err(|err| CloudOperationError::new("metrics", format!("{}", DisplayErrorContext(err))))?;

        Ok(latest_sample(output.datapoints()))
    }
}

/// CloudWatch does not sort datapoints: pick the newest one.
fn latest_sample(datapoints: &[Datapoint]) -> UsageSample {
    datapoints
        .iter()
        .max_by_key(|point| point.timestamp().map(|t| t.secs()).unwrap_or(i64::MIN))
        .map(|point| UsageSample::new(point.average(), point.maximum()))
        .unwrap_or_else(UsageSample::absent)
}
