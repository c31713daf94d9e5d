use crate::crds::DeploymentBuckets;
use crate::models::DeploymentBucket;

pub fn determine_deployment_bucket(desired: i32, ready: i32) -> DeploymentBucket {
    if desired == 0 {
        return DeploymentBucket::Stopped;
    }

    if ready >= desired {
        return DeploymentBucket::Ready;
    }

    DeploymentBucket::Starting
}

/// Places each `(name, desired, ready)` workload into its bucket.
pub fn determine_deployment_buckets<'a, I>(workloads: I) -> DeploymentBuckets
where
    I: IntoIterator<Item = (&'a str, i32, i32)>,
{
    let mut buckets = DeploymentBuckets::default();
    for (name, desired, ready) in workloads {
        let bucket = match determine_deployment_bucket(desired, ready) {
            DeploymentBucket::Stopped => &mut buckets.stopped,
            DeploymentBucket::Starting => &mut buckets.starting,
            DeploymentBucket::Ready => &mut buckets.ready,
        };
        bucket.push(name.to_string());
    }
    buckets
}
