use fleetplane::crd::ClusterRegistration;
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&ClusterRegistration::crd())?);
    Ok(())
}
