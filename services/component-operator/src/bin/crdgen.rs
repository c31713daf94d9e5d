use component_core::crds::Component;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&Component::crd())?);
    Ok(())
}
