use kube::CustomResourceExt;

use octavia_operator::octavia::{Octavia, OctaviaAPI};
use octavia_operator::rsyslog::OctaviaRsyslog;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&Octavia::crd())?);
    print!("---\n{}", serde_yaml::to_string(&OctaviaAPI::crd())?);
    print!("---\n{}", serde_yaml::to_string(&OctaviaRsyslog::crd())?);
    Ok(())
}
