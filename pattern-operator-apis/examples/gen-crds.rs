use kube::CustomResourceExt;
use pattern_operator_apis::Pattern;
use serde_yaml;

pub fn main() {
    println!("{}", serde_yaml::to_string(&Pattern::crd()).unwrap());
}
