use crate::registry::providers::{aws, gcp};
use crate::registry::{Provider, Reference};

/// Determine which cloud provider hosts an image
///
/// ECR is matched against the full image string, the other providers
/// against the parsed registry host. Anything unrecognized (including
/// malformed ECR-looking hosts) is `Generic`.
pub fn image_registry_provider(image: &str, reference: &Reference) -> Provider {
    if aws::parse_image(image).is_some() {
        return Provider::Aws;
    }

    let host = reference.registry();
    if gcp::valid_host(host) {
        Provider::Gcr
    } else if host.ends_with(".azurecr.io") {
        Provider::Azure
    } else {
        Provider::Generic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::parse_reference;

    #[test]
    fn test_image_registry_provider() {
        let cases = [
            ("ecr", "012345678901.dkr.ecr.us-east-1.amazonaws.com/foo:v1", Provider::Aws),
            ("ecr china", "012345678901.dkr.ecr.cn-north-1.amazonaws.com.cn/foo:v1", Provider::Aws),
            ("gcr", "gcr.io/foo/bar:v1", Provider::Gcr),
            ("regional gcr", "eu.gcr.io/foo/bar:v1", Provider::Gcr),
            ("artifact registry", "europe-west1-docker.pkg.dev/proj/repo/img:v1", Provider::Gcr),
            ("acr", "foo.azurecr.io/bar:v1", Provider::Azure),
            ("docker.io", "foo/bar:v1", Provider::Generic),
            ("ghcr", "ghcr.io/foo/bar:v1", Provider::Generic),
            ("ecr missing account", "dkr.ecr.us-east-1.amazonaws.com/foo:v1", Provider::Generic),
            ("ecr short account", "0123.dkr.ecr.us-east-1.amazonaws.com/foo:v1", Provider::Generic),
        ];

        for (name, image, want) in cases {
            let reference = parse_reference(image).unwrap();
            assert_eq!(image_registry_provider(image, &reference), want, "{}", name);
        }
    }
}
