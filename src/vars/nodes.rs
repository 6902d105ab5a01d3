//! Which fields of each spec type are scanned for references

use super::walker::{impl_walk, Field, FieldMut, Keyed, Walk};
use crate::spec::{
    ConfigMapVolumeSource, CsiVolumeSource, EnvFromSource, EnvVar, EnvVarSource, KeySelector,
    KeyToPath, LocalObjectReference, Param, ParamSpec, ParamValue,
    PersistentVolumeClaimVolumeSource, ProjectedVolumeSource, ResultSpec, SecretVolumeSource,
    ServiceAccountTokenProjection, Sidecar, Step, StepActionSpec, StepTemplate, TaskSpec, Volume,
    VolumeMount, VolumeProjection, WhenExpression, WorkspaceDeclaration, WorkspaceUsage,
};

impl Keyed for EnvVar {
    fn key(&self) -> &str {
        &self.name
    }
}

impl Keyed for Param {
    fn key(&self) -> &str {
        &self.name
    }
}

impl Keyed for ParamSpec {
    fn key(&self) -> &str {
        &self.name
    }
}

impl Walk for ParamValue {
    fn fields(&self) -> Vec<Field<'_>> {
        use super::walker::Node;
        let node = match self {
            ParamValue::String(value) => Node::Scalar(value),
            ParamValue::Array(values) => Node::List(values),
            ParamValue::Object(map) => Node::Map(map),
        };
        vec![Field::inline(node)]
    }

    fn fields_mut(&mut self) -> Vec<FieldMut<'_>> {
        use super::walker::NodeMut;
        let node = match self {
            ParamValue::String(value) => NodeMut::Scalar(value),
            ParamValue::Array(values) => NodeMut::List(values),
            ParamValue::Object(map) => NodeMut::Map(map),
        };
        vec![FieldMut::inline(node)]
    }
}

impl Walk for Param {
    fn fields(&self) -> Vec<Field<'_>> {
        self.value.fields()
    }

    fn fields_mut(&mut self) -> Vec<FieldMut<'_>> {
        self.value.fields_mut()
    }
}

impl_walk!(ParamSpec { nested "default" => default });

impl_walk!(ResultSpec { scalar "description" => description });

impl_walk!(WorkspaceDeclaration { scalar "mountPath" => mount_path });

impl_walk!(WorkspaceUsage { scalar "mountPath" => mount_path });

impl_walk!(LocalObjectReference { scalar "name" => name });

impl_walk!(KeySelector {
    scalar "name" => name,
    scalar "key" => key,
});

impl_walk!(EnvVarSource {
    nested "secretKeyRef" => secret_key_ref,
    nested "configMapKeyRef" => config_map_key_ref,
});

impl_walk!(EnvVar {
    inline => value,
    nested "valueFrom" => value_from,
});

impl_walk!(EnvFromSource {
    scalar "prefix" => prefix,
    nested "configMapRef" => config_map_ref,
    nested "secretRef" => secret_ref,
});

impl_walk!(VolumeMount {
    scalar "name" => name,
    scalar "mountPath" => mount_path,
    scalar "subPath" => sub_path,
});

impl_walk!(WhenExpression {
    scalar "input" => input,
    list "values" => values,
    scalar "cel" => cel,
});

impl_walk!(Step {
    scalar "name" => name,
    scalar "image" => image,
    list "command" => command,
    list "args" => args,
    scalar "workingDir" => working_dir,
    keyed "env" => env,
    indexed "envFrom" => env_from,
    indexed "volumeMount" => volume_mounts,
    scalar "imagePullPolicy" => image_pull_policy,
    scalar "script" => script,
    scalar "onError" => on_error,
    indexed "workspaces" => workspaces,
    keyed "params" => params,
    indexed "when" => when,
    indexed "results" => results,
});

impl_walk!(StepTemplate {
    scalar "image" => image,
    list "command" => command,
    list "args" => args,
    scalar "workingDir" => working_dir,
    keyed "env" => env,
    indexed "envFrom" => env_from,
    indexed "volumeMount" => volume_mounts,
});

impl_walk!(Sidecar {
    scalar "name" => name,
    scalar "image" => image,
    list "command" => command,
    list "args" => args,
    scalar "workingDir" => working_dir,
    keyed "env" => env,
    indexed "envFrom" => env_from,
    indexed "volumeMount" => volume_mounts,
    scalar "script" => script,
    indexed "workspaces" => workspaces,
});

impl_walk!(KeyToPath {
    scalar "key" => key,
    scalar "path" => path,
});

impl_walk!(ConfigMapVolumeSource {
    scalar "name" => name,
    indexed "items" => items,
});

impl_walk!(SecretVolumeSource {
    scalar "secretName" => secret_name,
    indexed "items" => items,
});

impl_walk!(PersistentVolumeClaimVolumeSource { scalar "claimName" => claim_name });

impl_walk!(ServiceAccountTokenProjection { scalar "audience" => audience });

impl_walk!(VolumeProjection {
    nested "configMap" => config_map,
    nested "secret" => secret,
    nested "serviceAccountToken" => service_account_token,
});

impl_walk!(ProjectedVolumeSource { indexed "sources" => sources });

impl_walk!(CsiVolumeSource {
    nested "nodePublishSecretRef" => node_publish_secret_ref,
    map "volumeAttributes" => volume_attributes,
});

impl_walk!(Volume {
    scalar "name" => name,
    nested "configMap" => config_map,
    nested "secret" => secret,
    nested "persistentVolumeClaim" => persistent_volume_claim,
    nested "projected" => projected,
    nested "csi" => csi,
});

impl_walk!(TaskSpec {
    keyed "params" => params,
    indexed "steps" => steps,
    nested "stepTemplate" => step_template,
    indexed "sidecars" => sidecars,
    indexed "volumes" => volumes,
    indexed "workspaces" => workspaces,
    indexed "results" => results,
});

impl_walk!(StepActionSpec {
    scalar "image" => image,
    list "command" => command,
    list "args" => args,
    keyed "env" => env,
    scalar "script" => script,
    scalar "workingDir" => working_dir,
    indexed "volumeMount" => volume_mounts,
    keyed "params" => params,
    indexed "results" => results,
});

#[cfg(test)]
mod tests {
    use super::super::walker::leaves;
    use super::*;

    fn paths(root: &dyn Walk) -> Vec<String> {
        leaves(root)
            .filter(|leaf| !leaf.value.is_empty())
            .map(|leaf| leaf.path.to_string())
            .collect()
    }

    #[test]
    fn test_env_value_from_paths() {
        let env = EnvVar {
            name: "TOKEN".to_string(),
            value: String::new(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(KeySelector {
                    name: "$(params.secret)".to_string(),
                    key: "token".to_string(),
                }),
                config_map_key_ref: None,
            }),
        };
        assert_eq!(
            paths(&env),
            vec!["valueFrom.secretKeyRef.name", "valueFrom.secretKeyRef.key"]
        );
    }

    #[test]
    fn test_step_image_pull_policy_walked() {
        let step = Step {
            image_pull_policy: "$(params.policy)".to_string(),
            ..Step::new("s", "img")
        };
        assert_eq!(paths(&step), vec!["name", "image", "imagePullPolicy"]);
    }

    #[test]
    fn test_param_defaults_walked_by_key() {
        let spec = TaskSpec {
            params: vec![
                ParamSpec::new("flags").with_default(ParamValue::array(["-v", "$(params.x)"])),
                ParamSpec::new("repo").with_default(ParamValue::object([("url", "u")])),
            ],
            ..Default::default()
        };
        assert_eq!(
            paths(&spec),
            vec![
                "params[flags].default[0]",
                "params[flags].default[1]",
                "params[repo].default[url]",
            ]
        );
    }

    #[test]
    fn test_volume_sources_walked() {
        let spec = TaskSpec {
            volumes: vec![Volume {
                name: "creds".to_string(),
                secret: Some(SecretVolumeSource {
                    secret_name: "$(params.secret)".to_string(),
                    items: vec![KeyToPath {
                        key: "k".to_string(),
                        path: "p".to_string(),
                    }],
                }),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(
            paths(&spec),
            vec![
                "volumes[0].name",
                "volumes[0].secret.secretName",
                "volumes[0].secret.items[0].key",
                "volumes[0].secret.items[0].path",
            ]
        );
    }
}
