//! Configuration validation for request documents.
//!
//! Validation runs over the untyped document so that every problem can be
//! collected into one [`ValidationReport`] instead of stopping at the first
//! serde error. The passes are, in order: environment interpolation, the
//! provider tag, top-level fields, variant detection for both sections,
//! section shape checks, typed deserialization and finally the field rules
//! declared on the typed sections.

use crate::error::{ConfigError, ComputeError, DispatchError, Result};
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use super::aws::{AwsAccessKey, Ec2Config};
use super::azure::{AvmConfig, AzureAccessKey};
use super::gcp::{GceConfig, GcpAccessKey};
use super::interpolate::{interpolate, EnvLookup, ProcessEnv};
use super::schema::{FieldKind, FieldSpec, Schema};
use super::spec::{AuthConfig, ComputeRequest, ComputeType, ProviderConfig};

const TOP_LEVEL_FIELDS: &[&str] = &["compute_name", "compute_type", "compute_config", "auth_config"];

/// A single validation issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dotted path of the offending value (empty for the whole document).
    pub field: String,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    /// Creates an issue for `field`.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.field.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

/// Every issue found in a document, plus non-fatal warnings.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Issues that make the document invalid.
    pub issues: Vec<ValidationIssue>,
    /// Non-fatal observations.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Returns true if no issues were found.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// Returns the number of issues.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.issues.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Returns true if an issue was recorded for exactly `field`.
    #[must_use]
    pub fn has_issue(&self, field: &str) -> bool {
        self.issues.iter().any(|issue| issue.field == field)
    }

    fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue::new(field, message));
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.issues.len();
        write!(
            f,
            "{count} validation issue{}",
            if count == 1 { "" } else { "s" }
        )?;
        for issue in &self.issues {
            write!(f, "\n  - {issue}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
enum EnvSource {
    #[default]
    Process,
    Fixed(HashMap<String, String>),
}

impl EnvSource {
    fn as_lookup(&self) -> &dyn EnvLookup {
        match self {
            Self::Process => &ProcessEnv,
            Self::Fixed(vars) => vars,
        }
    }
}

/// Validator for request documents.
#[derive(Debug, Default)]
pub struct ConfigValidator {
    env: EnvSource,
}

impl ConfigValidator {
    /// Creates a validator that interpolates from the process environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a validator that interpolates from a fixed set of variables.
    #[must_use]
    pub fn with_env_vars(vars: HashMap<String, String>) -> Self {
        Self {
            env: EnvSource::Fixed(vars),
        }
    }

    /// Validates a document and builds the typed request.
    ///
    /// Warnings are logged.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnsupportedProvider`] if `compute_type` is an
    /// unknown tag, otherwise [`ConfigError::Validation`] listing every issue.
    pub fn validate(&self, raw: &Value) -> Result<ComputeRequest> {
        let (request, warnings) = self.validate_with_warnings(raw)?;
        for warning in &warnings {
            warn!("{warning}");
        }
        Ok(request)
    }

    /// Validates a document, returning the request and any warnings.
    ///
    /// # Errors
    ///
    /// Same as [`ConfigValidator::validate`].
    pub fn validate_with_warnings(&self, raw: &Value) -> Result<(ComputeRequest, Vec<String>)> {
        let mut doc = raw.clone();
        let mut report = ValidationReport::default();

        let interpolation = interpolate(&mut doc, self.env.as_lookup());
        let unresolved: HashSet<String> = interpolation
            .issues
            .iter()
            .map(|issue| issue.field.clone())
            .collect();
        let whole = &interpolation.whole_placeholders;
        report.issues.extend(interpolation.issues.iter().cloned());

        let Value::Mapping(root) = &doc else {
            report.push("", "document must be a mapping of compute_name, compute_type, compute_config and auth_config");
            return Err(invalid(report));
        };

        let compute_type = Self::check_compute_type(root, &unresolved, &mut report)?;
        let compute_name = Self::check_compute_name(root, &unresolved, &mut report);

        for key in root.keys() {
            let name = key.as_str().unwrap_or_default();
            if !TOP_LEVEL_FIELDS.contains(&name) {
                report.push(name, "unknown field");
            }
        }

        let compute_config = section(root, "compute_config", &mut report)
            .and_then(|map| check_provider_config(map, compute_type, whole, &mut report));
        let auth_config = section(root, "auth_config", &mut report)
            .and_then(|map| check_auth_config(map, compute_type, whole, &mut report));

        report
            .issues
            .retain(|issue| !unresolved.contains(&issue.field) || is_interpolation(issue));

        if let (Some(config), Some(auth)) = (&compute_config, &auth_config) {
            cross_field_warnings(config, auth, &mut report);
        }

        match (compute_name, compute_type, compute_config, auth_config) {
            (Some(compute_name), Some(compute_type), Some(compute_config), Some(auth_config))
                if report.is_valid() =>
            {
                debug!("Configuration validation passed");
                Ok((
                    ComputeRequest {
                        compute_name,
                        compute_type,
                        compute_config,
                        auth_config,
                    },
                    report.warnings,
                ))
            }
            _ => Err(invalid(report)),
        }
    }

    fn check_compute_type(
        root: &Mapping,
        unresolved: &HashSet<String>,
        report: &mut ValidationReport,
    ) -> Result<Option<ComputeType>> {
        match root.get("compute_type") {
            None | Some(Value::Null) => {
                report.push("compute_type", "missing required field");
                Ok(None)
            }
            Some(Value::String(_)) if unresolved.contains("compute_type") => Ok(None),
            Some(Value::String(tag)) => tag.parse::<ComputeType>().map(Some).map_err(|_| {
                ComputeError::Dispatch(DispatchError::UnsupportedProvider { tag: tag.clone() })
            }),
            Some(other) => {
                report.push(
                    "compute_type",
                    format!("expected a string, found {}", type_name(other)),
                );
                Ok(None)
            }
        }
    }

    fn check_compute_name(
        root: &Mapping,
        unresolved: &HashSet<String>,
        report: &mut ValidationReport,
    ) -> Option<String> {
        match root.get("compute_name") {
            None | Some(Value::Null) => {
                report.push("compute_name", "missing required field");
                None
            }
            Some(Value::String(_)) if unresolved.contains("compute_name") => None,
            Some(Value::String(name)) if name.trim().is_empty() => {
                report.push("compute_name", "cannot be empty");
                None
            }
            Some(Value::String(name)) => Some(name.clone()),
            Some(other) => {
                report.push(
                    "compute_name",
                    format!("expected a string, found {}", type_name(other)),
                );
                None
            }
        }
    }
}

/// Interpolation issues are kept even though their path is in the unresolved set.
fn is_interpolation(issue: &ValidationIssue) -> bool {
    issue.message.contains("environment variable") || issue.message.contains("placeholder")
}

fn invalid(report: ValidationReport) -> ComputeError {
    ComputeError::Config(ConfigError::Validation(report))
}

fn section<'a>(root: &'a Mapping, key: &str, report: &mut ValidationReport) -> Option<&'a Mapping> {
    match root.get(key) {
        None | Some(Value::Null) => {
            report.push(key, "missing required field");
            None
        }
        Some(Value::Mapping(map)) => Some(map),
        Some(other) => {
            report.push(key, format!("expected a mapping, found {}", type_name(other)));
            None
        }
    }
}

fn check_provider_config(
    map: &Mapping,
    compute_type: Option<ComputeType>,
    whole: &HashSet<String>,
    report: &mut ValidationReport,
) -> Option<ProviderConfig> {
    const PATH: &str = "compute_config";
    let candidates = [
        (ComputeType::Ec2, <Ec2Config as Schema>::MARKERS),
        (ComputeType::Gce, <GceConfig as Schema>::MARKERS),
        (ComputeType::Avm, <AvmConfig as Schema>::MARKERS),
    ];
    let variant = resolve_variant(map, &candidates, compute_type, PATH, report)?;
    match variant {
        ComputeType::Ec2 => {
            check_section::<Ec2Config>(map, PATH, whole, report).map(ProviderConfig::Ec2)
        }
        ComputeType::Gce => {
            check_section::<GceConfig>(map, PATH, whole, report).map(ProviderConfig::Gce)
        }
        ComputeType::Avm => {
            check_section::<AvmConfig>(map, PATH, whole, report).map(ProviderConfig::Avm)
        }
    }
}

fn check_auth_config(
    map: &Mapping,
    compute_type: Option<ComputeType>,
    whole: &HashSet<String>,
    report: &mut ValidationReport,
) -> Option<AuthConfig> {
    const PATH: &str = "auth_config";
    let candidates = [
        (ComputeType::Ec2, <AwsAccessKey as Schema>::MARKERS),
        (ComputeType::Gce, <GcpAccessKey as Schema>::MARKERS),
        (ComputeType::Avm, <AzureAccessKey as Schema>::MARKERS),
    ];
    let variant = resolve_variant(map, &candidates, compute_type, PATH, report)?;
    match variant {
        ComputeType::Ec2 => {
            check_section::<AwsAccessKey>(map, PATH, whole, report).map(AuthConfig::Aws)
        }
        ComputeType::Gce => {
            check_section::<GcpAccessKey>(map, PATH, whole, report).map(AuthConfig::Gcp)
        }
        ComputeType::Avm => {
            check_section::<AzureAccessKey>(map, PATH, whole, report).map(AuthConfig::Azure)
        }
    }
}

/// Picks the variant a section belongs to from its marker keys.
///
/// The variant with the most markers present wins; ties go to the declared
/// provider. A section whose markers point away from the declared provider is
/// a mismatch. A section with no markers is checked against the declared
/// provider so its missing fields get reported.
fn resolve_variant(
    map: &Mapping,
    candidates: &[(ComputeType, &'static [&'static str])],
    declared: Option<ComputeType>,
    path: &str,
    report: &mut ValidationReport,
) -> Option<ComputeType> {
    let score = |markers: &[&str]| markers.iter().filter(|m| map.contains_key(**m)).count();
    let declared_score = declared.map_or(0, |declared| {
        candidates
            .iter()
            .find(|(kind, _)| *kind == declared)
            .map_or(0, |(_, markers)| score(markers))
    });
    let best = candidates
        .iter()
        .map(|(kind, markers)| (*kind, score(markers)))
        .filter(|(_, hits)| *hits > 0)
        .max_by_key(|(_, hits)| *hits);

    match (declared, best) {
        (Some(declared), Some((found, hits))) if found != declared && hits > declared_score => {
            report.push(
                path,
                format!(
                    "section is a {} variant but compute_type is '{declared}'",
                    found.provider_name()
                ),
            );
            None
        }
        (Some(declared), _) => Some(declared),
        (None, Some((found, _))) => Some(found),
        (None, None) => None,
    }
}

/// Checks one section against its field list, then deserializes and applies field rules.
///
/// A count or flag given as a single placeholder is read from its resolved
/// text; every other resolved value stays a string.
fn check_section<T>(
    map: &Mapping,
    path: &str,
    whole: &HashSet<String>,
    report: &mut ValidationReport,
) -> Option<T>
where
    T: Schema + DeserializeOwned + Validate,
{
    let before = report.error_count();
    let mut clean = Mapping::new();

    for (key, value) in map {
        let Some(name) = key.as_str() else {
            report.push(path, format!("non-string key {}", type_name(key)));
            continue;
        };
        let canonical = T::ALIASES
            .iter()
            .find(|(alias, _)| *alias == name)
            .map_or(name, |(_, field)| *field);
        if canonical != name && map.contains_key(canonical) {
            report.push(
                format!("{path}.{name}"),
                format!("'{name}' and '{canonical}' are the same field; give only one"),
            );
            continue;
        }
        if !T::FIELDS.iter().any(|spec| spec.name == canonical) {
            report.push(
                format!("{path}.{name}"),
                format!("unknown field for a {} section", T::VARIANT),
            );
            continue;
        }
        if !value.is_null() {
            clean.insert(Value::from(canonical), value.clone());
        }
    }

    for spec in T::FIELDS {
        let field_path = format!("{path}.{}", spec.name);
        if whole.contains(&field_path) {
            if let Some(value) = clean.get_mut(spec.name) {
                coerce_scalar(spec.kind, value);
            }
        }
        match clean.get(spec.name) {
            None if spec.required => report.push(field_path, "missing required field"),
            None => {}
            Some(value) => check_kind(spec, value, &field_path, report),
        }
    }

    if report.error_count() > before {
        return None;
    }

    let typed: T = match serde_yaml::from_value(Value::Mapping(clean)) {
        Ok(typed) => typed,
        Err(e) => {
            report.push(path, e.to_string());
            return None;
        }
    };

    match typed.validate() {
        Ok(()) => Some(typed),
        Err(errors) => {
            flatten_errors(&errors, path, report);
            None
        }
    }
}

fn coerce_scalar(kind: FieldKind, value: &mut Value) {
    let Some(text) = value.as_str().map(str::trim) else {
        return;
    };
    let scalar = match kind {
        FieldKind::Count => text.parse::<u64>().ok().map(Value::from),
        FieldKind::Flag => text.parse::<bool>().ok().map(Value::from),
        _ => None,
    };
    if let Some(scalar) = scalar {
        *value = scalar;
    }
}

fn check_kind(spec: &FieldSpec, value: &Value, path: &str, report: &mut ValidationReport) {
    let mismatch = |expected: &str| format!("expected {expected}, found {}", type_name(value));
    match spec.kind {
        FieldKind::Text if !value.is_string() => report.push(path, mismatch("a string")),
        FieldKind::Count if value.as_u64().is_none() => {
            report.push(path, mismatch("a non-negative integer"));
        }
        FieldKind::Flag if !value.is_bool() => report.push(path, mismatch("a boolean")),
        FieldKind::TextList => match value.as_sequence() {
            Some(items) => {
                for (index, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        report.push(
                            format!("{path}[{index}]"),
                            format!("expected a string, found {}", type_name(item)),
                        );
                    }
                }
            }
            None => report.push(path, mismatch("a list of strings")),
        },
        FieldKind::Choice { accepts, expected } => match value.as_str() {
            Some(choice) if accepts(choice) => {}
            Some(choice) => report.push(
                path,
                format!("'{choice}' is not accepted (expected one of: {})", expected.join(", ")),
            ),
            None => report.push(path, mismatch("a string")),
        },
        FieldKind::Table if !value.is_mapping() => report.push(path, mismatch("a mapping")),
        _ => {}
    }
}

fn flatten_errors(errors: &ValidationErrors, path: &str, report: &mut ValidationReport) {
    let mut entries: Vec<_> = errors.errors().iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in entries {
        let field: &str = field;
        let field_path = if field == "__all__" {
            path.to_string()
        } else {
            format!("{path}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                for error in list {
                    let message = error
                        .message
                        .as_ref()
                        .map_or_else(|| format!("failed the '{}' rule", error.code), ToString::to_string);
                    report.push(field_path.clone(), message);
                }
            }
            ValidationErrorsKind::Struct(inner) => flatten_errors(inner, &field_path, report),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    flatten_errors(inner, &format!("{field_path}[{index}]"), report);
                }
            }
        }
    }
}

fn cross_field_warnings(config: &ProviderConfig, auth: &AuthConfig, report: &mut ValidationReport) {
    match (config, auth) {
        (ProviderConfig::Ec2(ec2), AuthConfig::Aws(key)) if ec2.region_name != key.region_name => {
            report.warnings.push(format!(
                "compute_config.region_name ({}) differs from auth_config.region_name ({}); launching in {}",
                ec2.region_name, key.region_name, ec2.region_name
            ));
        }
        (ProviderConfig::Gce(gce), AuthConfig::Gcp(key)) if gce.project != key.project_id => {
            report.warnings.push(format!(
                "compute_config.project ({}) differs from auth_config.project_id ({}); the service account needs access to {}",
                gce.project, key.project_id, gce.project
            ));
        }
        _ => {}
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Ec2Ami, Ec2InstanceType, GceMachineType};

    const EC2_DOC: &str = r"
compute_name: web
compute_type: ec2
compute_config:
  image_id: UBUNTU_18_04_LTS
  instance_type: t2.micro
  key_name: k1
  min_instance_count: 1
  max_instance_count: 1
  region_name: us-east-1
auth_config:
  aws_access_key_id: AKIAEXAMPLE
  aws_secret_access_key: secret
  region_name: us-east-1
";

    const GCE_DOC: &str = r"
compute_name: batch
compute_type: gce
compute_config:
  project: my-proj
  zone: us-central1-a
  name: worker-1
  machine_type: n1-standard-2
auth_config:
  project_id: my-proj
  credentials: /secrets/sa.json
";

    const AVM_DOC: &str = r"
compute_name: api
compute_type: avm
compute_config:
  resource_group_name: rg1
  vm_name: vm1
  admin_username: azureuser
  size: Standard_D2s_v3
auth_config:
  subscription_id: sub
  client_id: client
  secret: ${AZ_SECRET}
  tenant: tenant
";

    fn doc(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn validator() -> ConfigValidator {
        ConfigValidator::with_env_vars(HashMap::from([(
            String::from("AZ_SECRET"),
            String::from("s3cr3t"),
        )]))
    }

    fn report_of(err: ComputeError) -> ValidationReport {
        match err {
            ComputeError::Config(ConfigError::Validation(report)) => report,
            other => panic!("expected a validation error, got {other}"),
        }
    }

    #[test]
    fn test_valid_ec2_document() {
        let request = validator().validate(&doc(EC2_DOC)).unwrap();
        assert_eq!(request.compute_type, ComputeType::Ec2);
        let ProviderConfig::Ec2(config) = &request.compute_config else {
            panic!("expected ec2 config");
        };
        assert_eq!(config.image_id, Ec2Ami::Ubuntu1804Lts);
        assert_eq!(config.instance_type, Ec2InstanceType::T2Micro);
        assert!(!config.create_key_pair);
    }

    #[test]
    fn test_gce_defaults_and_credentials_alias() {
        let request = validator().validate(&doc(GCE_DOC)).unwrap();
        let ProviderConfig::Gce(config) = &request.compute_config else {
            panic!("expected gce config");
        };
        assert_eq!(config.machine_type, GceMachineType::N1Standard2);
        assert_eq!(config.disk_type, "pd-standard");
        assert_eq!(config.disk_size, "100GB");
        let AuthConfig::Gcp(key) = &request.auth_config else {
            panic!("expected gcp auth");
        };
        assert_eq!(key.credentials_path, std::path::PathBuf::from("/secrets/sa.json"));
    }

    #[test]
    fn test_avm_default_location_and_interpolated_secret() {
        let request = validator().validate(&doc(AVM_DOC)).unwrap();
        let ProviderConfig::Avm(config) = &request.compute_config else {
            panic!("expected avm config");
        };
        assert_eq!(config.location, "West US");
        let AuthConfig::Azure(key) = &request.auth_config else {
            panic!("expected azure auth");
        };
        assert_eq!(key.secret, "s3cr3t");
    }

    #[test]
    fn test_unknown_provider_fails_before_anything_else() {
        let raw = doc("compute_name: x\ncompute_type: lightsail\n");
        let err = validator().validate(&raw).unwrap_err();
        assert!(matches!(
            err,
            ComputeError::Dispatch(DispatchError::UnsupportedProvider { ref tag }) if tag == "lightsail"
        ));
    }

    #[test]
    fn test_min_greater_than_max_is_rejected() {
        for instance_type in Ec2InstanceType::VARIANTS {
            for region in ["us-east-1", "eu-west-1", "ap-southeast-2"] {
                let source = EC2_DOC
                    .replace("instance_type: t2.micro", &format!("instance_type: {instance_type}"))
                    .replace("region_name: us-east-1", &format!("region_name: {region}"))
                    .replace("min_instance_count: 1", "min_instance_count: 5")
                    .replace("max_instance_count: 1", "max_instance_count: 4");
                let report = report_of(validator().validate(&doc(&source)).unwrap_err());
                assert!(report.has_issue("compute_config"), "{instance_type} in {region}");
                assert!(report.to_string().contains("min_instance_count (5)"));
            }
        }
    }

    #[test]
    fn test_zero_instance_count_is_rejected() {
        let raw = doc(&EC2_DOC
            .replace("min_instance_count: 1", "min_instance_count: 0")
            .replace("max_instance_count: 1", "max_instance_count: 0"));
        let report = report_of(validator().validate(&raw).unwrap_err());
        assert!(report.has_issue("compute_config.min_instance_count"));
        assert!(report.has_issue("compute_config.max_instance_count"));
    }

    #[test]
    fn test_variant_mismatch_is_an_issue_not_a_coercion() {
        let raw = doc(&EC2_DOC.replace("compute_type: ec2", "compute_type: gce"));
        let report = report_of(validator().validate(&raw).unwrap_err());
        assert!(report.has_issue("compute_config"));
        assert!(report.has_issue("auth_config"));
        assert_eq!(report.error_count(), 2);
    }

    #[test]
    fn test_all_issues_reported_together() {
        let raw = doc(r"
compute_name: web
compute_type: ec2
compute_config:
  image_id: UBUNTU_99_04
  instance_type: t2.gigantic
  min_instance_count: -1
  max_instance_count: 1
  colour: blue
auth_config:
  aws_access_key_id: AKIAEXAMPLE
  region_name: us-east-1
");
        let report = report_of(validator().validate(&raw).unwrap_err());
        for field in [
            "compute_config.image_id",
            "compute_config.instance_type",
            "compute_config.key_name",
            "compute_config.min_instance_count",
            "compute_config.colour",
            "auth_config.aws_secret_access_key",
        ] {
            assert!(report.has_issue(field), "missing issue for {field}: {report}");
        }
    }

    #[test]
    fn test_unresolved_variable_names_field() {
        let raw = doc(AVM_DOC);
        let err = ConfigValidator::with_env_vars(HashMap::new())
            .validate(&raw)
            .unwrap_err();
        let report = report_of(err);
        assert_eq!(report.error_count(), 1);
        assert!(report.has_issue("auth_config.secret"));
    }

    #[test]
    fn test_interpolated_count_becomes_integer() {
        let raw = doc(&EC2_DOC.replace("max_instance_count: 1", "max_instance_count: ${MAX}"));
        let validator =
            ConfigValidator::with_env_vars(HashMap::from([(String::from("MAX"), String::from("3"))]));
        let request = validator.validate(&raw).unwrap();
        let ProviderConfig::Ec2(config) = request.compute_config else {
            panic!("expected ec2 config");
        };
        assert_eq!(config.max_instance_count, 3);
    }

    #[test]
    fn test_interpolated_flag_becomes_boolean() {
        let raw = doc(&EC2_DOC.replace(
            "  region_name: us-east-1\nauth_config",
            "  region_name: us-east-1\n  create_key_pair: ${CREATE_KEY}\nauth_config",
        ));
        let validator = ConfigValidator::with_env_vars(HashMap::from([(
            String::from("CREATE_KEY"),
            String::from("true"),
        )]));
        let request = validator.validate(&raw).unwrap();
        let ProviderConfig::Ec2(config) = request.compute_config else {
            panic!("expected ec2 config");
        };
        assert!(config.create_key_pair);
    }

    #[test]
    fn test_numeric_env_values_stay_text() {
        let validator = ConfigValidator::with_env_vars(HashMap::from([
            (String::from("AZ_SECRET"), String::from("123456")),
            (String::from("VM_NAME"), String::from("2024")),
        ]));
        let raw = doc(&AVM_DOC.replace("vm_name: vm1", "vm_name: ${VM_NAME}"));
        let request = validator.validate(&raw).unwrap();
        let AuthConfig::Azure(key) = &request.auth_config else {
            panic!("expected azure auth");
        };
        assert_eq!(key.secret, "123456");
        let ProviderConfig::Avm(config) = &request.compute_config else {
            panic!("expected avm config");
        };
        assert_eq!(config.vm_name, "2024");
    }

    #[test]
    fn test_non_numeric_count_from_env_is_rejected() {
        let raw = doc(&EC2_DOC.replace("max_instance_count: 1", "max_instance_count: ${MAX}"));
        let validator =
            ConfigValidator::with_env_vars(HashMap::from([(String::from("MAX"), String::from("many"))]));
        let report = report_of(validator.validate(&raw).unwrap_err());
        assert!(report.has_issue("compute_config.max_instance_count"));
    }

    #[test]
    fn test_key_name_must_be_a_plain_file_name() {
        for key_name in ["../../etc/cron.d/evil", "keys/k1", "'..'", "'k1\\x'"] {
            let raw = doc(&EC2_DOC.replace("key_name: k1", &format!("key_name: {key_name}")));
            let report = report_of(validator().validate(&raw).unwrap_err());
            assert!(report.has_issue("compute_config.key_name"), "accepted {key_name}");
        }
    }

    #[test]
    fn test_gce_format_rules() {
        let raw = doc(&GCE_DOC
            .replace("name: worker-1", "name: Worker_1")
            .replace("machine_type: n1-standard-2", "machine_type: n1-standard-2\n  disk_size: 100TB"));
        let report = report_of(validator().validate(&raw).unwrap_err());
        assert!(report.has_issue("compute_config.name"));
        assert!(report.has_issue("compute_config.disk_size"));
    }

    #[test]
    fn test_reserved_admin_username() {
        let raw = doc(&AVM_DOC.replace("admin_username: azureuser", "admin_username: admin"));
        let report = report_of(validator().validate(&raw).unwrap_err());
        assert!(report.has_issue("compute_config.admin_username"));
    }

    #[test]
    fn test_region_mismatch_is_a_warning() {
        let raw = doc(&EC2_DOC.replacen("region_name: us-east-1", "region_name: us-west-2", 1));
        let (request, warnings) = validator().validate_with_warnings(&raw).unwrap();
        let ProviderConfig::Ec2(config) = request.compute_config else {
            panic!("expected ec2 config");
        };
        assert_eq!(config.region_name, "us-west-2");
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_nested_launch_option_rules() {
        let raw = doc(&EC2_DOC.replace(
            "  region_name: us-east-1\nauth_config",
            "  region_name: us-east-1\n  launch_options:\n    block_device_mappings:\n      - device_name: ''\n    metadata_options:\n      http_put_response_hop_limit: 99\nauth_config",
        ));
        let report = report_of(validator().validate(&raw).unwrap_err());
        assert!(report.has_issue("compute_config.launch_options.block_device_mappings[0].device_name"));
        assert!(report.has_issue("compute_config.launch_options.metadata_options.http_put_response_hop_limit"));
    }

    #[test]
    fn test_round_trip_revalidates_to_same_request() {
        let dollar_doc = AVM_DOC.replace("client_id: client", "client_id: c$$${CLIENT_SUFFIX}");
        let validator = ConfigValidator::with_env_vars(HashMap::from([
            (String::from("AZ_SECRET"), String::from("p$$w${not_a_var}")),
            (String::from("CLIENT_SUFFIX"), String::from("$1")),
        ]));
        for source in [EC2_DOC, GCE_DOC, AVM_DOC, dollar_doc.as_str()] {
            let request = validator.validate(&doc(source)).unwrap();
            let yaml = serde_yaml::to_string(&request.to_document().unwrap()).unwrap();
            let again = validator.validate(&doc(&yaml)).unwrap();
            assert_eq!(request, again);
        }

        let request = validator.validate(&doc(&dollar_doc)).unwrap();
        let AuthConfig::Azure(key) = &request.auth_config else {
            panic!("expected azure auth");
        };
        assert_eq!(key.secret, "p$$w${not_a_var}");
        assert_eq!(key.client_id, "c$$1");
    }

    #[test]
    fn test_report_display_lists_every_issue() {
        let mut report = ValidationReport::default();
        report.push("compute_config.key_name", "missing required field");
        report.push("auth_config.secret", "environment variable 'X' is not set");
        let rendered = report.to_string();
        assert!(rendered.starts_with("2 validation issues"));
        assert!(rendered.contains("compute_config.key_name: missing required field"));
        assert!(rendered.contains("auth_config.secret"));
    }
}
