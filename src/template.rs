use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// A CloudFormation template. Maps are ordered so that synthesized JSON is
/// deterministic and diffs against the deployed template stay readable.
#[derive(Debug, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub version: String,
    #[serde(rename = "Description", skip_serializing_if = "String::is_empty", default)]
    pub description: String,
    #[serde(rename = "Parameters", skip_serializing_if = "BTreeMap::is_empty", default)]
    pub parameters: BTreeMap<String, ParameterDef>,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, Resource>,
    #[serde(rename = "Outputs", skip_serializing_if = "BTreeMap::is_empty", default)]
    pub outputs: BTreeMap<String, TemplateOutput>,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            version: "2010-09-09".to_string(),
            description: String::new(),
            parameters: Default::default(),
            resources: Default::default(),
            outputs: Default::default(),
        }
    }
}

impl Template {
    pub fn new(description: &str) -> Self {
        Self {
            description: description.to_string(),
            ..Default::default()
        }
    }

    pub fn parameter(&mut self, name: &str, description: &str) {
        self.parameters.insert(
            name.to_string(),
            ParameterDef {
                ty: "String".to_string(),
                description: description.to_string(),
            },
        );
    }

    /// Adds a resource, serializing its typed properties into the template.
    pub fn resource(&mut self, logical_id: &str, type_string: &str, properties: impl Serialize) -> Result<()> {
        let resource = Resource {
            ty: type_string.to_string(),
            properties: serde_json::to_value(properties)?,
        };
        self.resources.insert(logical_id.to_string(), resource);
        Ok(())
    }

    pub fn output(&mut self, name: &str, description: &str, value: Value) {
        self.outputs.insert(
            name.to_string(),
            TemplateOutput {
                description: description.to_string(),
                value,
            },
        );
    }

    /// Pretty so that if a user needs to look at the stack in the
    /// CloudFormation console, it looks nice.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Properties")]
    pub properties: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ParameterDef {
    #[serde(rename = "Type")]
    pub ty: String,
    #[serde(rename = "Description")]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TemplateOutput {
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Value")]
    pub value: Value,
}

/// `{ "Ref": name }`
pub fn get_ref(name: &str) -> Value {
    serde_json::json!({ "Ref": name })
}

/// `{ "Fn::GetAtt": [name, attr] }`
pub fn get_att(name: &str, attr: &str) -> Value {
    serde_json::json!({ "Fn::GetAtt": [name, attr] })
}

/// `{ "Fn::Sub": expr }`
pub fn sub(expr: &str) -> Value {
    serde_json::json!({ "Fn::Sub": expr })
}

/// A stack name can contain only alphanumeric characters (case sensitive)
/// and hyphens. It must start with an alphabetical character and can't be
/// longer than 128 characters. Underscores are normalized to hyphens.
pub fn validate_stack_name(name: &str) -> Result<String> {
    let mut stack_name = name.to_string();
    stack_name = stack_name.replace('_', "-");
    stack_name.truncate(128);
    let restriction = "must only consist of alphanumeric characters and hyphens, must start with an alphabetical character, and cannot be longer than 128 characters";
    for (i, c) in stack_name.chars().enumerate() {
        if i == 0 && !c.is_ascii_alphabetic() {
            return Err(Error::InvalidStackName {
                name: stack_name.clone(),
                reason: restriction.to_string(),
            });
        }
        if !c.is_ascii_alphanumeric() && c != '-' {
            return Err(Error::InvalidStackName {
                name: stack_name.clone(),
                reason: restriction.to_string(),
            });
        }
    }
    Ok(stack_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_name_underscores_become_hyphens() {
        assert_eq!(validate_stack_name("my_site_cert").unwrap(), "my-site-cert");
    }

    #[test]
    fn stack_name_must_start_with_a_letter() {
        assert!(validate_stack_name("1site").is_err());
        assert!(validate_stack_name("-site").is_err());
        assert!(validate_stack_name("site-1").is_ok());
    }

    #[test]
    fn stack_name_rejects_other_punctuation() {
        assert!(validate_stack_name("demo.example.com").is_err());
        assert!(validate_stack_name("demo example").is_err());
    }

    #[test]
    fn stack_name_truncates_to_128() {
        let long = "a".repeat(200);
        assert_eq!(validate_stack_name(&long).unwrap().len(), 128);
    }

    #[test]
    fn intrinsics_have_cfn_shape() {
        assert_eq!(get_ref("Bucket"), serde_json::json!({"Ref": "Bucket"}));
        assert_eq!(
            get_att("Distribution", "DomainName"),
            serde_json::json!({"Fn::GetAtt": ["Distribution", "DomainName"]})
        );
        assert_eq!(
            sub("arn:aws:s3:::${Bucket}/*"),
            serde_json::json!({"Fn::Sub": "arn:aws:s3:::${Bucket}/*"})
        );
    }

    #[test]
    fn template_serializes_with_cfn_keys() {
        let mut t = Template::new("test template");
        t.parameter("HostedZoneId", "zone");
        t.resource(
            "Thing",
            "AWS::S3::Bucket",
            serde_json::json!({"BucketName": "x"}),
        )
        .unwrap();
        t.output("Out", "an output", get_ref("Thing"));
        let v: Value = serde_json::from_str(&t.to_json().unwrap()).unwrap();
        assert_eq!(v["AWSTemplateFormatVersion"], "2010-09-09");
        assert_eq!(v["Parameters"]["HostedZoneId"]["Type"], "String");
        assert_eq!(v["Resources"]["Thing"]["Type"], "AWS::S3::Bucket");
        assert_eq!(v["Resources"]["Thing"]["Properties"]["BucketName"], "x");
        assert_eq!(v["Outputs"]["Out"]["Value"], get_ref("Thing"));
    }
}
