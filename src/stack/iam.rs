//! IAM roles and inline policies.

use serde::Serialize;

use crate::error::AssemblyError;
use crate::template::{ConstructPath, Expr, Resource};

use super::Stack;

/// IAM role resource type.
pub const ROLE_TYPE: &str = "AWS::IAM::Role";

/// IAM policy resource type.
pub const POLICY_TYPE: &str = "AWS::IAM::Policy";

const POLICY_VERSION: &str = "2012-10-17";

/// A policy document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    version: &'static str,
    statement: Vec<PolicyStatement>,
}

/// A single `Allow` statement.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    action: Vec<String>,
    effect: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    principal: Option<ServicePrincipal>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    resource: Vec<Expr>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ServicePrincipal {
    service: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RoleProperties {
    assume_role_policy_document: PolicyDocument,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    managed_policy_arns: Vec<Expr>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PolicyProperties {
    policy_document: PolicyDocument,
    policy_name: String,
    roles: Vec<Expr>,
}

impl PolicyDocument {
    /// Creates a document from statements.
    #[must_use]
    pub const fn new(statement: Vec<PolicyStatement>) -> Self {
        Self {
            version: POLICY_VERSION,
            statement,
        }
    }
}

impl PolicyStatement {
    /// Allows `actions` on `resources`.
    #[must_use]
    pub fn allow(actions: &[&str], resources: Vec<Expr>) -> Self {
        Self {
            action: actions.iter().map(|a| (*a).to_string()).collect(),
            effect: "Allow",
            principal: None,
            resource: resources,
        }
    }

    /// Lets a service principal assume the role.
    #[must_use]
    pub fn assume_role(service: &str) -> Self {
        Self {
            action: vec![String::from("sts:AssumeRole")],
            effect: "Allow",
            principal: Some(ServicePrincipal {
                service: service.to_string(),
            }),
            resource: Vec::new(),
        }
    }
}

/// Handle to a role in the stack.
#[derive(Debug, Clone)]
pub struct RoleHandle {
    /// Logical id of the role.
    pub logical_id: String,
    path: ConstructPath,
}

impl RoleHandle {
    /// `Fn::GetAtt Role.Arn`.
    #[must_use]
    pub fn arn(&self) -> Expr {
        Expr::get_att(&self.logical_id, "Arn")
    }
}

/// Adds a role assumable by `service` with the given managed policies.
///
/// `path` is the role construct; the resource lives below it.
pub(super) fn service_role(
    stack: &mut Stack,
    path: &ConstructPath,
    service: &str,
    managed_policies: &[&str],
) -> Result<RoleHandle, AssemblyError> {
    let props = RoleProperties {
        assume_role_policy_document: PolicyDocument::new(vec![PolicyStatement::assume_role(service)]),
        managed_policy_arns: managed_policies
            .iter()
            .map(|name| Expr::managed_policy_arn(name))
            .collect(),
    };

    let logical_id = stack.add(
        &path.child("Resource"),
        Resource::from_properties(ROLE_TYPE, &props)?,
    )?;
    Ok(RoleHandle {
        logical_id,
        path: path.clone(),
    })
}

/// Attaches the role's default inline policy and returns its logical id.
pub(super) fn default_policy(
    stack: &mut Stack,
    role: &RoleHandle,
    statements: Vec<PolicyStatement>,
) -> Result<String, AssemblyError> {
    let path = role.path.child("DefaultPolicy");
    let policy_name = path.logical_id();

    let props = PolicyProperties {
        policy_document: PolicyDocument::new(statements),
        policy_name,
        roles: vec![Expr::reference(&role.logical_id)],
    };

    stack.add(&path.child("Resource"), Resource::from_properties(POLICY_TYPE, &props)?)
}
