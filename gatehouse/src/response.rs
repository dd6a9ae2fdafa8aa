//! Gateway authorizer events and responses

use gatehouse_jose::Jwt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::policy::Effect;

/// The policy language version understood by the gateway
pub const POLICY_VERSION: &str = "2012-10-17";

/// The only action a gateway policy grants
pub const INVOKE_ACTION: &str = "execute-api:Invoke";

/// A token authorizer event delivered by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerRequest {
    /// The event type, `TOKEN` for token authorizers
    #[serde(rename = "type")]
    pub kind: String,
    /// The value of the identity source header
    pub authorization_token: Jwt,
    /// The method identifier of the call being authorized
    pub method_arn: String,
}

/// The decision returned to the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerResponse {
    principal_id: String,
    policy_document: PolicyDocument,
}

impl AuthorizerResponse {
    pub(crate) fn new(principal_id: &str, policy_document: PolicyDocument) -> Self {
        Self {
            principal_id: principal_id.to_owned(),
            policy_document,
        }
    }

    /// The principal the decision applies to
    #[must_use]
    pub fn principal_id(&self) -> &str {
        &self.principal_id
    }

    /// The policy the gateway enforces
    #[must_use]
    pub fn policy_document(&self) -> &PolicyDocument {
        &self.policy_document
    }
}

/// A gateway access policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    version: String,
    #[serde(rename = "Statement")]
    statements: Vec<Statement>,
}

impl PolicyDocument {
    pub(crate) fn new(statements: Vec<Statement>) -> Self {
        Self {
            version: POLICY_VERSION.to_owned(),
            statements,
        }
    }

    /// The policy language version
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The statements of the policy, allow statements first
    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Every resource granted by an allow statement
    pub fn allowed_resources(&self) -> impl Iterator<Item = &str> {
        self.resources_for(Effect::Allow)
    }

    /// Every resource refused by a deny statement
    pub fn denied_resources(&self) -> impl Iterator<Item = &str> {
        self.resources_for(Effect::Deny)
    }

    fn resources_for(&self, effect: Effect) -> impl Iterator<Item = &str> {
        self.statements
            .iter()
            .filter(move |s| s.effect == effect)
            .flat_map(|s| s.resources.iter().map(String::as_str))
    }
}

/// A single statement of a policy document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    #[serde(rename = "Action")]
    action: Vec<String>,
    #[serde(rename = "Effect")]
    effect: Effect,
    #[serde(rename = "Resource")]
    resources: Vec<String>,
    #[serde(rename = "Condition", default, skip_serializing_if = "Map::is_empty")]
    conditions: Map<String, Value>,
}

impl Statement {
    pub(crate) fn new(effect: Effect, resource: &str) -> Self {
        Self {
            action: vec![INVOKE_ACTION.to_owned()],
            effect,
            resources: vec![resource.to_owned()],
            conditions: Map::new(),
        }
    }

    pub(crate) fn with_conditions(self, conditions: Map<String, Value>) -> Self {
        Self { conditions, ..self }
    }

    /// Adds a resource unless the statement already names it
    pub(crate) fn add_resource(&mut self, resource: &str) {
        if !self.resources.iter().any(|r| r == resource) {
            self.resources.push(resource.to_owned());
        }
    }

    /// The actions covered by the statement
    #[must_use]
    pub fn actions(&self) -> &[String] {
        &self.action
    }

    /// Whether the statement grants or refuses access
    #[must_use]
    pub fn effect(&self) -> Effect {
        self.effect
    }

    /// The resources the statement applies to
    #[must_use]
    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    /// The condition block of the statement, keyed by condition operator
    #[must_use]
    pub fn conditions(&self) -> &Map<String, Value> {
        &self.conditions
    }
}
