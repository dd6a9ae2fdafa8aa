//! Gateway access policies
//!
//! A [`PolicyBuilder`] collects allowed and denied methods for the API named
//! by a [`ResourceDescriptor`] and renders them into the policy document the
//! gateway evaluates.

use std::{fmt, str::FromStr};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    response::{AuthorizerResponse, PolicyDocument, Statement},
    PolicyError, ResourceDescriptor,
};

static RESOURCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[/.a-zA-Z0-9*-]+$").expect("resource pattern is a valid regex"));

/// An HTTP verb that a policy can grant or deny
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `HEAD`
    Head,
    /// `DELETE`
    Delete,
    /// `OPTIONS`
    Options,
    /// Any verb (`*`)
    All,
}

impl Verb {
    /// The verb as it appears in a resource ARN
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
            Self::All => "*",
        }
    }
}

impl FromStr for Verb {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "HEAD" => Ok(Self::Head),
            "DELETE" => Ok(Self::Delete),
            "OPTIONS" => Ok(Self::Options),
            "*" => Ok(Self::All),
            other => Err(PolicyError::InvalidVerb(other.to_owned())),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a statement grants or refuses access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    /// Access is granted
    Allow,
    /// Access is refused
    Deny,
}

impl Effect {
    /// Parses an effect name, ignoring case
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("allow") {
            Some(Self::Allow)
        } else if name.eq_ignore_ascii_case("deny") {
            Some(Self::Deny)
        } else {
            None
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Allow => "Allow",
            Self::Deny => "Deny",
        })
    }
}

/// A validated method added to a policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodEntry {
    resource_arn: String,
    conditions: Vec<String>,
    condition_block: Map<String, Value>,
}

impl MethodEntry {
    /// The resource ARN the entry applies to
    #[must_use]
    pub fn resource_arn(&self) -> &str {
        &self.resource_arn
    }

    /// The conditions attached to the entry
    #[must_use]
    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }
}

/// Accumulates allowed and denied methods for one API stage
#[derive(Debug, Clone)]
#[must_use]
pub struct PolicyBuilder {
    partition: String,
    region: String,
    account_id: String,
    api_id: String,
    stage: String,
    allow: Vec<MethodEntry>,
    deny: Vec<MethodEntry>,
}

impl PolicyBuilder {
    /// Starts an empty policy for the API stage named by `descriptor`
    pub fn new(descriptor: &ResourceDescriptor) -> Self {
        Self {
            partition: descriptor.partition().to_owned(),
            region: descriptor.region().to_owned(),
            account_id: descriptor.account_id().to_owned(),
            api_id: descriptor.api_id().to_owned(),
            stage: descriptor.stage().to_owned(),
            allow: Vec::new(),
            deny: Vec::new(),
        }
    }

    /// Adds a method by effect and verb name
    ///
    /// The effect name is matched without regard to case. An effect other
    /// than `allow` or `deny` adds nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the verb is not a supported verb, the resource
    /// path contains characters outside `[A-Za-z0-9./*-]`, or a condition is
    /// not a condition block.
    pub fn add_method(
        &mut self,
        effect: &str,
        verb: &str,
        resource: &str,
        conditions: Vec<String>,
    ) -> Result<(), PolicyError> {
        let verb: Verb = verb.parse()?;
        let entry = self.entry(verb, resource, conditions)?;

        match Effect::from_name(effect) {
            Some(Effect::Allow) => self.allow.push(entry),
            Some(Effect::Deny) => self.deny.push(entry),
            None => tracing::warn!(effect, "ignoring method with unknown effect"),
        }

        Ok(())
    }

    /// Allows a method on a resource path
    ///
    /// # Errors
    ///
    /// Returns an error if the resource path is invalid.
    pub fn allow_method(&mut self, verb: Verb, resource: &str) -> Result<(), PolicyError> {
        self.allow_method_with_conditions(verb, resource, Vec::new())
    }

    /// Denies a method on a resource path
    ///
    /// # Errors
    ///
    /// Returns an error if the resource path is invalid.
    pub fn deny_method(&mut self, verb: Verb, resource: &str) -> Result<(), PolicyError> {
        self.deny_method_with_conditions(verb, resource, Vec::new())
    }

    /// Allows a method on a resource path under the given conditions
    ///
    /// Each condition is a JSON condition block, for example
    /// `{"IpAddress": {"aws:SourceIp": "203.0.113.0/24"}}`. The blocks are
    /// merged into the statement's `Condition`.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource path or a condition is invalid.
    pub fn allow_method_with_conditions(
        &mut self,
        verb: Verb,
        resource: &str,
        conditions: Vec<String>,
    ) -> Result<(), PolicyError> {
        let entry = self.entry(verb, resource, conditions)?;
        self.allow.push(entry);
        Ok(())
    }

    /// Denies a method on a resource path under the given conditions
    ///
    /// # Errors
    ///
    /// Returns an error if the resource path or a condition is invalid.
    pub fn deny_method_with_conditions(
        &mut self,
        verb: Verb,
        resource: &str,
        conditions: Vec<String>,
    ) -> Result<(), PolicyError> {
        let entry = self.entry(verb, resource, conditions)?;
        self.deny.push(entry);
        Ok(())
    }

    /// Allows every verb on every resource of the stage
    pub fn allow_all_methods(&mut self) {
        let entry = self.unconditional(Verb::All, "*");
        self.allow.push(entry);
    }

    /// Denies every verb on every resource of the stage
    pub fn deny_all_methods(&mut self) {
        let entry = self.unconditional(Verb::All, "*");
        self.deny.push(entry);
    }

    /// The allowed methods, in insertion order
    #[must_use]
    pub fn allowed(&self) -> &[MethodEntry] {
        &self.allow
    }

    /// The denied methods, in insertion order
    #[must_use]
    pub fn denied(&self) -> &[MethodEntry] {
        &self.deny
    }

    /// Renders the collected methods into an authorizer response
    ///
    /// Unconditional methods of each effect share one statement. Each
    /// conditional method gets a statement of its own. Allow statements
    /// precede deny statements.
    ///
    /// # Errors
    ///
    /// Returns an error if no method has been added.
    pub fn build(&self, principal_id: &str) -> Result<AuthorizerResponse, PolicyError> {
        if self.allow.is_empty() && self.deny.is_empty() {
            return Err(PolicyError::EmptyPolicy {
                principal_id: principal_id.to_owned(),
            });
        }

        let mut statements = statements_for(Effect::Allow, &self.allow);
        statements.extend(statements_for(Effect::Deny, &self.deny));

        Ok(AuthorizerResponse::new(
            principal_id,
            PolicyDocument::new(statements),
        ))
    }

    fn entry(
        &self,
        verb: Verb,
        resource: &str,
        conditions: Vec<String>,
    ) -> Result<MethodEntry, PolicyError> {
        if !RESOURCE_PATTERN.is_match(resource) {
            return Err(PolicyError::InvalidResourcePattern(resource.to_owned()));
        }

        let condition_block = condition_block(&conditions)?;

        Ok(MethodEntry {
            resource_arn: self.resource_arn(verb, resource),
            conditions,
            condition_block,
        })
    }

    fn unconditional(&self, verb: Verb, resource: &str) -> MethodEntry {
        MethodEntry {
            resource_arn: self.resource_arn(verb, resource),
            conditions: Vec::new(),
            condition_block: Map::new(),
        }
    }

    fn resource_arn(&self, verb: Verb, resource: &str) -> String {
        let resource = resource.strip_prefix('/').unwrap_or(resource);
        format!(
            "arn:{}:execute-api:{}:{}:{}/{}/{}/{}",
            self.partition, self.region, self.account_id, self.api_id, self.stage, verb, resource,
        )
    }
}

/// Merges condition blocks into one, keyed by condition operator
///
/// Each condition is a JSON object mapping operators to their context keys,
/// such as `{"IpAddress": {"aws:SourceIp": "203.0.113.0/24"}}`.
fn condition_block(conditions: &[String]) -> Result<Map<String, Value>, PolicyError> {
    let mut block = Map::new();

    for condition in conditions {
        let invalid = || PolicyError::InvalidCondition(condition.clone());

        let operators: Map<String, Value> =
            serde_json::from_str(condition).map_err(|_| invalid())?;
        if operators.is_empty() {
            return Err(invalid());
        }

        for (operator, keys) in operators {
            let keys = match keys {
                Value::Object(keys) if !keys.is_empty() => keys,
                _ => return Err(invalid()),
            };

            if let Value::Object(existing) = block
                .entry(operator)
                .or_insert_with(|| Value::Object(Map::new()))
            {
                existing.extend(keys);
            }
        }
    }

    Ok(block)
}

fn statements_for(effect: Effect, entries: &[MethodEntry]) -> Vec<Statement> {
    let mut statements: Vec<Statement> = Vec::new();
    let mut shared: Option<usize> = None;

    for entry in entries {
        if entry.condition_block.is_empty() {
            match shared {
                Some(idx) => statements[idx].add_resource(&entry.resource_arn),
                None => {
                    shared = Some(statements.len());
                    statements.push(Statement::new(effect, &entry.resource_arn));
                }
            }
        } else {
            statements.push(
                Statement::new(effect, &entry.resource_arn)
                    .with_conditions(entry.condition_block.clone()),
            );
        }
    }

    statements
}
