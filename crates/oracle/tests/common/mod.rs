//! Test oracles standing in for a live GraphQL endpoint.

#![allow(dead_code)]

use async_trait::async_trait;
use graphql_oracle::{Config, Executor, GraphQLResponse, OracleError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const BUILTIN_SCALARS: &[&str] = &["String", "ID", "Int", "Float", "Boolean"];

pub fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

pub fn config() -> Config {
    Config::new("http://oracle.test/graphql")
}

fn base_name(signature: &str) -> &str {
    signature.trim_matches(|c| matches!(c, '[' | ']' | '!'))
}

fn is_composite(signature: &str) -> bool {
    !BUILTIN_SCALARS.contains(&base_name(signature))
}

fn did_you_mean(names: &[&str]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("\"{n}\"")).collect();
    match quoted.as_slice() {
        [] => String::new(),
        [one] => format!(" Did you mean {one}?"),
        [one, two] => format!(" Did you mean {one} or {two}?"),
        [init @ .., last] => {
            let head: Vec<String> = init.iter().map(|q| format!("{q}, ")).collect();
            format!(" Did you mean {}or {last}?", head.concat())
        }
    }
}

fn similar<'a>(candidate: &str, known: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    known
        .filter(|name| {
            *name != candidate
                && candidate.len() >= 2
                && (name.starts_with(candidate) || candidate.starts_with(*name))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct FakeField {
    pub name: String,
    pub signature: String,
    pub args: Vec<(String, String)>,
}

impl FakeField {
    pub fn new(name: &str, signature: &str) -> Self {
        Self {
            name: name.to_string(),
            signature: signature.to_string(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, name: &str, signature: &str) -> Self {
        self.args.push((name.to_string(), signature.to_string()));
        self
    }
}

/// A miniature graphql-js style validator for `query { ... }` documents
/// against a single root `Query` type.
#[derive(Debug, Default)]
pub struct FakeServer {
    pub fields: Vec<FakeField>,
    pub mutation: bool,
    /// Fields whose every probe fails with an unexpected server error.
    pub broken: Vec<String>,
    pub log: Mutex<Vec<String>>,
}

impl FakeServer {
    pub fn new(fields: Vec<FakeField>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn field(&self, name: &str) -> Option<&FakeField> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn unknown_field(&self, name: &str) -> String {
        let suggestions = similar(name, self.fields.iter().map(|f| f.name.as_str()));
        format!(
            "Cannot query field \"{name}\" on type \"Query\".{}",
            did_you_mean(&suggestions)
        )
    }

    fn subfields_required(field: &FakeField) -> String {
        format!(
            "Field \"{}\" of type \"{}\" must have a selection of subfields. Did you mean \"{} {{ ... }}\"?",
            field.name, field.signature, field.name
        )
    }

    fn missing_required_args(field: &FakeField, provided: &[&str]) -> Vec<String> {
        field
            .args
            .iter()
            .filter(|(name, signature)| signature.ends_with('!') && !provided.contains(&name.as_str()))
            .map(|(name, signature)| {
                format!(
                    "Field \"{}\" argument \"{name}\" of type \"{signature}\" is required, but it was not provided.",
                    field.name
                )
            })
            .collect()
    }

    fn selection_errors(&self, body: &str) -> Vec<String> {
        let mut errors = Vec::new();
        for word in body.split_whitespace() {
            if self.broken.iter().any(|b| b == word) {
                errors.push("Unexpected error.".to_string());
                continue;
            }
            match self.field(word) {
                None => errors.push(self.unknown_field(word)),
                Some(field) => {
                    errors.extend(Self::missing_required_args(field, &[]));
                    if is_composite(&field.signature) {
                        errors.push(Self::subfields_required(field));
                    }
                }
            }
        }
        errors
    }

    fn nested_selection_errors(&self, name: &str) -> Vec<String> {
        if self.broken.iter().any(|b| b == name) {
            return vec!["Unexpected error.".to_string()];
        }
        match self.field(name) {
            None => vec![self.unknown_field(name)],
            Some(field) if is_composite(&field.signature) => vec![format!(
                "Cannot query field \"lol\" on type \"{}\".",
                base_name(&field.signature)
            )],
            Some(field) => vec![format!(
                "Field \"{name}\" must not have a selection since type \"{}\" has no subfields.",
                field.signature
            )],
        }
    }

    fn argument_errors(&self, name: &str, arguments: &str) -> Vec<String> {
        let Some(field) = self.field(name) else {
            return vec![self.unknown_field(name)];
        };
        let pairs: Vec<(&str, &str)> = arguments
            .split(", ")
            .filter_map(|pair| pair.split_once(": "))
            .collect();

        let mut errors = Vec::new();
        for (arg, value) in &pairs {
            match field.args.iter().find(|(n, _)| n == arg) {
                None => {
                    let suggestions = similar(arg, field.args.iter().map(|(n, _)| n.as_str()));
                    errors.push(format!(
                        "Unknown argument \"{arg}\" on field \"{name}\" of type \"Query\".{}",
                        did_you_mean(&suggestions)
                    ));
                }
                Some((_, signature)) => {
                    let base = base_name(signature);
                    let accepted = match *value {
                        "7" => base == "Int" || base == "Float",
                        "{}" => is_composite(signature),
                        _ => false,
                    };
                    if !accepted {
                        errors.push(format!("Expected type {signature}, found {value}."));
                    }
                }
            }
        }
        let provided: Vec<&str> = pairs.iter().map(|(n, _)| *n).collect();
        errors.extend(Self::missing_required_args(field, &provided));
        if is_composite(&field.signature) {
            errors.push(Self::subfields_required(field));
        }
        errors
    }

    pub fn respond(&self, document: &str) -> GraphQLResponse {
        match document {
            "query { __typename }" => {
                return GraphQLResponse {
                    data: Some(serde_json::json!({ "__typename": "Query" })),
                    errors: None,
                }
            }
            "mutation { __typename }" if self.mutation => {
                return GraphQLResponse {
                    data: Some(serde_json::json!({ "__typename": "Mutation" })),
                    errors: None,
                }
            }
            "mutation { __typename }" => {
                return GraphQLResponse::from_errors(["Schema is not configured for mutations."])
            }
            "subscription { __typename }" => {
                return GraphQLResponse::from_errors(["Schema is not configured for subscriptions."])
            }
            _ => {}
        }

        let Some(body) = document
            .strip_prefix("query { ")
            .and_then(|rest| rest.strip_suffix(" }"))
        else {
            return GraphQLResponse::from_errors(["Syntax Error: Unexpected <EOF>."]);
        };

        let errors = if let Some((name, rest)) = body.split_once('(') {
            let arguments = rest.strip_suffix(')').unwrap_or(rest);
            self.argument_errors(name, arguments)
        } else if let Some(name) = body.strip_suffix(" { lol }") {
            self.nested_selection_errors(name)
        } else {
            self.selection_errors(body)
        };

        if errors.is_empty() {
            GraphQLResponse {
                data: Some(serde_json::json!({})),
                errors: None,
            }
        } else {
            GraphQLResponse::from_errors(errors)
        }
    }
}

#[async_trait]
impl Executor for FakeServer {
    async fn execute(&self, document: &str) -> Result<GraphQLResponse> {
        self.log.lock().unwrap().push(document.to_string());
        Ok(self.respond(document))
    }
}

type Handler = Box<dyn Fn(&str) -> Result<GraphQLResponse> + Send + Sync>;

/// An executor answering from a closure and recording every document.
pub struct Scripted {
    handler: Handler,
    log: Mutex<Vec<String>>,
}

impl Scripted {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str) -> Result<GraphQLResponse> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Answers every document with the same error messages.
    pub fn always(messages: &[&str]) -> Self {
        let messages = words(messages);
        Self::new(move |_| Ok(GraphQLResponse::from_errors(messages.clone())))
    }

    pub fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for Scripted {
    async fn execute(&self, document: &str) -> Result<GraphQLResponse> {
        self.log.lock().unwrap().push(document.to_string());
        (self.handler)(document)
    }
}

/// Wraps a `FakeServer`, holding each request open for a while and
/// recording how many were ever open at once.
#[derive(Debug)]
pub struct Slow {
    pub server: FakeServer,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl Slow {
    pub fn new(server: FakeServer, delay: Duration) -> Self {
        Self {
            server,
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Executor for Slow {
    async fn execute(&self, document: &str) -> Result<GraphQLResponse> {
        let open = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(open, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let response = self.server.execute(document).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

pub fn network_error() -> OracleError {
    OracleError::Network("connection reset".to_string())
}
