//! Probes: crafted documents whose validation errors reveal the schema.
//!
//! Name discovery works on buckets of candidates. Every candidate in a
//! bucket is assumed valid until an error rejects it, and any name the
//! server suggests is added whether or not it was in the bucket. The union
//! of the per-bucket results is the answer.

use crate::classify::{
    self, decode_type_ref, ArgSignal, FieldSignal, InputFieldSignal, ProbeContext,
};
use crate::config::{validate_template, PLACEHOLDER};
use crate::{Config, Executor, GraphQLResponse, OracleError, Result, RootTypenames, TypeRef};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::BTreeSet;
use std::pin::pin;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Field name no sane schema defines, used to provoke a "cannot query
/// field" error naming the enclosing type.
const WRONG_FIELD: &str = "imwrongfield";

/// Scalar literal injected as every argument value. It is valid syntax for
/// any argument and invalid for most types, which is what we want.
const NEUTRAL_VALUE: &str = "7";

/// Which kind of name a bucket probe is looking for.
#[derive(Debug, Clone, Copy)]
enum NameKind {
    Field,
    Argument,
    InputField,
}

impl NameKind {
    fn rejected(self, message: &str) -> Option<&str> {
        match self {
            Self::Field => classify::rejected_field(message),
            Self::Argument => classify::rejected_argument(message),
            Self::InputField => classify::rejected_input_field(message),
        }
    }

    fn confirmed(self, message: &str) -> Vec<String> {
        let unrecognized = match self {
            Self::Field => match classify::classify_field_existence(message) {
                FieldSignal::Suggestions(names) => return names,
                FieldSignal::EmptySelectionRequired | FieldSignal::InvalidField => false,
                FieldSignal::Unrecognized => true,
            },
            Self::Argument => match classify::classify_arg_existence(message) {
                ArgSignal::Suggestions(names) => return names,
                ArgSignal::Skip => false,
                ArgSignal::Unrecognized => true,
            },
            Self::InputField => match classify::classify_input_field_existence(message) {
                InputFieldSignal::Suggestions(names) => return names,
                InputFieldSignal::NoMatch => false,
            },
        };
        if unrecognized {
            tracing::warn!(kind = ?self, error_message = message, "Unknown error message");
        }
        Vec::new()
    }
}

enum BucketOutcome {
    Confirmed(BTreeSet<String>),
    NoSubfields,
}

/// Runs probes against one oracle.
///
/// Every request goes through one limiter holding `concurrency` permits,
/// however the probes above it are nested.
#[derive(Debug)]
pub struct Prober<E> {
    executor: E,
    config: Config,
    permits: Semaphore,
}

impl<E: Executor> Prober<E> {
    pub fn new(executor: E, config: Config) -> Result<Self> {
        config.validate()?;
        let permits = Semaphore::new(config.concurrency);
        Ok(Self {
            executor,
            config,
            permits,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    async fn execute(&self, document: &str) -> Result<GraphQLResponse> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|err| OracleError::Network(err.to_string()))?;
        self.executor.execute(document).await
    }

    /// Sends a document that must fail validation and returns its error
    /// messages.
    async fn expect_errors(&self, document: &str) -> Result<Vec<String>> {
        let response = self.execute(document).await?;
        match response.errors {
            Some(errors) => Ok(errors.into_iter().map(|error| error.message).collect()),
            None => Err(OracleError::MissingErrors {
                document: document.to_string(),
            }),
        }
    }

    async fn probe_bucket<F>(
        &self,
        kind: NameKind,
        bucket: &[String],
        render: &F,
    ) -> Result<BucketOutcome>
    where
        F: Fn(&[String]) -> String,
    {
        let started = Instant::now();
        let document = render(bucket);
        let messages = self.expect_errors(&document).await?;
        tracing::debug!(
            kind = ?kind,
            sent = bucket.len(),
            errors = messages.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Probed bucket"
        );

        let mut confirmed: BTreeSet<String> = bucket.iter().cloned().collect();
        for message in &messages {
            if classify::signals_no_subfields(message) {
                return Ok(BucketOutcome::NoSubfields);
            }
            if let Some(rejected) = kind.rejected(message) {
                confirmed.remove(rejected);
            }
            confirmed.extend(kind.confirmed(message));
        }
        Ok(BucketOutcome::Confirmed(confirmed))
    }

    async fn probe_names<F>(&self, kind: NameKind, wordlist: &[String], render: F) -> Result<BTreeSet<String>>
    where
        F: Fn(&[String]) -> String,
    {
        let mut outcomes = pin!(stream::iter(wordlist.chunks(self.config.bucket_size))
            .map(|bucket| self.probe_bucket(kind, bucket, &render))
            .buffered(self.config.concurrency));

        let mut confirmed = BTreeSet::new();
        while let Some(outcome) = outcomes.try_next().await? {
            match outcome {
                BucketOutcome::Confirmed(names) => confirmed.extend(names),
                BucketOutcome::NoSubfields => {
                    tracing::debug!(kind = ?kind, "Selection has no subfields, stopping");
                    return Ok(BTreeSet::new());
                }
            }
        }
        Ok(confirmed)
    }

    /// Discovers which wordlist entries are fields of the type the template's
    /// placeholder sits in.
    #[tracing::instrument(skip(self, wordlist), fields(words = wordlist.len()))]
    pub async fn probe_field_names(
        &self,
        wordlist: &[String],
        template: &str,
    ) -> Result<BTreeSet<String>> {
        validate_template(template)?;
        let names = self
            .probe_names(NameKind::Field, wordlist, |bucket| {
                template.replace(PLACEHOLDER, &bucket.join(" "))
            })
            .await?;
        tracing::info!(count = names.len(), "Probed field names");
        Ok(names)
    }

    /// Discovers which wordlist entries are arguments of `field`.
    #[tracing::instrument(skip(self, wordlist), fields(words = wordlist.len()))]
    pub async fn probe_arg_names(
        &self,
        field: &str,
        wordlist: &[String],
        template: &str,
    ) -> Result<BTreeSet<String>> {
        validate_template(template)?;
        let names = self
            .probe_names(NameKind::Argument, wordlist, |bucket| {
                template.replace(PLACEHOLDER, &format!("{field}({})", neutral_pairs(bucket)))
            })
            .await?;
        tracing::info!(count = names.len(), "Probed argument names");
        Ok(names)
    }

    /// Discovers which wordlist entries are fields of the input object
    /// taken by `argument` of the mutation field `field`.
    #[tracing::instrument(skip(self, wordlist), fields(words = wordlist.len()))]
    pub async fn probe_input_field_names(
        &self,
        field: &str,
        argument: &str,
        wordlist: &[String],
    ) -> Result<BTreeSet<String>> {
        let names = self
            .probe_names(NameKind::InputField, wordlist, |bucket| {
                format!(
                    "mutation {{ {field}({argument}: {{ {} }}) }}",
                    neutral_pairs(bucket)
                )
            })
            .await?;
        tracing::info!(count = names.len(), "Probed input field names");
        Ok(names)
    }

    /// Returns the first type reference decoded from the documents' errors,
    /// sending each document only if the previous ones decoded nothing.
    ///
    /// With `argument` set, a required-argument message about any other
    /// argument is noise.
    async fn probe_type_ref(
        &self,
        documents: Vec<String>,
        context: ProbeContext,
        argument: Option<&str>,
    ) -> Result<TypeRef> {
        for document in &documents {
            // A valid document (a bare scalar field) has no errors and
            // simply yields no evidence.
            let response = self.execute(document).await?;
            for message in response.messages() {
                let missing = classify::required_argument(message);
                if let (Some(argument), Some(missing)) = (argument, missing) {
                    if missing != argument {
                        tracing::debug!(argument, missing, "Ignoring another required argument");
                        continue;
                    }
                }
                match decode_type_ref(message, context) {
                    Ok(Some(type_ref)) => return Ok(type_ref),
                    Ok(None) => {}
                    Err(unrecognized) => {
                        tracing::warn!(context = ?context, error = %unrecognized, "Unknown error message");
                    }
                }
            }
        }
        Err(OracleError::NoTypeSignatureDecoded { documents })
    }

    /// Discovers the output type of `field`.
    ///
    /// Composite types reject the bare reference, scalar types reject the
    /// bogus selection, so one of the two documents names the type.
    #[tracing::instrument(skip(self))]
    pub async fn probe_field_type(&self, field: &str, template: &str) -> Result<TypeRef> {
        validate_template(template)?;
        let documents = vec![
            template.replace(PLACEHOLDER, field),
            template.replace(PLACEHOLDER, &format!("{field} {{ lol }}")),
        ];
        self.probe_type_ref(documents, ProbeContext::Field, None).await
    }

    /// Discovers the type of argument `arg` of `field`.
    #[tracing::instrument(skip(self))]
    pub async fn probe_arg_type(&self, field: &str, arg: &str, template: &str) -> Result<TypeRef> {
        validate_template(template)?;
        let documents = vec![
            template.replace(PLACEHOLDER, &format!("{field}({arg}: {NEUTRAL_VALUE})")),
            template.replace(PLACEHOLDER, &format!("{field}({arg}: {{}})")),
        ];
        self.probe_type_ref(documents, ProbeContext::InputValue, Some(arg))
            .await
    }

    /// Learns the name of the type the template's placeholder sits in.
    #[tracing::instrument(skip(self))]
    pub async fn probe_typename(&self, template: &str) -> Result<String> {
        validate_template(template)?;
        let document = template.replace(PLACEHOLDER, WRONG_FIELD);
        let messages = self.expect_errors(&document).await?;
        let borrowed: Vec<&str> = messages.iter().map(String::as_str).collect();

        match classify::enclosing_typename(&borrowed, WRONG_FIELD) {
            Some(typename) => {
                tracing::debug!(typename = %typename, "Probed typename");
                Ok(typename)
            }
            None => Err(OracleError::TypenameNotFound { errors: messages }),
        }
    }

    /// Finds which root operation types the server supports.
    #[tracing::instrument(skip(self))]
    pub async fn probe_root_typenames(&self) -> Result<RootTypenames> {
        let mut roots = RootTypenames::default();
        for (operation, slot) in [
            ("query", &mut roots.query_type),
            ("mutation", &mut roots.mutation_type),
            ("subscription", &mut roots.subscription_type),
        ] {
            let response = self
                .execute(&format!("{operation} {{ __typename }}"))
                .await?;
            *slot = response
                .data
                .as_ref()
                .and_then(|data| data.get("__typename"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string);
        }
        tracing::debug!(?roots, "Root typenames");
        Ok(roots)
    }
}

fn neutral_pairs(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("{name}: {NEUTRAL_VALUE}"))
        .collect::<Vec<_>>()
        .join(", ")
}
