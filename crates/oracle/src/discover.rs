//! The discovery loop tying probes to the schema being built.

use crate::{Executor, Field, InputValue, Prober, Result, Schema, TypeKind};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::pin::pin;

/// Probes one field's type and, for non-scalar fields, its arguments and
/// their types.
///
/// Returns `Ok(None)` when the field's type cannot be decoded; the field is
/// left out rather than typed with a guess. An argument whose type cannot
/// be decoded is dropped the same way.
async fn describe_field<E: Executor>(
    prober: &Prober<E>,
    name: String,
    wordlist: &[String],
    template: &str,
) -> Result<Option<Field>> {
    let type_ref = match prober.probe_field_type(&name, template).await {
        Ok(type_ref) => type_ref,
        Err(e) if !e.is_fatal() => {
            tracing::warn!(field = %name, error = %e, "Abandoning field");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    let mut field = Field::new(name, type_ref);

    if field.type_ref.is_builtin_scalar() {
        tracing::debug!(
            field = %field.name,
            type_name = %field.type_ref.name,
            "Skipping argument probe for scalar field"
        );
        return Ok(Some(field));
    }

    let arg_names = prober
        .probe_arg_names(&field.name, wordlist, template)
        .await?;
    tracing::debug!(field = %field.name, args = ?arg_names, "Probed arguments");

    for arg in arg_names {
        match prober.probe_arg_type(&field.name, &arg, template).await {
            Ok(mut type_ref) => {
                // Output objects cannot appear in argument position.
                if type_ref.kind == TypeKind::Object {
                    type_ref.kind = TypeKind::InputObject;
                }
                field.args.push(InputValue {
                    name: arg,
                    type_ref,
                });
            }
            Err(e) if !e.is_fatal() => {
                tracing::warn!(field = %field.name, arg = %arg, error = %e, "Abandoning argument");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(Some(field))
}

/// Enumerates the fields of the type the template's placeholder sits in and
/// records them, with their types and arguments, in `schema`.
///
/// Fields are described concurrently up to the configured limit, but only
/// this function writes to `schema`, one finished field at a time and in
/// name order. On a fatal error the fields recorded so far stay in
/// `schema`. Types referenced by the new fields are registered but not
/// enumerated; call this again with a template reaching into them to go
/// deeper.
///
/// Returns the name of the enumerated type.
#[tracing::instrument(skip(prober, schema, wordlist), fields(words = wordlist.len()))]
pub async fn discover_type<E: Executor>(
    prober: &Prober<E>,
    schema: &mut Schema,
    wordlist: &[String],
    template: &str,
) -> Result<String> {
    let typename = prober.probe_typename(template).await?;
    tracing::debug!(typename = %typename, "Enumerating type");

    let field_names = prober.probe_field_names(wordlist, template).await?;
    tracing::info!(typename = %typename, fields = ?field_names, "Probed fields");

    schema.register_type(typename.as_str(), TypeKind::Object);

    let mut described = pin!(stream::iter(field_names)
        .map(|name| describe_field(prober, name, wordlist, template))
        .buffered(prober.config().concurrency));

    while let Some(field) = described.try_next().await? {
        let Some(field) = field else {
            continue;
        };
        for arg in &field.args {
            schema.register_type(arg.type_ref.name.as_str(), TypeKind::InputObject);
        }
        let type_name = field.type_ref.name.clone();
        schema.add_field(&typename, field);
        schema.register_type(type_name, TypeKind::Object);
    }

    Ok(typename)
}

/// Runs a full discovery from scratch, or on top of a seed schema from an
/// earlier run.
pub async fn discover<E: Executor>(
    prober: &Prober<E>,
    wordlist: &[String],
    template: &str,
    seed: Option<Schema>,
) -> Result<Schema> {
    let mut schema = match seed {
        Some(seed) => seed,
        None => Schema::new(prober.probe_root_typenames().await?),
    };
    discover_type(prober, &mut schema, wordlist, template).await?;
    Ok(schema)
}
