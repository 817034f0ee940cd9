//! Request command handlers.

use onefs_api::{Client, OrderedParams, Request};
use serde_json::Value;

use crate::cli::RequestArgs;
use crate::error::CliError;

/// HTTP verb selected by the subcommand.
#[derive(Debug, Clone, Copy)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

/// Send one request built from `args` and print the JSON reply, if any.
pub fn handle(verb: Verb, args: RequestArgs, client: &Client) -> Result<(), CliError> {
    let request = build_request(verb, args)?;
    let reply: Option<Value> = client.execute(&request)?;
    if let Some(body) = reply {
        println!("{}", serde_json::to_string_pretty(&body)?);
    }
    Ok(())
}

/// Translate parsed arguments into a [`Request`].
pub fn build_request(verb: Verb, args: RequestArgs) -> Result<Request, CliError> {
    let request = match verb {
        Verb::Get => Request::get(args.path),
        Verb::Post => Request::post(args.path),
        Verb::Put => Request::put(args.path),
        Verb::Delete => Request::delete(args.path),
    };

    let mut request = request
        .with_id(args.id.unwrap_or_default())
        .with_params(parse_params(&args.params)?);

    for raw in &args.headers {
        let (name, value) = split_pair(raw, ':', "header")?;
        request = request.with_header(name, value.trim_start())?;
    }

    let body = match (args.data, args.data_file) {
        (Some(inline), _) => Some(inline),
        (None, Some(path)) => Some(std::fs::read_to_string(path)?),
        (None, None) => None,
    };
    if let Some(text) = body {
        let value: Value = serde_json::from_str(&text)?;
        request = request.with_json(&value)?;
    }

    Ok(request)
}

fn parse_params(raw: &[String]) -> Result<OrderedParams, CliError> {
    raw.iter()
        .map(|pair| split_pair(pair, '=', "param").map(|(k, v)| (k.to_owned(), v.to_owned())))
        .collect()
}

fn split_pair<'a>(raw: &'a str, sep: char, field: &str) -> Result<(&'a str, &'a str), CliError> {
    match raw.split_once(sep) {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value)),
        _ => Err(CliError::Validation {
            field: field.into(),
            reason: format!("expected KEY{sep}VALUE, got '{raw}'"),
        }),
    }
}
