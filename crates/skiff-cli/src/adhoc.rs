//! Ad hoc GraphQL execution, for developing and debugging queries.

use anyhow::Context;
use serde_json::{Map, Value, json};

use skiff_github::GithubClient;

use crate::cli::AdhocArgs;

pub async fn handle(args: &AdhocArgs) -> anyhow::Result<()> {
    let query = std::fs::read_to_string(&args.query_file)
        .with_context(|| format!("failed to read {}", args.query_file.display()))?;
    let variables = parse_vars(&args.vars)?;

    let _ = dotenvy::dotenv();
    let token = std::env::var("GITHUB_TOKEN").unwrap_or_default();
    let endpoint = std::env::var("SKIFF_API_ROOT")
        .unwrap_or_else(|_| skiff_digest::DEFAULT_API_ROOT.to_owned());
    let client = GithubClient::new(endpoint, token);

    let output = if args.nodes {
        let (data, nodes) = client.nodes(&query, &variables, None).await?;
        json!({ "data": data, "nodes": nodes })
    } else {
        client.execute(&query, &variables).await?
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Parse `name=value` variable specs, with `name:int=` and `name:bool=`
/// coercing the value.
fn parse_vars(specs: &[String]) -> anyhow::Result<Map<String, Value>> {
    let mut vars = Map::new();
    for spec in specs {
        let (name, raw) = spec
            .split_once('=')
            .with_context(|| format!("variable {spec:?} is not name=value"))?;
        let (name, value) = match name.split_once(':') {
            Some((name, "int")) => (
                name,
                json!(raw
                    .parse::<i64>()
                    .with_context(|| format!("variable {spec:?} is not an integer"))?),
            ),
            Some((name, "bool")) => (
                name,
                json!(raw
                    .parse::<bool>()
                    .with_context(|| format!("variable {spec:?} is not a bool"))?),
            ),
            Some((_, kind)) => anyhow::bail!("unknown variable type {kind:?} in {spec:?}"),
            None => (name, json!(raw)),
        };
        vars.insert(name.to_owned(), value);
    }
    Ok(vars)
}
