//! CLI command execution

use super::commands::{Cli, Commands, OutputFormat};
use crate::config::{FetchConfig, Profile};
use crate::engine::{FetchEngine, FetchResult};
use crate::error::{Error, Result};
use crate::http::ApiClient;
use crate::types::Query;
use serde_json::json;
use tracing::info;

/// Executes a parsed CLI invocation
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a runner for a parsed CLI
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the selected command
    pub async fn run(self) -> Result<()> {
        let config = self.build_config()?;

        match &self.cli.command {
            Commands::Search {
                jql,
                order,
                fields,
                page_size,
            } => {
                let mut config = config;
                if let Some(size) = page_size {
                    config = config.with_page_size(*size);
                }
                let mut engine = FetchEngine::new(config)?;
                if let Some(fields) = fields {
                    engine = engine.with_fields(split_fields(fields));
                }

                let mut query = Query::new(jql.clone());
                if let Some(order) = order {
                    query = query.with_order(order.clone());
                }

                let progress: Option<crate::types::ProgressCallback> = if self.cli.quiet {
                    None
                } else {
                    Some(Box::new(|fetched: u64, total: u64| {
                        eprint!("\rfetched {fetched}/{total}");
                    }))
                };

                let result = engine.fetch_all(&query, progress).await?;
                if !self.cli.quiet {
                    eprintln!();
                }
                self.print_result(&result)?;

                if !result.is_complete() {
                    info!("result may be incomplete, see warnings above");
                }
                Ok(())
            }

            Commands::Count { jql } => {
                let client = ApiClient::new(config);
                let count = client.approximate_count(jql).await?;
                println!("{count}");
                Ok(())
            }

            Commands::Show { keys, fields } => {
                let mut engine = FetchEngine::new(config)?;
                if let Some(fields) = fields {
                    engine = engine.with_fields(split_fields(fields));
                }
                let result = engine.fetch_details(keys, None).await?;
                if result.is_empty() {
                    return Err(Error::Other("no issues found".to_string()));
                }
                self.print_result(&result)?;
                Ok(())
            }
        }
    }

    /// Profile file plus command-line overrides
    fn build_config(&self) -> Result<FetchConfig> {
        let mut config = match &self.cli.profile {
            Some(path) => Profile::from_yaml_file(path)?.into_config(),
            None => FetchConfig::default(),
        };

        if let Some(base_url) = &self.cli.base_url {
            config.base_url = base_url.clone();
        }
        if let (Some(user), Some(token)) = (&self.cli.user, &self.cli.token) {
            config = config.with_credentials(user.clone(), token.clone());
        }

        config.validate()?;
        Ok(config)
    }

    fn print_result(&self, result: &FetchResult) -> Result<()> {
        match self.cli.format {
            OutputFormat::Json => {
                let records: Vec<_> = result.records.iter().map(|r| r.as_value()).collect();
                let doc = json!({
                    "records": records,
                    "count": result.len(),
                    "complete": result.is_complete(),
                });
                println!("{}", serde_json::to_string_pretty(&doc)?);
            }
            OutputFormat::Pretty => {
                for record in &result.records {
                    let id = record
                        .identity()
                        .map_or_else(|| "<no identity>".to_string(), |i| i.to_string());
                    let summary = record
                        .get("fields")
                        .and_then(|f| f.get("summary"))
                        .and_then(|s| s.as_str())
                        .unwrap_or("");
                    println!("{id}\t{summary}");
                }
                eprintln!(
                    "{} records in {} pages ({} ms){}",
                    result.len(),
                    result.stats.pages_fetched,
                    result.stats.duration_ms,
                    if result.is_complete() {
                        ""
                    } else {
                        " [incomplete]"
                    }
                );
            }
        }
        Ok(())
    }
}

fn split_fields(fields: &str) -> Vec<String> {
    fields
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(String::from)
        .collect()
}
