use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::{
    cli_types::{GetArgs, SearchArgs},
    config::NavigatorConfig,
    fuzzy::FuzzyMatch,
    navigator::VersionIndex,
    registry::NavigatorSet,
    types::Descriptor,
};

pub struct CliApp {
    config: NavigatorConfig,
    navigators: NavigatorSet,
    json: bool,
    verbose: bool,
}

impl CliApp {
    pub fn new(config: NavigatorConfig, json: bool, verbose: bool) -> Result<Self> {
        info!("Initializing docnav CLI");

        let provider = config
            .http_provider()
            .context("Failed to create documentation provider")?;
        let navigators = NavigatorSet::new(provider, config.index_settings());

        Ok(Self::with_navigators(config, navigators, json, verbose))
    }

    /// Build the app around an existing set, e.g. one backed by a non-HTTP source.
    pub fn with_navigators(
        config: NavigatorConfig,
        navigators: NavigatorSet,
        json: bool,
        verbose: bool,
    ) -> Self {
        Self {
            config,
            navigators,
            json,
            verbose,
        }
    }

    fn default_tag(&self) -> &str {
        self.config
            .tags
            .first()
            .map(String::as_str)
            .unwrap_or("latest")
    }

    /// Index for `tag`, waiting for its first refresh to finish.
    async fn ready_index(&self, tag: Option<&str>) -> Result<Arc<VersionIndex>> {
        let tag = tag.unwrap_or_else(|| self.default_tag());
        let index = self.navigators.track(tag);
        if !index.ready() {
            let started = Instant::now();
            // joins the refresh started by `track`
            index
                .refresh()
                .await
                .map_err(anyhow::Error::new)
                .with_context(|| format!("Failed to index documentation for `{tag}`"))?;
            if self.verbose {
                eprintln!(
                    "{} indexed `{}` in {:.2?}",
                    "info:".blue().bold(),
                    tag,
                    started.elapsed()
                );
            }
        }
        Ok(index)
    }

    pub async fn search(&self, tag: Option<&str>, args: SearchArgs) -> Result<()> {
        let index = self.ready_index(tag).await?;
        let limit = args.limit.unwrap_or(self.config.default_limit);
        let matches = index.filter_entities(&args.query, limit);

        if self.json {
            let results: Vec<_> = matches
                .iter()
                .map(|m| {
                    json!({
                        "key": m.value,
                        "score": m.score,
                        "symbol": index.get(&m.value).map(|d| d.symbol()),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&results)?);
            return Ok(());
        }

        self.print_matches(&index, &args.query, &matches, |m| {
            index
                .get(&m.value)
                .map(|d| d.symbol().to_string())
                .unwrap_or_default()
        });
        Ok(())
    }

    pub async fn files(&self, tag: Option<&str>, args: SearchArgs) -> Result<()> {
        let index = self.ready_index(tag).await?;
        let limit = args.limit.unwrap_or(self.config.default_limit);
        let matches = index.filter_files(&args.query, limit);

        if self.json {
            let results: Vec<_> = matches
                .iter()
                .map(|m| {
                    json!({
                        "file": m.value,
                        "score": m.score,
                        "url": index.raw_file_url(&m.value),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&results)?);
            return Ok(());
        }

        self.print_matches(&index, &args.query, &matches, |m| index.raw_file_url(&m.value));
        Ok(())
    }

    pub async fn get(&self, tag: Option<&str>, args: GetArgs) -> Result<()> {
        let index = self.ready_index(tag).await?;
        let Some(descriptor) = index.get(&args.key) else {
            let suggestions: Vec<String> = index
                .filter_entities(&args.key, 5)
                .into_iter()
                .map(|m| m.value)
                .collect();
            if suggestions.is_empty() {
                return Err(anyhow!("No entry `{}` in `{}`", args.key, index.tag()));
            }
            return Err(anyhow!(
                "No entry `{}` in `{}`. Did you mean: {}",
                args.key,
                index.tag(),
                suggestions.join(", ")
            ));
        };

        let urls = self.descriptor_urls(&index, &descriptor);
        if self.json {
            let output = json!({
                "key": descriptor.key(),
                "descriptor": descriptor,
                "urls": urls,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        println!(
            "{} {}",
            descriptor.key().bold().green(),
            format!("({})", descriptor.symbol()).dimmed()
        );
        if let Some(parent) = descriptor.parent() {
            println!("  {} {} ({})", "parent:".cyan(), parent.name, parent.symbol);
        }
        if let Some(description) = descriptor.description() {
            println!("  {}", description);
        }
        for (label, url) in urls.as_object().into_iter().flatten() {
            if let Some(url) = url.as_str() {
                println!("  {} {}", format!("{label}:").cyan(), url);
            }
        }
        Ok(())
    }

    pub async fn meta(&self, tag: Option<&str>) -> Result<()> {
        let index = self.ready_index(tag).await?;
        let snapshot = index.try_snapshot()?;

        if self.json {
            let output = json!({
                "tag": index.tag(),
                "meta": snapshot.meta(),
                "stats": snapshot.stats(),
                "fetched_at": snapshot.fetched_at(),
                "source": index.provider().target_uri(index.tag()),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        let meta = snapshot.meta();
        let stats = snapshot.stats();
        println!("{}", format!("Documentation `{}`", index.tag()).bold());
        println!("  source:     {}", index.provider().target_uri(index.tag()));
        println!("  fetched at: {}", snapshot.fetched_at().to_rfc3339());
        if let Some(generator) = meta.generator_version() {
            println!("  generator:  {generator}");
        }
        if let Some(format) = &meta.format {
            println!("  format:     {}", format.as_str().map(str::to_string).unwrap_or_else(|| format.to_string()));
        }
        match (meta.date_millis().and_then(chrono::DateTime::from_timestamp_millis), &meta.date) {
            (Some(date), _) => println!("  generated:  {}", date.to_rfc3339()),
            (None, Some(serde_json::Value::String(raw))) => println!("  generated:  {raw}"),
            _ => {}
        }
        println!(
            "  entries:    {} ({} classes, {} typedefs, {} methods, {} members, {} events)",
            snapshot.len(),
            stats.classes,
            stats.typedefs,
            stats.methods,
            stats.members,
            stats.events
        );
        println!("  files:      {}", stats.known_files);
        Ok(())
    }

    pub async fn watch(&self) -> Result<()> {
        let indices = self.navigators.track_all(&self.config.tags);
        println!(
            "{} {} tag(s) every {}s, press Ctrl-C to stop",
            "Watching".bold(),
            indices.len(),
            self.config.refresh_interval_secs
        );

        tokio::select! {
            _ = self.navigators.await_all_ready() => {
                for index in &indices {
                    println!("  {} {} ({} entries)", "ready".green(), index.tag(), index.len());
                }
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        for tag in self.navigators.tags() {
            self.navigators.untrack(&tag);
        }
        Ok(())
    }

    pub fn show_config(&self) -> Result<()> {
        print!("{}", self.config.to_toml()?);
        Ok(())
    }

    fn descriptor_urls(&self, index: &VersionIndex, descriptor: &Descriptor) -> serde_json::Value {
        let mut urls = serde_json::Map::new();
        if let Some(url) = index.docs_url(descriptor) {
            urls.insert("docs".into(), url.into());
        }
        if let Some(meta) = descriptor.meta() {
            if let (Some(file), Some(range)) = (meta.file_path(), meta.line_range()) {
                urls.insert("source".into(), index.code_file_url(&file, range).into());
            }
        }
        serde_json::Value::Object(urls)
    }

    fn print_matches<F>(&self, index: &VersionIndex, query: &str, matches: &[FuzzyMatch], detail: F)
    where
        F: Fn(&FuzzyMatch) -> String,
    {
        if matches.is_empty() {
            println!("No matches for `{}` in `{}`", query, index.tag());
            return;
        }
        for m in matches {
            println!(
                "{:>6}  {}  {}",
                m.score.to_string().dimmed(),
                m.value.bold(),
                detail(m).dimmed()
            );
        }
    }
}
