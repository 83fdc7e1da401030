//! config command - Show or create the configuration file

use anyhow::{bail, Context as _, Result};

use crate::cli::Context;
use crate::core::config::{Config, ConfigFile, ForgeConfig, PublishDefaults, CONFIG_ENV};
use crate::ui::output;

/// Print the effective configuration as TOML.
pub fn show(ctx: &Context) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    match config.loaded_from() {
        Some(path) => output::debug(format!("loaded from {}", path.display()), ctx.verbosity()),
        None => output::print("# no configuration file found, showing defaults", ctx.verbosity()),
    }

    let forge = config.forge();
    println!("[publish]");
    println!("mode = \"{}\"", config.mode());
    println!("labels = {:?}", config.labels());
    println!("reviewers = {:?}", config.reviewers());
    if let Some(owner) = config.derived_owner() {
        println!("derived_owner = \"{}\"", owner);
    }
    println!("allow_collaboration = {}", config.allow_collaboration());
    println!("tags = {:?}", config.tags());
    println!("overwrite_unrelated = {}", config.overwrite_unrelated());
    if let Some(dir) = config.storage_dir() {
        println!("storage_dir = \"{}\"", dir.display());
    }
    println!();
    println!("[forge]");
    if let Some(provider) = &forge.provider {
        println!("provider = \"{}\"", provider);
    }
    println!("github_token_env = \"{}\"", forge.github_token_env());
    println!("gitlab_token_env = \"{}\"", forge.gitlab_token_env());
    println!("gitlab_hosts = {:?}", forge.gitlab_hosts());
    if let Some(base) = &forge.github_api_base {
        println!("github_api_base = \"{}\"", base);
    }
    Ok(())
}

/// Print the path of the configuration file in use.
pub fn path(ctx: &Context) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    match config.loaded_from() {
        Some(path) => println!("{}", path.display()),
        None => {
            let default = Config::default_path()?;
            output::print(
                format!("{} (not created; set {} to override)", default.display(), CONFIG_ENV),
                ctx.verbosity(),
            );
        }
    }
    Ok(())
}

/// Write a configuration file with the default settings spelled out.
pub fn init(ctx: &Context, force: bool) -> Result<()> {
    let path = match std::env::var_os(CONFIG_ENV) {
        Some(path) => path.into(),
        None => Config::default_path()?,
    };
    if path.exists() && !force {
        bail!(
            "{} already exists; pass --force to replace it",
            path.display()
        );
    }

    let file = ConfigFile {
        publish: Some(PublishDefaults {
            mode: Some("propose".to_string()),
            labels: Some(Vec::new()),
            reviewers: Some(Vec::new()),
            allow_collaboration: Some(false),
            tags: Some(Vec::new()),
            overwrite_unrelated: Some(false),
            ..Default::default()
        }),
        forge: Some(ForgeConfig {
            github_token_env: Some(ForgeConfig::DEFAULT_GITHUB_TOKEN_ENV.to_string()),
            gitlab_token_env: Some(ForgeConfig::DEFAULT_GITLAB_TOKEN_ENV.to_string()),
            ..Default::default()
        }),
    };
    Config::write(&path, &file).context("Failed to write configuration")?;
    output::success(format!("Wrote {}", path.display()), ctx.verbosity());
    Ok(())
}
