mod aggregator;
mod archive;
mod config;
mod disk_cache;
mod downloader;
mod env;
mod error;
mod facade;
mod feeds;
mod framework;
mod metadata;
mod nuspec;
mod package_name;
mod progress;
mod protocol_selector;
mod resolver;
mod scoped_path;
mod source;
mod util;
mod version;
mod version_requirement;
mod xml_odata;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use config::read_config;
use env::NuGetEnvironment;
use owo_colors::OwoColorize;
use package_name::PackageName;
use progress::{log_progress, log_warning, PROGRESS_BAR};
use source::{Authentication, PackageSource};
use std::path::PathBuf;
use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use version::SemVer;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Print verbose logs
    #[clap(short, long, global = true)]
    verbose: bool,
    /// Additional remote feed to query, beyond those in `nuget.toml`
    #[clap(long = "source", global = true)]
    extra_sources: Vec<String>,
    /// Force a refetch, bypassing the on-disk cache and any sticky error marker
    #[clap(long, global = true)]
    force: bool,
    /// Proxy URL (e.g. `http://proxy.local:8080`) outbound HTTP clients are
    /// routed through. Overrides `proxy` in `nuget.toml` when given.
    #[clap(long, global = true)]
    proxy: Option<String>,
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// List every available version of a package across all configured sources
    Versions { name: String },
    /// Fetch authoritative metadata for one package version
    Details { name: String, version: String },
    /// Download and extract a package into a target directory
    Download {
        name: String,
        version: String,
        /// Directory packages are installed under
        #[clap(long, default_value = "packages")]
        root: PathBuf,
        /// Subdirectory grouping tag (e.g. a target-framework moniker)
        #[clap(long, default_value = "")]
        group: String,
        /// Include the normalized version in the install path
        #[clap(long)]
        include_version_in_path: bool,
    },
}

async fn gather_sources(extra: &[String]) -> Result<Vec<PackageSource>> {
    let config = read_config().await?;
    let mut sources = config.into_sources();
    sources.extend(extra.iter().map(|url| PackageSource::RemoteNuget {
        url: url.clone(),
        authentication: None,
    }));

    if sources.is_empty() {
        return Err(eyre!(
            "no package sources configured — add a [[source]] to nuget.toml or pass --source"
        ));
    }

    Ok(sources)
}

/// The effective proxy: an explicit `--proxy` flag wins, otherwise whatever
/// `nuget.toml` configures (§4.6 step 5, SPEC_FULL §6).
async fn effective_proxy(cli_proxy: &Option<String>) -> Option<String> {
    if cli_proxy.is_some() {
        return cli_proxy.clone();
    }
    read_config().await.ok().and_then(|config| config.proxy)
}

fn remote_auth(source: &PackageSource) -> Option<Authentication> {
    match source {
        PackageSource::RemoteNuget { authentication, .. } => authentication.clone(),
        PackageSource::LocalPath { .. } => None,
    }
}

async fn run(args: &Args) -> Result<()> {
    let sources = gather_sources(&args.extra_sources).await?;
    let proxy = effective_proxy(&args.proxy).await;

    match &args.cmd {
        Command::Versions { name } => {
            log_progress(&format!("Listing versions of {name}"));
            let env = NuGetEnvironment::resolve().with_proxy(proxy.clone());
            let name = PackageName::new(name);
            let versions = facade::get_versions(&env, &sources, &name).await?;
            PROGRESS_BAR.suspend(|| {
                for version in &versions {
                    println!("{version}");
                }
            });
        }
        Command::Details { name, version } => {
            log_progress(&format!("Fetching details for {name} {version}"));
            let env = NuGetEnvironment::resolve().with_proxy(proxy.clone());
            let name = PackageName::new(name);
            let version = SemVer::parse(version).map_err(|e| eyre!(e))?;

            let details = facade::get_package_details(&env, args.force, &sources, &name, &version).await?;

            PROGRESS_BAR.suspend(|| {
                println!("{}", details.name.bold());
                println!("  source: {}", details.source.describe());
                if let Some(link) = &details.download_link {
                    println!("  download: {link}");
                }
                if details.unlisted {
                    println!("  {}", "unlisted".yellow());
                }
                if !details.license_url.is_empty() {
                    println!("  license: {}", details.license_url);
                }
                for dep in &details.direct_dependencies {
                    println!("  depends on {} {}", dep.name, dep.requirement);
                }
            });
        }
        Command::Download { name, version, root: install_root, group, include_version_in_path } => {
            log_progress(&format!("Downloading {name} {version}"));
            let env = NuGetEnvironment::resolve().with_proxy(proxy.clone());
            let name = PackageName::new(name);
            let version = SemVer::parse(version).map_err(|e| eyre!(e))?;

            let details = facade::get_package_details(&env, args.force, &sources, &name, &version).await?;
            let PackageSource::RemoteNuget { url, .. } = &details.source else {
                return Err(eyre!("{name} resolved to a local source — nothing to download"));
            };
            let auth = remote_auth(&details.source);

            let target = facade::download_package(
                &env,
                install_root,
                auth.as_ref(),
                url,
                group,
                &name,
                &version,
                *include_version_in_path,
                args.force,
            )
            .await?;

            log_progress(&format!("Installed {} to {}", name.bold(), target.display()));
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .init();

    color_eyre::install()?;

    let result = run(&args).await;
    PROGRESS_BAR.finish_and_clear();

    if let Err(e) = &result {
        log_warning(&e.to_string());
    }

    result
}
