//! deplink: inspect, link and resolve compiled EVM contracts.
//!
//! Offline commands only read the compiled contracts JSON. Commands taking
//! `--chain` also read `deplink.toml` and talk to the configured node.

#![allow(missing_docs, rustdoc::missing_crate_level_docs)]

use clap::{Parser, Subcommand};
use deplink_chain::Project;
use deplink_linker::{
    extract_link_reference_names, find_link_references, link_bytecode, DependencyGraph,
};
use deplink_primitives::{ArtifactSet, ContractArtifact, LinkOverrides, LinkValue};
use eyre::{bail, eyre, Result, WrapErr};
use std::{collections::BTreeSet, path::PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Link and resolve compiled EVM contracts.
#[derive(Parser, Debug)]
#[command(name = "deplink", version, about = "Link and resolve compiled EVM contracts")]
struct Cli {
    /// Compiled contracts JSON
    #[arg(long, global = true, env = "DEPLINK_ARTIFACTS", default_value = "build/contracts.json")]
    artifacts: PathBuf,

    /// Project configuration file
    #[arg(long, global = true, env = "DEPLINK_CONFIG", default_value = "deplink.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the link placeholders in a contract's bytecode
    Refs {
        contract: String,
        /// Scan the runtime code instead of the deploy code
        #[arg(long, default_value_t = false)]
        runtime: bool,
    },
    /// Print the libraries a contract depends on, transitively
    Deps { contract: String },
    /// Print every contract in deployment order
    Order,
    /// Link a contract against explicit library values without a chain
    Link {
        contract: String,
        /// Library value, repeatable
        #[arg(long = "lib", value_name = "NAME=VALUE", value_parser = parse_binding)]
        libs: Vec<(String, LinkValue)>,
        /// Link the runtime code instead of the deploy code
        #[arg(long, default_value_t = false)]
        runtime: bool,
    },
    /// Resolve a contract's address on a configured chain
    Resolve {
        contract: String,
        /// Configured chain name
        #[arg(long)]
        chain: String,
        /// Static override, repeatable
        #[arg(long = "lib", value_name = "NAME=VALUE", value_parser = parse_binding)]
        libs: Vec<(String, LinkValue)>,
        /// Accept registrar entries without checking the code on chain
        #[arg(long, default_value_t = false)]
        skip_validation: bool,
    },
    /// List the contracts deployed on a configured chain
    Deployed {
        /// Configured chain name
        #[arg(long)]
        chain: String,
    },
}

fn parse_binding(raw: &str) -> Result<(String, LinkValue), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing library name in '{raw}'"));
    }
    let value = value.trim().parse::<LinkValue>().map_err(|err| err.to_string())?;
    Ok((name.to_string(), value))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn load_artifacts(cli: &Cli) -> Result<ArtifactSet> {
    ArtifactSet::from_json_file(&cli.artifacts)
        .wrap_err_with(|| format!("failed to load artifacts from {}", cli.artifacts.display()))
}

fn find_artifact<'a>(artifacts: &'a ArtifactSet, name: &str) -> Result<&'a ContractArtifact> {
    artifacts.get(name).ok_or_else(|| {
        eyre!(
            "no contract found with the name '{name}'; available contracts are: {}",
            artifacts.names().collect::<Vec<_>>().join(", ")
        )
    })
}

fn select_code(artifact: &ContractArtifact, runtime: bool) -> &str {
    if runtime {
        &artifact.code_runtime
    } else {
        &artifact.code
    }
}

fn link_offline(artifacts: &ArtifactSet, code: &str, libs: &LinkOverrides) -> Result<String> {
    let known: BTreeSet<&str> = artifacts
        .names()
        .chain(libs.keys().map(String::as_str))
        .collect();
    let missing: Vec<String> = extract_link_reference_names(code, known.iter().copied())?
        .into_iter()
        .filter(|name| !libs.contains_key(name))
        .collect();
    if !missing.is_empty() {
        bail!("no value given for: {}", missing.join(", "));
    }
    Ok(link_bytecode(code, libs)?)
}

fn load_project(cli: &Cli) -> Result<Project> {
    Project::load(&cli.config, &cli.artifacts).wrap_err_with(|| {
        format!(
            "failed to load project from {} and {}",
            cli.config.display(),
            cli.artifacts.display()
        )
    })
}

async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Refs { contract, runtime } => {
            let artifacts = load_artifacts(&cli)?;
            let artifact = find_artifact(&artifacts, contract)?;
            for reference in find_link_references(select_code(artifact, *runtime)) {
                println!("{}\t{}\t{}", reference.offset, reference.length, reference.name);
            }
        }
        Command::Deps { contract } => {
            let artifacts = load_artifacts(&cli)?;
            find_artifact(&artifacts, contract)?;
            let graph = DependencyGraph::from_artifacts(&artifacts)?;
            for name in graph.transitive_dependencies(contract)? {
                println!("{name}");
            }
        }
        Command::Order => {
            let artifacts = load_artifacts(&cli)?;
            for name in DependencyGraph::from_artifacts(&artifacts)?.deploy_order()? {
                println!("{name}");
            }
        }
        Command::Link {
            contract,
            libs,
            runtime,
        } => {
            let artifacts = load_artifacts(&cli)?;
            let artifact = find_artifact(&artifacts, contract)?;
            let libs: LinkOverrides = libs.iter().cloned().collect();
            println!(
                "{}",
                link_offline(&artifacts, select_code(artifact, *runtime), &libs)?
            );
        }
        Command::Resolve {
            contract,
            chain,
            libs,
            skip_validation,
        } => {
            let chain = load_project(&cli)?.connect_chain(chain)?;
            let libs: LinkOverrides = libs.iter().cloned().collect();
            let binding = chain
                .resolve_address(contract, &libs, !skip_validation)
                .await?;
            println!("{}\t{}\t{}", binding.name, binding.value, binding.source);
        }
        Command::Deployed { chain } => {
            let chain = load_project(&cli)?.connect_chain(chain)?;
            let deployed = chain.deployed_contracts().await?;
            info!(chain = chain.name(), count = deployed.len(), "found deployed contracts");
            for (name, instance) in &deployed {
                println!("{name}\t{}", instance.address());
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    run(Cli::parse()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use deplink_linker::{link_marker, ADDRESS_SLOT_WIDTH};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_library_bindings() {
        let (name, value) =
            parse_binding("Library13=0x1313131313131313131313131313131313131313").unwrap();
        assert_eq!(name, "Library13");
        assert_eq!(value.hex_len(), ADDRESS_SLOT_WIDTH);

        assert!(parse_binding("Library13").is_err());
        assert!(parse_binding("=0x13").is_err());
        assert!(parse_binding("Library13=0xzz").is_err());
    }

    #[test]
    fn offline_link_requires_every_library() {
        let code = format!("0x60{}", link_marker("Library13", ADDRESS_SLOT_WIDTH));
        let artifacts: ArtifactSet = [
            ContractArtifact::new("Library13", "0x6001", "0x6001"),
            ContractArtifact::new("Multiply13", code.clone(), code.clone()),
        ]
        .into_iter()
        .collect();

        let err = link_offline(&artifacts, &code, &LinkOverrides::new()).unwrap_err();
        assert_eq!(err.to_string(), "no value given for: Library13");

        let (name, value) =
            parse_binding("Library13=0x1313131313131313131313131313131313131313").unwrap();
        let libs = LinkOverrides::from([(name, value)]);
        let linked = link_offline(&artifacts, &code, &libs).unwrap();
        assert_eq!(linked, format!("0x60{}", "13".repeat(20)));
    }
}
