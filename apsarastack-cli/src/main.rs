use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use log::{LevelFilter, debug};
use serde::Deserialize;

use apsarastack_core::differ::{Diff, diff_all};
use apsarastack_core::env::Env;
use apsarastack_core::provider::Provider;
use apsarastack_core::resource::{Resource, ResourceId, State, Value};
use apsarastack_core::schema::ResourceSchema;
use apsarastack_provider::{ApsaraStackProvider, Config};

#[derive(Parser)]
#[command(name = "apsarastack")]
#[command(about = "ApsaraStack provider configuration tool", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve credentials and print the effective provider configuration
    Configure {
        /// Path to the provider block JSON file
        #[arg(default_value = "provider.json")]
        file: PathBuf,
    },
    /// Validate resource attributes against their schemas
    Validate {
        /// Path to the resources JSON file
        #[arg(default_value = "resources.json")]
        file: PathBuf,
    },
    /// Show attribute changes between desired and current resources
    Diff {
        /// Path to the desired resources JSON file
        desired: PathBuf,
        /// Path to the current resources JSON file
        current: PathBuf,
    },
}

/// `{"resources": [{"type": ..., "name": ..., "attributes": {...}}]}`
#[derive(Debug, Deserialize)]
struct ResourcesFile {
    #[serde(default)]
    resources: Vec<ResourceEntry>,
}

#[derive(Debug, Deserialize)]
struct ResourceEntry {
    #[serde(rename = "type")]
    resource_type: String,
    name: String,
    #[serde(default)]
    identifier: Option<String>,
    #[serde(default)]
    attributes: serde_json::Map<String, serde_json::Value>,
}

impl ResourceEntry {
    fn attributes(&self) -> HashMap<String, Value> {
        json_attributes(&self.attributes)
    }

    fn into_resource(self) -> Resource {
        Resource {
            id: ResourceId::new(&self.resource_type, &self.name),
            attributes: self.attributes(),
        }
    }

    fn into_state(self) -> State {
        let id = ResourceId::new(&self.resource_type, &self.name);
        let state = State::existing(id, self.attributes());
        match self.identifier {
            Some(identifier) => state.with_identifier(identifier),
            None => state,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let result = match cli.command {
        Commands::Configure { file } => run_configure(&file).await,
        Commands::Validate { file } => run_validate(&file),
        Commands::Diff { desired, current } => run_diff(&desired, &current),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn json_attributes(map: &serde_json::Map<String, serde_json::Value>) -> HashMap<String, Value> {
    map.iter()
        .filter_map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
        .collect()
}

fn read_json<T>(path: &Path) -> Result<T, String>
where
    for<'de> T: Deserialize<'de>,
{
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&content).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
}

fn get_schemas() -> HashMap<String, ResourceSchema> {
    ApsaraStackProvider::new()
        .resource_schemas()
        .into_iter()
        .map(|schema| (schema.resource_type.clone(), schema))
        .collect()
}

/// Load desired resources with schema and environment defaults applied
fn load_resources(
    path: &Path,
    schemas: &HashMap<String, ResourceSchema>,
) -> Result<Vec<Resource>, String> {
    let file: ResourcesFile = read_json(path)?;
    let env = Env::real();
    let mut resources = Vec::new();

    for entry in file.resources {
        let mut resource = entry.into_resource();
        if let Some(schema) = schemas.get(&resource.id.resource_type)
            && let Err(errors) = schema.apply_defaults(&mut resource.attributes, &env)
        {
            return Err(format_errors(&resource.id, &errors));
        }
        resources.push(resource);
    }

    Ok(resources)
}

fn format_errors(id: &ResourceId, errors: &[impl std::fmt::Display]) -> String {
    errors
        .iter()
        .map(|e| format!("{}.{}: {}", id.resource_type, id.name, e))
        .collect::<Vec<_>>()
        .join("\n")
}

fn validate_resources(
    resources: &[Resource],
    schemas: &HashMap<String, ResourceSchema>,
) -> Result<(), String> {
    let mut all_errors = Vec::new();

    for resource in resources {
        match schemas.get(&resource.id.resource_type) {
            Some(schema) => {
                if let Err(errors) = schema.validate(&resource.attributes) {
                    all_errors.push(format_errors(&resource.id, &errors));
                }
            }
            None => all_errors.push(format!(
                "{}.{}: Unknown resource type '{}'",
                resource.id.resource_type, resource.id.name, resource.id.resource_type
            )),
        }
    }

    if all_errors.is_empty() {
        Ok(())
    } else {
        Err(all_errors.join("\n"))
    }
}

async fn run_configure(file: &Path) -> Result<(), String> {
    let block: serde_json::Map<String, serde_json::Value> = read_json(file)?;
    let provider = ApsaraStackProvider::new();

    let data = provider.prepare(json_attributes(&block)).map_err(|e| e.to_string())?;
    let client = provider.configure(data).await.map_err(|e| e.to_string())?;

    print_config(client.config());
    println!();
    println!(
        "{} {}",
        "✓".green(),
        format!("Provider configured for region {}", client.region()).green()
    );
    Ok(())
}

fn run_validate(file: &Path) -> Result<(), String> {
    let schemas = get_schemas();
    let resources = load_resources(file, &schemas)?;
    debug!("Loaded {} resources from {}", resources.len(), file.display());

    validate_resources(&resources, &schemas)?;

    println!(
        "{}",
        format!("✓ {} resources validated successfully.", resources.len())
            .green()
            .bold()
    );
    Ok(())
}

fn run_diff(desired_file: &Path, current_file: &Path) -> Result<(), String> {
    let schemas = get_schemas();
    let desired = load_resources(desired_file, &schemas)?;
    validate_resources(&desired, &schemas)?;

    let current: ResourcesFile = read_json(current_file)?;
    let current_states: HashMap<ResourceId, State> = current
        .resources
        .into_iter()
        .map(|entry| {
            let state = entry.into_state();
            (state.id.clone(), state)
        })
        .collect();

    let diffs = diff_all(&schemas, &desired, &current_states);
    print_diffs(&diffs);
    Ok(())
}

fn print_config(config: &Config) {
    let redacted = |value: &str| {
        if value.is_empty() {
            "(not set)".dimmed().to_string()
        } else {
            "(sensitive)".dimmed().to_string()
        }
    };
    let plain = |value: &str| {
        if value.is_empty() {
            "(not set)".dimmed().to_string()
        } else {
            value.to_string()
        }
    };

    println!("{}", "Effective configuration:".cyan().bold());
    println!("  {}: {}", "region".bold(), config.region);
    println!("  {}: {}", "access_key".bold(), plain(&config.access_key));
    println!("  {}: {}", "secret_key".bold(), redacted(&config.secret_key));
    println!(
        "  {}: {}",
        "security_token".bold(),
        redacted(&config.security_token)
    );
    println!("  {}: {}", "ecs_role_name".bold(), plain(&config.ecs_role_name));
    if config.assume_role.is_enabled() {
        println!("  {}:", "assume_role".bold());
        println!("    role_arn: {}", config.assume_role.role_arn);
        println!("    session_name: {}", config.assume_role.session_name);
        println!("    policy: {}", plain(&config.assume_role.policy));
        println!(
            "    session_expiration: {}",
            config.assume_role.session_expiration
        );
    }
    println!("  {}:", "endpoints".bold());
    println!("    domain: {}", plain(&config.endpoints.domain));
    println!("    ecs: {}", plain(&config.endpoints.ecs));
    println!("    vpc: {}", plain(&config.endpoints.vpc));
    println!("    sts: {}", plain(&config.endpoints.sts));
    println!("  {}: {}", "protocol".bold(), config.protocol);
    println!("  {}: {}", "proxy".bold(), plain(&config.proxy));
    println!("  {}: {}", "insecure".bold(), config.insecure);
    println!(
        "  {}: {}",
        "skip_region_validation".bold(),
        config.skip_region_validation
    );
    println!(
        "  {}: {}",
        "configuration_source".bold(),
        config.configuration_source
    );
    println!(
        "  {}: {}",
        "ots_instance_name".bold(),
        plain(&config.ots_instance_name)
    );
    println!("  {}: {}", "account_id".bold(), plain(&config.account_id));
}

fn print_diffs(diffs: &[Diff]) {
    let changes: Vec<&Diff> = diffs.iter().filter(|d| d.is_change()).collect();
    if changes.is_empty() {
        println!("{}", "No changes. Resources are up-to-date.".green());
        return;
    }

    println!("{}", "Changes:".cyan().bold());
    println!();

    let (mut create, mut update, mut delete) = (0, 0, 0);
    for diff in changes {
        match diff {
            Diff::Create(resource) => {
                create += 1;
                println!(
                    "  {} {}.{}",
                    "+".green().bold(),
                    resource.id.resource_type,
                    resource.id.name
                );
                let mut keys: Vec<&String> = resource.attributes.keys().collect();
                keys.sort();
                for key in keys {
                    println!(
                        "      {}: {}",
                        key,
                        display_value(&resource.attributes[key]).green()
                    );
                }
            }
            Diff::Update {
                id,
                from,
                to,
                changed_attributes,
            } => {
                update += 1;
                println!(
                    "  {} {}.{}",
                    "~".yellow().bold(),
                    id.resource_type,
                    id.name
                );
                for key in changed_attributes {
                    let old = from
                        .attributes
                        .get(key)
                        .map(display_value)
                        .unwrap_or_else(|| "(none)".to_string());
                    let new = to
                        .attributes
                        .get(key)
                        .map(display_value)
                        .unwrap_or_else(|| "(none)".to_string());
                    println!("      {}: {} → {}", key, old.red(), new.green());
                }
            }
            Diff::Delete(id) => {
                delete += 1;
                println!("  {} {}.{}", "-".red().bold(), id.resource_type, id.name);
            }
            Diff::NoChange(_) => {}
        }
    }

    println!();
    println!(
        "Plan: {} to create, {} to update, {} to delete.",
        create.to_string().green(),
        update.to_string().yellow(),
        delete.to_string().red()
    );
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{:?}", s),
        other => other.render(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn resources_file_is_parsed_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "resources.json",
            r#"{
                "resources": [{
                    "type": "apsarastack_security_group_rule",
                    "name": "ssh",
                    "attributes": {
                        "type": "ingress",
                        "security_group_id": "sg-1",
                        "ip_protocol": "tcp",
                        "cidr_ip": null
                    }
                }]
            }"#,
        );

        let schemas = get_schemas();
        let resources = load_resources(&path, &schemas).unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(
            resources[0].attributes.get("port_range"),
            Some(&Value::String("-1/-1".to_string()))
        );
        assert!(!resources[0].attributes.contains_key("cidr_ip"));
        assert!(validate_resources(&resources, &schemas).is_ok());
    }

    #[test]
    fn validation_errors_name_the_resource() {
        let schemas = get_schemas();
        let resources = vec![
            Resource::new("apsarastack_vpc", "main")
                .with_attribute("cidr_block", Value::String("10.0.0.1/8".to_string())),
            Resource::new("apsarastack_unknown", "x"),
        ];

        let err = validate_resources(&resources, &schemas).unwrap_err();
        assert!(err.contains("apsarastack_vpc.main: \"cidr_block\" must contain a valid network CIDR"));
        assert!(err.contains("Unknown resource type 'apsarastack_unknown'"));
    }

    #[test]
    fn suppressed_port_range_is_not_a_change() {
        let schemas = get_schemas();
        let desired = vec![
            Resource::new("apsarastack_security_group_rule", "ssh")
                .with_attribute("ip_protocol", Value::String("tcp".to_string()))
                .with_attribute("port_range", Value::String("-1/-1".to_string())),
        ];
        let id = ResourceId::new("apsarastack_security_group_rule", "ssh");
        let mut current = HashMap::new();
        current.insert(
            id.clone(),
            State::existing(
                id,
                [
                    ("ip_protocol".to_string(), Value::String("tcp".to_string())),
                    ("port_range".to_string(), Value::String("22/22".to_string())),
                ]
                .into_iter()
                .collect(),
            ),
        );

        let diffs = diff_all(&schemas, &desired, &current);
        assert_eq!(diffs.len(), 1);
        assert!(!diffs[0].is_change());
    }

    #[test]
    fn current_entries_keep_identifier() {
        let entry: ResourceEntry = serde_json::from_str(
            r#"{"type": "apsarastack_vpc", "name": "main", "identifier": "vpc-123", "attributes": {}}"#,
        )
        .unwrap();
        let state = entry.into_state();
        assert!(state.exists);
        assert_eq!(state.identifier.as_deref(), Some("vpc-123"));
    }
}
