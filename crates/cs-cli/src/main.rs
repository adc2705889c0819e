//! CleanStream CLI
//!
//! CLI tool for compiling block rules and driving the control plane.

mod ctl;
mod rules;

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use env_logger::{Builder, Env};

#[derive(Parser)]
#[command(name = "cs-cli")]
#[command(about = "CleanStream rule compiler and control-plane tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the dynamic rule update for an allowlist
    Rules {
        /// Allowlisted site (repeatable)
        #[arg(short, long = "allow")]
        allow: Vec<String>,

        /// Compile with filtering switched off
        #[arg(long)]
        disabled: bool,

        /// Template list file (defaults to the built-in list)
        #[arg(short, long)]
        templates: Option<PathBuf>,

        /// Background settings JSON
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Validate a template list
    Templates {
        /// Template list file to validate
        #[arg(short, long)]
        input: PathBuf,

        /// Background settings JSON (rule id offset and priority)
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },

    /// Check whether a request would be blocked
    Check {
        /// Request URL
        url: String,

        /// Site the request is made from
        #[arg(long, default_value = "https://www.youtube.com/")]
        site: String,

        /// Resource type of the request
        #[arg(short = 'r', long = "type", default_value = "script")]
        resource_type: String,

        /// Allowlisted site (repeatable)
        #[arg(short, long = "allow")]
        allow: Vec<String>,

        /// Template list file (defaults to the built-in list)
        #[arg(short, long)]
        templates: Option<PathBuf>,

        /// Background settings JSON
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },

    /// Send control-plane messages against a file-backed store
    Ctl {
        /// JSON message, e.g. '{"cmd":"getState","site":"example.com"}' (repeatable)
        messages: Vec<String>,

        /// State file
        #[arg(long, default_value = "cleanstream-state.json")]
        store: PathBuf,

        /// Background settings JSON
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Template list file (defaults to the built-in list)
        #[arg(short, long)]
        templates: Option<PathBuf>,

        /// Run the first-install hook (resets the state file)
        #[arg(long)]
        install: bool,

        /// Report a rule match for this session id (repeatable)
        #[arg(long = "hit")]
        hits: Vec<i64>,

        /// Fire a keyboard shortcut
        #[arg(long)]
        shortcut: Option<String>,

        /// Print the active rule set afterwards
        #[arg(long)]
        show_rules: bool,
    },
}

fn main() {
    Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Rules {
            allow,
            disabled,
            templates,
            settings,
            output,
            pretty,
        } => cmd_rules(&allow, disabled, templates, settings, output, pretty),
        Commands::Templates { input, settings } => cmd_templates(input, settings),
        Commands::Check {
            url,
            site,
            resource_type,
            allow,
            templates,
            settings,
        } => cmd_check(&url, &site, &resource_type, &allow, templates, settings),
        Commands::Ctl {
            messages,
            store,
            settings,
            templates,
            install,
            hits,
            shortcut,
            show_rules,
        } => cmd_ctl(
            settings,
            templates,
            ctl::CtlOptions {
                store,
                install,
                hits,
                shortcut,
                messages,
                show_rules,
            },
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_rules(
    allow: &[String],
    disabled: bool,
    templates: Option<PathBuf>,
    settings: Option<PathBuf>,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), String> {
    let settings = rules::read_settings(settings.as_deref())?;
    let set = rules::load_templates(templates.as_deref(), settings.compile_options())?;
    let json = rules::render_update(&set, allow, !disabled, pretty)?;

    match output {
        Some(path) => {
            fs::write(&path, &json).map_err(|e| format!("Failed to write '{}': {}", path.display(), e))?;
            println!(
                "Wrote {} rules to '{}'",
                if disabled { 0 } else { set.len() },
                path.display()
            );
        }
        None => println!("{}", json),
    }

    Ok(())
}

fn cmd_templates(input: PathBuf, settings: Option<PathBuf>) -> Result<(), String> {
    let settings = rules::read_settings(settings.as_deref())?;
    let set = rules::load_templates(Some(input.as_path()), settings.compile_options())?;
    let ids = set.owned_ids();

    println!("Template list '{}' is valid", input.display());
    println!("  Templates:   {}", set.len());
    println!("  Rule ids:    {}..{}", ids.start, ids.end);
    for (id, template) in ids.zip(set.templates()) {
        println!("  [{}] {} ({})", id, template.pattern, template.resource_types.names().join(","));
    }

    Ok(())
}

fn cmd_check(
    url: &str,
    site: &str,
    resource_type: &str,
    allow: &[String],
    templates: Option<PathBuf>,
    settings: Option<PathBuf>,
) -> Result<(), String> {
    let settings = rules::read_settings(settings.as_deref())?;
    let set = rules::load_templates(templates.as_deref(), settings.compile_options())?;
    let compiled = set.compile(allow, true);

    match rules::find_blocking_rule(&compiled, url, site, resource_type)? {
        Some(id) => println!("BLOCK {} (rule {})", url, id),
        None => println!("ALLOW {}", url),
    }

    Ok(())
}

fn cmd_ctl(settings: Option<PathBuf>, templates: Option<PathBuf>, options: ctl::CtlOptions) -> Result<(), String> {
    let settings = rules::read_settings(settings.as_deref())?;
    let set = rules::load_templates(templates.as_deref(), settings.compile_options())?;
    ctl::run(&settings, set, options)
}
