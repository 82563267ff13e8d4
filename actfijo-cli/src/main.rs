//! ActFijo CLI - inspect sessions and access from the command line
//!
//! Drives the access layer against a running backend and renders the gated
//! navigation and screen actions as text.

use actfijo_access::{
    compose_sidebar, guard_module, guard_route, visible_actions, AccessController, AccessQuery,
    BackendClient, EvaluatorState, FileTokenStorage, Gate, PreferenceUpdate, RouteDecision,
    ThemePatch, ThemePrefs,
};
use actfijo_core::{
    init_logging, log_operation_error, log_operation_start, ActFijoConfig, LoggingConfig,
};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};

type Controller = AccessController<FileTokenStorage, BackendClient>;

#[derive(Parser)]
#[command(name = "actfijo")]
#[command(about = "Session and access inspector for the ActFijo asset management backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON where supported
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the configuration file
    Config {
        /// Write a default configuration file
        #[arg(long)]
        init: bool,

        /// Print the effective configuration
        #[arg(long)]
        show: bool,
    },

    #[command(flatten)]
    Access(AccessCommands),
}

/// Commands that run against a booted session
#[derive(Subcommand)]
enum AccessCommands {
    /// Log in with username and password
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,
    },

    /// Start a session from an already issued access token
    UseToken {
        token: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the identity of the current session
    Whoami,

    /// List the effective permissions
    Permissions,

    /// Check access to a module (exit status 1 when denied)
    Can {
        module: String,
    },

    /// Check a permission by exact name (exit status 1 when denied)
    HasPermission {
        name: String,
    },

    /// Check a role by exact name (exit status 1 when denied)
    HasRole {
        name: String,
    },

    /// Show the sidebar for the current session
    Nav {
        /// Module to mark as active
        #[arg(long)]
        current: Option<String>,
    },

    /// Show the actions available on a module screen
    Actions {
        screen: String,
    },

    /// List company roles with their permissions
    Roles,

    /// Show or update theme preferences
    Theme {
        /// light, dark, custom, or reset
        #[arg(long)]
        preference: Option<PreferenceUpdate>,

        /// Custom color, #RGB or #RRGGBB
        #[arg(long)]
        color: Option<String>,

        #[arg(long)]
        glow: Option<bool>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(&LoggingConfig::for_cli(cli.verbose))
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    debug!("Starting ActFijo CLI v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Config { init, show } => handle_config(cli.config.as_deref(), &config, init, show),
        Commands::Access(command) => {
            let mut access = boot_controller(&config).await?;
            run(&mut access, command, cli.json).await
        }
    }
}

async fn run(access: &mut Controller, command: AccessCommands, json: bool) -> Result<ExitCode> {
    match command {
        AccessCommands::Login { username, password } => {
            log_operation_start!("login", username = %username);
            if let Err(e) = access.login(&username, &password).await {
                log_operation_error!("login", e);
                return Err(e).context("Login failed");
            }
            print_identity(access, json)?;
        }
        AccessCommands::UseToken { token } => {
            access
                .sign_in(&token)
                .await
                .context("The token could not be decoded")?;
            print_identity(access, json)?;
        }
        AccessCommands::Logout => {
            access.sign_out().await;
            println!("Logged out");
        }
        AccessCommands::Whoami => {
            if !access.session().is_authenticated {
                println!("Not logged in");
                return Ok(ExitCode::FAILURE);
            }
            print_identity(access, json)?;
        }
        AccessCommands::Permissions => handle_permissions(access, json)?,
        AccessCommands::Can { module } => {
            let allowed = access.can_access(&module);
            info!(module = %module, allowed, "Module access checked");
            return Ok(report(allowed));
        }
        AccessCommands::HasPermission { name } => return Ok(report(access.has_permission(&name))),
        AccessCommands::HasRole { name } => return Ok(report(access.has_role(&name))),
        AccessCommands::Nav { current } => return handle_nav(access, current.as_deref(), json),
        AccessCommands::Actions { screen } => return handle_actions(access, &screen, json),
        AccessCommands::Roles => handle_roles(access, json).await?,
        AccessCommands::Theme {
            preference,
            color,
            glow,
        } => {
            let patch = ThemePatch {
                theme_preference: preference,
                theme_custom_color: color,
                theme_glow_enabled: glow,
            };
            handle_theme(access, patch, json).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load_config(path: Option<&Path>) -> Result<ActFijoConfig> {
    let config = ActFijoConfig::load_or_default(path)
        .context("Failed to load configuration")?
        .with_env_overrides();
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn boot_controller(config: &ActFijoConfig) -> Result<Controller> {
    let client = BackendClient::new(config.api.clone())?;
    let storage = FileTokenStorage::from_config(&config.storage);
    debug!(path = %storage.path().display(), "Using token file");

    let mut access = AccessController::new(storage, client);
    if let Err(e) = access.boot().await {
        if e.forces_logout() {
            eprintln!("Stored session is no longer valid; log in again.");
        }
    }
    Ok(access)
}

fn report(allowed: bool) -> ExitCode {
    if allowed {
        println!("allowed");
        ExitCode::SUCCESS
    } else {
        println!("denied");
        ExitCode::FAILURE
    }
}

fn print_identity(access: &Controller, json: bool) -> Result<()> {
    let session = access.session();
    if json {
        println!("{}", serde_json::to_string_pretty(session)?);
        return Ok(());
    }

    let identity = &session.identity;
    let or_dash = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());

    println!("User:        {}", or_dash(&identity.username));
    println!("Name:        {}", or_dash(&identity.full_name));
    println!("Email:       {}", or_dash(&identity.email));
    println!("Company:     {}", or_dash(&identity.company_name));
    println!("Employee:    {}", or_dash(&identity.employee_id));
    println!("Roles:       {}", session.sorted_roles().join(", "));
    println!("Super admin: {}", if session.is_super_admin { "yes" } else { "no" });
    if let Some(expires) = session
        .expires_at
        .and_then(|exp| chrono::DateTime::from_timestamp(exp, 0))
    {
        println!("Expires:     {}", expires.to_rfc3339());
    }
    print_theme(&identity.theme);
    Ok(())
}

fn print_theme(theme: &ThemePrefs) {
    println!(
        "Theme:       {} / {} / glow {}",
        theme
            .theme_preference
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string()),
        theme.theme_custom_color.as_deref().unwrap_or("-"),
        theme
            .theme_glow_enabled
            .map(|g| if g { "on" } else { "off" })
            .unwrap_or("-"),
    );
}

fn handle_permissions(access: &Controller, json: bool) -> Result<()> {
    match access.evaluator().state() {
        EvaluatorState::SuperAdminBypass => {
            if json {
                println!("{}", serde_json::json!({"super_admin": true}));
            } else {
                println!("Super admin: every permission is granted");
            }
        }
        EvaluatorState::Loaded(permissions) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&permissions.sorted())?);
            } else if permissions.is_empty() {
                println!("(no permissions)");
            } else {
                for name in permissions.sorted() {
                    println!("{}", name);
                }
            }
        }
        EvaluatorState::Uninitialized | EvaluatorState::Loading => {
            bail!("Permissions are still loading")
        }
    }
    Ok(())
}

/// Refuse to render gated views without a session
fn ensure_logged_in(access: &Controller) -> Option<ExitCode> {
    match guard_route(access.session_loading(), access.session().is_authenticated) {
        RouteDecision::Render => None,
        _ => {
            eprintln!("Not logged in. Run `actfijo login` first.");
            Some(ExitCode::FAILURE)
        }
    }
}

fn handle_nav(access: &Controller, current: Option<&str>, json: bool) -> Result<ExitCode> {
    if let Some(code) = ensure_logged_in(access) {
        return Ok(code);
    }

    if let Some(module) = current {
        if guard_module(access, module) == RouteDecision::Forbidden {
            eprintln!("No access to '{}'", module);
        }
    }

    let sidebar = compose_sidebar(access, current);
    if json {
        println!("{}", serde_json::to_string_pretty(&sidebar)?);
        return Ok(ExitCode::SUCCESS);
    }

    for item in &sidebar.items {
        let marker = if item.active { "*" } else { " " };
        println!("{} {:<20} {}", marker, item.module, item.label);
    }
    println!("  {}", "-".repeat(30));
    let marker = if sidebar.footer.active { "*" } else { " " };
    println!("{} {:<20} {}", marker, sidebar.footer.module, sidebar.footer.label);
    Ok(ExitCode::SUCCESS)
}

fn handle_actions(access: &Controller, screen: &str, json: bool) -> Result<ExitCode> {
    if let Some(code) = ensure_logged_in(access) {
        return Ok(code);
    }

    match guard_module(access, screen) {
        RouteDecision::Render => {}
        _ => {
            eprintln!("No access to '{}'", screen);
            return Ok(ExitCode::FAILURE);
        }
    }

    let actions = visible_actions(access, screen);
    if json {
        println!("{}", serde_json::to_string_pretty(&actions)?);
        return Ok(ExitCode::SUCCESS);
    }

    if actions.is_empty() {
        println!("(read only)");
    }
    for action in actions {
        let gate = match action.gate {
            Gate::Module(module) => format!("module {}", module),
            Gate::Permission(permission) => permission.to_string(),
            Gate::Role(role) => format!("role {} (legacy)", role),
        };
        println!("{:<10} {:<28} [{}]", action.action, action.label, gate);
    }
    Ok(ExitCode::SUCCESS)
}

async fn handle_roles(access: &mut Controller, json: bool) -> Result<()> {
    if !access.session().is_authenticated {
        bail!("Not logged in");
    }

    let roles = access.roles().await;
    if json {
        println!("{}", serde_json::to_string_pretty(roles)?);
        return Ok(());
    }

    if roles.is_empty() {
        println!("(no roles)");
    }
    for role in roles {
        println!("{}", role.nombre);
        for name in role.permission_names() {
            println!("  {}", name);
        }
    }
    Ok(())
}

async fn handle_theme(access: &mut Controller, patch: ThemePatch, json: bool) -> Result<()> {
    if !access.session().is_authenticated {
        bail!("Not logged in");
    }

    let theme = if patch.is_empty() {
        access.session().identity.theme.clone()
    } else {
        access
            .patch_theme(&patch)
            .await
            .context("Failed to update theme preferences")?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&theme)?);
    } else {
        print_theme(&theme);
    }
    Ok(())
}

fn handle_config(
    path: Option<&Path>,
    config: &ActFijoConfig,
    init: bool,
    show: bool,
) -> Result<ExitCode> {
    if init {
        let Some(target) = path.map(Path::to_path_buf).or_else(ActFijoConfig::default_path) else {
            bail!("No configuration directory available; pass --config");
        };
        if target.exists() {
            bail!("{} already exists", target.display());
        }
        ActFijoConfig::default().save_to_file(&target)?;
        println!("Configuration written to {}", target.display());
    }

    if show || !init {
        println!("{}", toml::to_string_pretty(config)?);
    }

    Ok(ExitCode::SUCCESS)
}
