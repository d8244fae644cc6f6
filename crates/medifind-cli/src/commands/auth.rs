//! `medifind login | register | logout | whoami`

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use medifind_core::auth::AuthFormGuard;
use medifind_core::Role;

use super::{connect, load_config};

#[derive(Clone, Copy, ValueEnum)]
pub enum RoleArg {
    Customer,
    Retailer,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Customer => Role::Customer,
            RoleArg::Retailer => Role::Retailer,
        }
    }
}

#[derive(Args)]
pub struct LoginArgs {
    /// Account email
    email: String,

    /// Password (read from stdin when omitted)
    #[arg(short, long)]
    password: Option<String>,

    /// Only accept an account registered with this role
    #[arg(long = "as", value_enum)]
    role: Option<RoleArg>,
}

#[derive(Args)]
pub struct RegisterArgs {
    /// Account email
    email: String,

    /// Full name shown on the profile
    #[arg(short, long)]
    name: String,

    /// Password (read from stdin when omitted)
    #[arg(short, long)]
    password: Option<String>,

    #[arg(long = "as", value_enum, default_value = "customer")]
    role: RoleArg,

    #[arg(long)]
    phone: Option<String>,
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    print!("Password: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn print_slow_notice(message: &str) {
    eprintln!("{message}");
}

pub async fn login(args: LoginArgs) -> Result<()> {
    let password = password_or_prompt(args.password)?;
    let config = load_config()?;
    let app = connect(&config).await?;
    let guard = AuthFormGuard::new(config.slow_request_threshold);

    let profile = guard
        .run(
            app.auth.login(&args.email, &password, args.role.map(Role::from)),
            print_slow_notice,
        )
        .await?;
    app.auth.wait_idle().await;

    println!("Signed in as {} ({})", profile.full_name, profile.role);
    Ok(())
}

pub async fn register(args: RegisterArgs) -> Result<()> {
    let password = password_or_prompt(args.password)?;
    let config = load_config()?;
    let app = connect(&config).await?;
    let guard = AuthFormGuard::new(config.slow_request_threshold);

    let profile = guard
        .run(
            app.auth.register(
                &args.email,
                &password,
                &args.name,
                args.role.into(),
                args.phone.as_deref(),
            ),
            print_slow_notice,
        )
        .await?;
    app.auth.wait_idle().await;

    println!("Welcome, {}! Your {} account is ready.", profile.full_name, profile.role);
    Ok(())
}

pub async fn logout() -> Result<()> {
    let app = connect(&load_config()?).await?;
    if !app.auth.snapshot().is_authenticated() {
        println!("Not signed in.");
        return Ok(());
    }

    app.auth.logout().await?;
    println!("Signed out.");
    Ok(())
}

pub async fn whoami() -> Result<()> {
    let app = connect(&load_config()?).await?;
    let state = app.auth.snapshot();

    match (state.user, state.profile) {
        (Some(user), Some(profile)) => {
            println!("{} <{}>", profile.full_name, profile.email);
            println!("role:  {}", profile.role);
            if let Some(phone) = profile.phone {
                println!("phone: {phone}");
            }
            println!("id:    {}", user.id);
        }
        _ => println!("Not signed in."),
    }
    Ok(())
}
