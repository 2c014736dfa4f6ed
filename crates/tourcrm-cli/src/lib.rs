// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

mod helpers;

use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;

use clap::{error::ErrorKind, ArgAction, Parser, Subcommand};
use serde_json::json;
use tourcrm_api::openapi_v1_spec;
use tourcrm_core::{Clock, ExitCode, MachineError, OrganizationId, SystemClock, UserId};
use tourcrm_model::{parse_date, Role};
use tourcrm_server::{issue_token, TokenClaims};
use tourcrm_store::auth::{create_organization, create_user, get_auth_user};
use tourcrm_store::{check_schema, run_report, DateRange, NewUser, StoreError, REPORT_NAMES};

use helpers::{emit_ok, open_store, write_json};

pub const CRATE_NAME: &str = "tourcrm-cli";

#[derive(Parser)]
#[command(name = "tourcrm")]
#[command(about = "Tour operator CRM operations CLI", version)]
#[command(
    after_help = "Environment:\n  CRM_DATABASE_PATH   Default database file\n  CRM_TOKEN_SECRET    Signing secret for issue-token"
)]
struct Cli {
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
    #[arg(long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[arg(long, global = true, env = "CRM_DATABASE_PATH", default_value = "data/tourcrm.sqlite3")]
    db: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations and report the schema state.
    Migrate,
    CreateOrg {
        #[arg(long)]
        name: String,
        #[arg(long)]
        slug: String,
    },
    CreateUser {
        #[arg(long)]
        org: i64,
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "agent")]
        role: String,
        #[arg(long, env = "CRM_USER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign a bearer token for an existing user.
    IssueToken {
        #[arg(long)]
        user_id: i64,
        #[arg(long, default_value_t = 3600)]
        ttl_secs: u64,
        #[arg(long, env = "CRM_TOKEN_SECRET", hide_env_values = true)]
        secret: String,
    },
    Report {
        #[arg(long)]
        org: i64,
        /// `<category>/<report>`, e.g. `executive/summary`.
        name: String,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    Openapi {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List the available report names.
    Reports,
}

#[derive(Clone, Copy)]
pub(crate) struct OutputMode {
    pub(crate) json: bool,
}

#[derive(Debug)]
struct CliError {
    exit_code: ExitCode,
    machine: MachineError,
}

impl CliError {
    fn usage(message: &str) -> Self {
        Self {
            exit_code: ExitCode::Usage,
            machine: MachineError::new("usage_error", message),
        }
    }

    fn internal(message: String) -> Self {
        Self {
            exit_code: ExitCode::Internal,
            machine: MachineError::new("internal_error", &message),
        }
    }

    fn store(err: StoreError) -> Self {
        let (exit_code, code) = match &err {
            StoreError::Sql(_) | StoreError::Pool(_) => (ExitCode::DependencyFailure, "store_error"),
            StoreError::NotFound { .. } => (ExitCode::Validation, "not_found"),
            StoreError::Conflict { .. } => (ExitCode::Validation, "conflict"),
            _ => (ExitCode::Validation, "validation_error"),
        };
        Self {
            exit_code,
            machine: MachineError::new(code, &err.to_string()),
        }
    }
}

pub fn main_entry() -> ProcessExitCode {
    let wants_json = std::env::args().any(|arg| arg == "--json");
    match run() {
        Ok(()) => ProcessExitCode::from(ExitCode::Success as u8),
        Err(err) => {
            emit_error(&err, wants_json);
            ProcessExitCode::from(err.exit_code as u8)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<(), CliError> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{err}");
                return Ok(());
            }
            _ => {
                return Err(CliError {
                    exit_code: ExitCode::Usage,
                    machine: MachineError::new("usage_error", "invalid command line arguments")
                        .with_detail("error", &err.to_string()),
                });
            }
        },
    };
    init_logging(cli.verbose);
    let output = OutputMode { json: cli.json };
    let command = cli
        .command
        .ok_or_else(|| CliError::usage("missing command; see --help"))?;

    match command {
        Commands::Migrate => {
            let store = open_store(&cli.db).map_err(CliError::store)?;
            let report = store.call_blocking(|conn, _| check_schema(conn)).map_err(CliError::store)?;
            let ok = report.ok;
            emit_ok(output, json!({ "command": "migrate", "db": cli.db, "schema": report }))
                .map_err(CliError::internal)?;
            if ok {
                Ok(())
            } else {
                Err(CliError {
                    exit_code: ExitCode::Validation,
                    machine: MachineError::new("schema_drift", "schema check failed"),
                })
            }
        }
        Commands::CreateOrg { name, slug } => {
            let store = open_store(&cli.db).map_err(CliError::store)?;
            let org = store
                .call_blocking(|conn, ctx| create_organization(conn, ctx, &name, &slug))
                .map_err(CliError::store)?;
            emit_ok(output, json!({ "command": "create-org", "organization": org }))
                .map_err(CliError::internal)
        }
        Commands::CreateUser {
            org,
            email,
            name,
            role,
            password,
        } => {
            let org = OrganizationId::new(org).map_err(|e| CliError::usage(&e.to_string()))?;
            let role = Role::parse(&role).map_err(|e| CliError::usage(&e.to_string()))?;
            let user = NewUser {
                email,
                name,
                role,
                password,
            };
            let store = open_store(&cli.db).map_err(CliError::store)?;
            let row = store
                .call_blocking(|conn, ctx| create_user(conn, ctx, org, None, &user))
                .map_err(CliError::store)?;
            emit_ok(output, json!({ "command": "create-user", "user": row }))
                .map_err(CliError::internal)
        }
        Commands::IssueToken {
            user_id,
            ttl_secs,
            secret,
        } => {
            if secret.len() < 16 {
                return Err(CliError::usage("token secret must be at least 16 bytes"));
            }
            let user_id = UserId::new(user_id).map_err(|e| CliError::usage(&e.to_string()))?;
            let store = open_store(&cli.db).map_err(CliError::store)?;
            let user = store
                .call_blocking(|conn, _| get_auth_user(conn, user_id))
                .map_err(CliError::store)?;
            let now = SystemClock.unix_secs();
            let ttl = i64::try_from(ttl_secs).map_err(|_| CliError::usage("ttl too large"))?;
            let claims = TokenClaims {
                sub: user.id,
                org: user.organization_id,
                role: user.role,
                iat: now,
                exp: now.saturating_add(ttl),
            };
            let token = issue_token(&secret, &claims).map_err(CliError::internal)?;
            emit_ok(
                output,
                json!({ "command": "issue-token", "token": token, "expires_at": claims.exp, "user": user }),
            )
            .map_err(CliError::internal)
        }
        Commands::Report {
            org,
            name,
            from,
            to,
        } => {
            let org = OrganizationId::new(org).map_err(|e| CliError::usage(&e.to_string()))?;
            let day = |raw: Option<String>, flag: &str| {
                raw.map(|r| {
                    parse_date(r.trim())
                        .ok_or_else(|| CliError::usage(&format!("--{flag} must be YYYY-MM-DD")))
                })
                .transpose()
            };
            let range = DateRange {
                from: day(from, "from")?,
                to: day(to, "to")?,
            };
            let today = SystemClock.today();
            let store = open_store(&cli.db).map_err(CliError::store)?;
            let data = store
                .call_blocking(|conn, _| run_report(conn, &name, org, &range, today))
                .map_err(CliError::store)?;
            emit_ok(output, json!({ "command": "report", "report": name, "data": data }))
                .map_err(CliError::internal)
        }
        Commands::Openapi { out } => {
            let spec = openapi_v1_spec();
            match out {
                Some(path) => {
                    write_json(&path, &spec).map_err(CliError::internal)?;
                    emit_ok(output, json!({ "command": "openapi", "status": "ok", "out": path }))
                        .map_err(CliError::internal)
                }
                None => emit_ok(output, spec).map_err(CliError::internal),
            }
        }
        Commands::Reports => emit_ok(output, json!({ "reports": REPORT_NAMES }))
            .map_err(CliError::internal),
    }
}

fn emit_error(error: &CliError, machine_json: bool) {
    if machine_json {
        match serde_json::to_string(&error.machine) {
            Ok(payload) => eprintln!("{payload}"),
            Err(_) => eprintln!(
                "{{\"code\":\"internal_error\",\"message\":\"failed to encode structured error\",\"details\":{{}}}}"
            ),
        }
    } else {
        eprintln!("{}", error.machine.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn store_errors_map_to_exit_codes() {
        let err = CliError::store(StoreError::not_found("organizations", 4));
        assert_eq!(err.exit_code, ExitCode::Validation);
        assert_eq!(err.machine.code, "not_found");
        let err = CliError::store(StoreError::Sql("disk I/O error".to_string()));
        assert_eq!(err.exit_code, ExitCode::DependencyFailure);
    }
}
