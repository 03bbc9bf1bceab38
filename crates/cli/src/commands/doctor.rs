use pumi_core::config::{AppConfig, LoadOptions};
use pumi_core::crypto::TokenCipher;
use pumi_db::repositories::{CredentialRepository, SqlCredentialRepository};
use pumi_db::{connect_with_settings, migrations::MIGRATOR, DbPool};
use serde::Serialize;

use crate::commands::{escape_json, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub overall_status: CheckStatus,
    pub summary: String,
    pub checks: Vec<DoctorCheck>,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, because: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {because}") }
    }
}

pub fn run(options: &LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

pub fn build_report(options: &LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.clone()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass("config_validation", "configuration loaded and validated"));
            checks.push(check_encryption_key(&config));
            checks.extend(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            for name in ["encryption_key", "database_connectivity", "migrations", "installations"] {
                checks.push(DoctorCheck::skipped(name, "configuration did not load"));
            }
        }
    }

    // Skipped checks only ever follow a failure, so they never mask one.
    let all_pass = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let (overall_status, summary) = if all_pass {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    } else {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_encryption_key(config: &AppConfig) -> DoctorCheck {
    match TokenCipher::from_hex_key(&config.security.encryption_key) {
        Ok(_) => DoctorCheck::pass("encryption_key", "AES-256-GCM key accepted"),
        Err(error) => DoctorCheck::fail("encryption_key", error.to_string()),
    }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::fail(
                    "database_connectivity",
                    format!("failed to initialize async runtime: {error}"),
                ),
                DoctorCheck::skipped("migrations", "the database was not reachable"),
                DoctorCheck::skipped("installations", "the database was not reachable"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::fail(
                        "database_connectivity",
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::skipped("migrations", "the database was not reachable"),
                    DoctorCheck::skipped("installations", "the database was not reachable"),
                ];
            }
        };

        let mut checks = vec![DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        )];
        let migrations = check_migrations(&pool).await;
        let current = migrations.status == CheckStatus::Pass;
        checks.push(migrations);
        checks.push(if current {
            check_installations(&pool).await
        } else {
            DoctorCheck::skipped("installations", "migrations are not applied")
        });

        pool.close().await;
        checks
    })
}

async fn check_migrations(pool: &DbPool) -> DoctorCheck {
    let expected =
        MIGRATOR.migrations.iter().filter(|migration| !migration.migration_type.is_down_migration()).count();
    // A missing bookkeeping table means nothing was ever applied.
    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    if usize::try_from(applied).unwrap_or(0) >= expected {
        DoctorCheck::pass("migrations", format!("{applied} of {expected} migration(s) applied"))
    } else {
        DoctorCheck::fail(
            "migrations",
            format!("{applied} of {expected} migration(s) applied; run `pumi migrate`"),
        )
    }
}

async fn check_installations(pool: &DbPool) -> DoctorCheck {
    match SqlCredentialRepository::new(pool.clone()).list_active().await {
        Ok(active) => {
            DoctorCheck::pass("installations", format!("{} active installation(s)", active.len()))
        }
        Err(error) => DoctorCheck::fail("installations", error.to_string()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
