//! Preflight for `pumi-server`: everything bootstrap needs, without binding a port.

use pumi_core::config::LoadOptions;
use pumi_core::crypto::TokenCipher;
use pumi_db::{connect_with_settings, migrations};

use crate::commands::{
    load_config, runtime, CommandResult, EXIT_CONFIG, EXIT_DATABASE, EXIT_MIGRATION,
};

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config("start", options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    if let Err(error) = TokenCipher::from_hex_key(&config.security.encryption_key) {
        return CommandResult::failure("start", "encryption_key", error.to_string(), EXIT_CONFIG);
    }

    let runtime = match runtime("start") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DATABASE))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;
        pool.close().await;
        Ok::<(), (&'static str, String, u8)>(())
    });

    match result {
        Ok(()) => CommandResult::success(
            "start",
            format!(
                "preflight passed; pumi-server will listen on {}:{}",
                config.server.bind_address, config.server.port
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("start", error_class, message, exit_code)
        }
    }
}
