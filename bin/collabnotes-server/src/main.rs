//! Executable entry point, mirroring `basic-server/src/main.rs`'s
//! env-driven adapter wiring at a larger scale (full `Config::from_env`
//! instead of a single `DB_DIR` variable).

use std::sync::Arc;

use collabnotes_core::Config;
use collabnotes_store_adapter_sqlite::StoreSqlite;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
	let config = Config::from_env().unwrap_or_else(|err| {
		eprintln!("FATAL: invalid configuration: {err}");
		std::process::exit(1);
	});

	let store = match StoreSqlite::new(&config.store_dsn).await {
		Ok(store) => Arc::new(store),
		Err(err) => {
			eprintln!("FATAL: could not open store at {}: {err}", config.store_dsn);
			std::process::exit(1);
		}
	};

	if let Err(err) = collabnotes::run(config, collabnotes::CollabNotesOpts { store }).await {
		eprintln!("FATAL: server exited with error: {err}");
		std::process::exit(1);
	}
}

// vim: ts=4
