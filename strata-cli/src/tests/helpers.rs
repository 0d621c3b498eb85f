//! Scripted datasource wiring shared by the CLI tests.

use super::*;
use std::sync::Arc;
use strata_core::Value;
use strata_pool::ConnectionIdentity;
use strata_pool::test_support::{ScriptedBackend, ScriptedRows};

/// PostGIS type identifier the scripted server reports for `geometry`.
const GEOMETRY_OID: u32 = 17_285;
const INT4: u32 = 23;
const VARCHAR: u32 = 1_043;
const BYTEA: u32 = 17;

/// Opens layers against a scripted backend instead of a live server.
pub(super) struct ScriptedOpener {
    pub(super) backend: ScriptedBackend,
}

impl LayerOpener for ScriptedOpener {
    fn open(&self, params: &Parameters, pools: &PoolManager) -> Result<PostgisDatasource, CliError> {
        Ok(PostgisDatasource::with_creator(
            params,
            pools,
            Arc::new(self.backend.clone()),
        )?)
    }
}

pub(super) fn identity() -> ConnectionIdentity {
    ConnectionIdentity::new("db.internal", "gis", "render")
}

/// A server holding a `roads` table with two rows near the origin.
pub(super) fn roads_backend() -> ScriptedBackend {
    ScriptedBackend::new(identity())
        .with_rows(
            "pg_type",
            ScriptedRows::new()
                .column("oid", INT4, Some(4))
                .row([Value::Integer(i64::from(GEOMETRY_OID))]),
        )
        .with_rows(
            "geometry_columns",
            ScriptedRows::new()
                .column("f_geometry_column", VARCHAR, None)
                .column("srid", INT4, Some(4))
                .column("type", VARCHAR, None)
                .row([Value::from("way"), Value::Integer(3857), Value::from("LINESTRING")]),
        )
        .with_rows(
            "ST_EstimatedExtent",
            ScriptedRows::new().row([-500.0, -250.0, 500.0, 250.0].map(Value::Double)),
        )
        .with_rows(
            "limit 1",
            ScriptedRows::new()
                .column("gid", INT4, Some(4))
                .column("way", GEOMETRY_OID, None)
                .column("name", VARCHAR, None),
        )
        .with_rows(
            "ST_MakeEnvelope",
            ScriptedRows::new()
                .column("gid", INT4, Some(4))
                .column("way", BYTEA, None)
                .column("name", VARCHAR, None)
                .row([Value::Integer(7), Value::Bytes(vec![1, 2, 3]), Value::from("Ring Road")])
                .row([Value::Integer(9), Value::Bytes(vec![4, 5, 6]), Value::from("Canal Street")]),
        )
}

/// Parse `argv` and run the command against `backend`, capturing stdout.
pub(super) fn run_scripted(backend: &ScriptedBackend, argv: &[&str]) -> (Result<(), CliError>, Vec<u8>) {
    let mut stdout = Vec::new();
    let pools = PoolManager::new();
    let opener = ScriptedOpener {
        backend: backend.clone(),
    };
    let outcome = Cli::try_parse_from(argv)
        .map_err(CliError::from)
        .and_then(|cli| run_with(cli.command, &opener, &pools, &mut stdout));
    pools.shutdown();
    (outcome, stdout)
}

pub(super) fn stdout_json(stdout: &[u8]) -> serde_json::Value {
    serde_json::from_slice(stdout).expect("stdout should hold JSON")
}
