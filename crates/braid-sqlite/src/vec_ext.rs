//! sqlite-vec registration.
//!
//! The extension is registered process-wide as an auto extension, so every
//! connection opened afterwards gets `vec_distance_l2`, `vec_distance_cosine`
//! and friends. Set `BRAID_SQLITE_VEC_AUTO=0` to keep it off; dense search
//! then always uses the in-process scan.

use anyhow::{Result, anyhow};
use rusqlite::Connection;
use std::sync::OnceLock;

const AUTO_ENABLE_ENV: &str = "BRAID_SQLITE_VEC_AUTO";

static REGISTRATION: OnceLock<Result<(), String>> = OnceLock::new();

/// Register sqlite-vec for all connections opened after this call.
///
/// # Errors
///
/// Fails when disabled through `BRAID_SQLITE_VEC_AUTO` or when SQLite rejects
/// the registration.
pub fn register_auto_extension() -> Result<()> {
    if matches!(
        std::env::var(AUTO_ENABLE_ENV).ok().as_deref(),
        Some("0" | "false" | "off")
    ) {
        return Err(anyhow!("sqlite-vec auto-extension disabled by {AUTO_ENABLE_ENV}"));
    }

    REGISTRATION
        .get_or_init(register_once)
        .clone()
        .map_err(|e| anyhow!(e))
}

/// Whether `conn` can call sqlite-vec functions.
#[must_use]
pub fn vec_available(conn: &Connection) -> bool {
    conn.query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0))
        .is_ok()
}

fn register_once() -> Result<(), String> {
    #[allow(clippy::transmute_ptr_to_ptr)]
    let entrypoint: unsafe extern "C" fn(
        *mut rusqlite::ffi::sqlite3,
        *mut *const std::os::raw::c_char,
        *const rusqlite::ffi::sqlite3_api_routines,
    ) -> std::os::raw::c_int =
        unsafe { std::mem::transmute(sqlite_vec::sqlite3_vec_init as *const ()) };

    let rc = unsafe { rusqlite::ffi::sqlite3_auto_extension(Some(entrypoint)) };
    if rc == rusqlite::ffi::SQLITE_OK {
        Ok(())
    } else {
        Err(format!("sqlite3_auto_extension failed with rc={rc}"))
    }
}
