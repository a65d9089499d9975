//! Routine factory.
//!
//! Turns a body-writing callback into an executable [`Routine`]. In
//! [`FactoryMode::Persisted`] every created routine is also written to disk
//! for inspection: a `.bpil` listing and, with the `persist` feature, a
//! `.bpir` bincode image that [`read_unit`] loads back for re-verification.
//! Persistence is a diagnostic side channel; failures are logged and never
//! fail routine creation.

use std::fs;
use std::path::{Path, PathBuf};

use bp_ir::{EmitError, RoutineBody, RoutineBuilder, Signature};
use tracing::{debug, warn};

use crate::{HostMethod, PersistError, Routine};

/// Where created routines live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FactoryMode {
    /// Memory only.
    Ephemeral,
    /// Memory, plus a listing per routine written into `dir`.
    Persisted { dir: PathBuf },
}

#[derive(Clone, Debug)]
pub struct RoutineFactory {
    mode: FactoryMode,
    verify: bool,
}

impl RoutineFactory {
    /// Stack verification is on in debug builds and always on when
    /// persisting.
    pub fn new(mode: FactoryMode) -> Self {
        let verify = cfg!(debug_assertions) || matches!(mode, FactoryMode::Persisted { .. });
        RoutineFactory { mode, verify }
    }

    pub fn ephemeral() -> Self {
        Self::new(FactoryMode::Ephemeral)
    }

    pub fn persisted(dir: impl Into<PathBuf>) -> Self {
        Self::new(FactoryMode::Persisted { dir: dir.into() })
    }

    /// Override verification. Persisted factories always verify.
    #[must_use]
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify || matches!(self.mode, FactoryMode::Persisted { .. });
        self
    }

    #[inline]
    pub fn mode(&self) -> &FactoryMode {
        &self.mode
    }

    #[inline]
    pub fn verifies(&self) -> bool {
        self.verify
    }

    /// Build a routine named `name` with `signature` from `write_body`.
    ///
    /// Structural misuse of the emitter, and stack imbalance when
    /// verification is on, fail with [`EmitError`]. These are generator
    /// bugs and are never retried.
    #[tracing::instrument(level = "debug", skip_all, fields(routine = name))]
    pub fn create(
        &self,
        name: &str,
        signature: Signature,
        write_body: impl FnOnce(&mut RoutineBuilder<HostMethod>),
    ) -> Result<Routine, EmitError> {
        let mut builder = RoutineBuilder::new(name, signature);
        write_body(&mut builder);
        let body = builder.finish()?;

        let max_stack = if self.verify {
            Some(body.verify()?.max_depth)
        } else {
            None
        };

        if let FactoryMode::Persisted { dir } = &self.mode {
            match write_unit(dir, &body) {
                Ok(path) => debug!(path = %path.display(), "routine persisted"),
                Err(error) => warn!(%error, "failed to persist routine"),
            }
        }

        debug!(ops = body.ops.len(), ?max_stack, "routine created");
        Ok(Routine::new(body, max_stack))
    }
}

impl Default for RoutineFactory {
    fn default() -> Self {
        Self::ephemeral()
    }
}

/// File stem for a routine name: anything outside `[A-Za-z0-9._-]` becomes
/// `_`.
pub fn unit_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Write the listing (and image, with `persist`) of `body` into `dir`.
/// Returns the listing path.
pub fn write_unit<M>(dir: &Path, body: &RoutineBody<M>) -> Result<PathBuf, PersistError> {
    fs::create_dir_all(dir)?;
    let stem = unit_file_stem(&body.name);
    let listing_path = dir.join(format!("{stem}.bpil"));
    fs::write(&listing_path, body.listing().as_str())?;

    #[cfg(feature = "persist")]
    {
        let image = body
            .image()
            .map_err(|e| PersistError::Encode(e.to_string()))?;
        let bytes = bincode::serialize(&image).map_err(|e| PersistError::Encode(e.to_string()))?;
        fs::write(dir.join(format!("{stem}.bpir")), bytes)?;
    }

    Ok(listing_path)
}

/// Load a persisted `.bpir` image.
#[cfg(feature = "persist")]
pub fn read_unit(path: &Path) -> Result<bp_ir::UnitImage, PersistError> {
    let bytes = fs::read(path)?;
    bincode::deserialize(&bytes).map_err(|e| PersistError::Decode(e.to_string()))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
mod tests;
