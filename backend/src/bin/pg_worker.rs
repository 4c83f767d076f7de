//! `pg_worker`: runs embedded PostgreSQL lifecycle steps on behalf of the
//! store's integration suites.
//!
//! `pg-embed-setup-unpriv` will not manage a cluster from a root process, so
//! it re-executes this binary with dropped privileges as
//! `pg_worker <step> <payload.json>`. The payload is the library's own
//! `WorkerPayload`.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::env;
use std::ffi::OsString;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use cap_std::ambient_authority;
use cap_std::fs::Dir;
use color_eyre::eyre::{Context, Report, Result, bail, eyre};
use pg_embedded_setup_unpriv::worker::WorkerPayload;
use postgresql_embedded::{PostgreSQL, Settings, Status};
use tokio::runtime::Builder;

// Written by initdb once a data directory is fully initialised.
const INITIALISED_MARKER: &str = "global/pg_filenode.map";

fn main() -> Result<()> {
    color_eyre::install()?;
    let invocation = Invocation::from_args(env::args_os())?;
    let payload = read_payload(&invocation.payload_path)?;
    invocation.step.run(payload)
}

/// One lifecycle step and where its payload lives.
#[derive(Debug, PartialEq, Eq)]
struct Invocation {
    step: Step,
    payload_path: PathBuf,
}

impl Invocation {
    fn from_args(args: impl IntoIterator<Item = OsString>) -> Result<Self> {
        let mut args = args.into_iter().skip(1);
        let step: Step = args
            .next()
            .ok_or_else(|| eyre!("usage: pg_worker <step> <payload.json>"))?
            .to_string_lossy()
            .parse()?;
        let payload_path = args
            .next()
            .map(PathBuf::from)
            .ok_or_else(|| eyre!("pg_worker {step}: payload path is required"))?;
        if let Some(extra) = args.next() {
            bail!(
                "pg_worker {step}: unexpected argument {}",
                extra.to_string_lossy()
            );
        }
        Ok(Self { step, payload_path })
    }
}

/// Split `path` into an ambient handle on its parent and its final
/// component.
fn open_parent(path: &Path) -> Result<(Dir, PathBuf)> {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        bail!("{} has no parent directory", path.display());
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .wrap_err_with(|| format!("open {}", parent.display()))?;
    Ok((dir, PathBuf::from(name)))
}

fn read_payload(path: &Path) -> Result<WorkerPayload> {
    let (dir, name) = open_parent(path)?;
    let raw = dir
        .read(&name)
        .wrap_err_with(|| format!("read worker payload {}", path.display()))?;
    serde_json::from_slice(&raw)
        .wrap_err_with(|| format!("decode worker payload {}", path.display()))
}

/// Remove a directory tree; a tree that is already gone counts as removed.
fn remove_tree(path: &Path) -> Result<()> {
    let (dir, name) = match open_parent(path) {
        Ok(opened) => opened,
        Err(error) if is_not_found(&error) => return Ok(()),
        Err(error) => return Err(error),
    };
    match dir.remove_dir_all(&name) {
        Err(error) if error.kind() != ErrorKind::NotFound => {
            Err(error).wrap_err_with(|| format!("remove {}", path.display()))
        }
        _ => Ok(()),
    }
}

fn is_not_found(error: &Report) -> bool {
    error
        .downcast_ref::<std::io::Error>()
        .is_some_and(|io| io.kind() == ErrorKind::NotFound)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Setup,
    Start,
    Stop,
    /// Remove the data directory.
    Cleanup,
    /// Remove the data directory and the installed binaries.
    CleanupFull,
}

impl Step {
    fn run(self, payload: WorkerPayload) -> Result<()> {
        let settings = payload
            .settings
            .into_settings()
            .map_err(|error| Report::new(error).wrap_err("rebuild postgres settings"))?;
        for (key, value) in &payload.environment {
            // SAFETY: the process is still single-threaded; any runtime is
            // built afterwards.
            match value {
                Some(secret) => unsafe { env::set_var(key, secret.expose()) },
                None => unsafe { env::remove_var(key) },
            }
        }

        match self {
            Self::Cleanup => remove_tree(&settings.data_dir),
            Self::CleanupFull => {
                remove_tree(&settings.data_dir)?;
                remove_tree(&settings.installation_dir)
            }
            Self::Setup | Self::Start | Self::Stop => self.drive(settings),
        }
    }

    fn drive(self, settings: Settings) -> Result<()> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .wrap_err("create pg_worker runtime")?;
        let data_dir = settings.data_dir.clone();
        let mut postgres = PostgreSQL::new(settings);

        runtime.block_on(async {
            match self {
                Self::Setup => ensure_setup(&mut postgres, &data_dir).await,
                Self::Start => {
                    ensure_setup(&mut postgres, &data_dir).await?;
                    if postgres.status() != Status::Started {
                        postgres.start().await.wrap_err("embedded postgres start")?;
                    }
                    Ok(())
                }
                Self::Stop => match postgres.stop().await {
                    Err(error) if is_already_stopped(&error) => Ok(()),
                    other => other.wrap_err("embedded postgres stop"),
                },
                Self::Cleanup | Self::CleanupFull => Ok(()),
            }
        })?;

        if self == Self::Start {
            // Dropping the handle would stop the server this step started.
            std::mem::forget(postgres);
        }
        Ok(())
    }
}

async fn ensure_setup(postgres: &mut PostgreSQL, data_dir: &Path) -> Result<()> {
    if postgres.status() != Status::NotInstalled && data_dir.join("PG_VERSION").exists() {
        return Ok(());
    }
    // A half-initialised data directory makes initdb refuse to run.
    if data_dir.exists() && !data_dir.join(INITIALISED_MARKER).exists() {
        remove_tree(data_dir)?;
    }
    postgres.setup().await.wrap_err("embedded postgres setup")
}

fn is_already_stopped(error: &postgresql_embedded::Error) -> bool {
    let message = error.to_string();
    message.contains("postmaster.pid") && message.contains("does not exist")
}

impl FromStr for Step {
    type Err = Report;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "setup" => Ok(Self::Setup),
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "cleanup" => Ok(Self::Cleanup),
            "cleanup-full" => Ok(Self::CleanupFull),
            other => Err(eyre!(
                "unknown pg_worker step '{other}' (expected setup, start, stop, cleanup or cleanup-full)"
            )),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Setup => "setup",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Cleanup => "cleanup",
            Self::CleanupFull => "cleanup-full",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn args(raw: &[&str]) -> Vec<OsString> {
        raw.iter().map(OsString::from).collect()
    }

    #[rstest]
    #[case("setup", Step::Setup)]
    #[case("start", Step::Start)]
    #[case("stop", Step::Stop)]
    #[case("cleanup", Step::Cleanup)]
    #[case("cleanup-full", Step::CleanupFull)]
    fn every_lifecycle_step_parses(#[case] raw: &str, #[case] step: Step) {
        let invocation = Invocation::from_args(args(&["pg_worker", raw, "/tmp/payload.json"]))
            .expect("valid invocation");

        assert_eq!(step.to_string(), raw);
        assert_eq!(
            invocation,
            Invocation {
                step,
                payload_path: PathBuf::from("/tmp/payload.json"),
            }
        );
    }

    #[rstest]
    #[case(&["pg_worker"], "usage: pg_worker")]
    #[case(&["pg_worker", "restart", "/tmp/p.json"], "unknown pg_worker step 'restart'")]
    #[case(&["pg_worker", "start"], "payload path is required")]
    #[case(&["pg_worker", "stop", "/tmp/p.json", "again"], "unexpected argument again")]
    fn malformed_invocations_are_rejected(#[case] raw: &[&str], #[case] message: &str) {
        let error = Invocation::from_args(args(raw)).expect_err("invalid invocation");

        assert!(error.to_string().contains(message), "{error}");
    }

    #[rstest]
    fn unreadable_payloads_name_the_path() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("payload.json");
        std::fs::write(&path, b"{ not json").expect("write payload");

        let error = read_payload(&path).expect_err("invalid json");

        assert!(error.to_string().contains("payload.json"), "{error}");
    }

    #[rstest]
    fn removing_a_tree_tolerates_missing_paths() {
        let dir = tempfile::tempdir().expect("temp dir");
        let data = dir.path().join("data");
        std::fs::create_dir_all(data.join("global")).expect("data dir");
        std::fs::write(data.join("PG_VERSION"), b"16").expect("marker");

        remove_tree(&data).expect("remove existing tree");
        remove_tree(&data).expect("remove again");
        remove_tree(&dir.path().join("missing/child")).expect("missing parent");

        assert!(!data.exists());
    }
}
