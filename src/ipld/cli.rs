use std::{
    fmt,
    io::Write,
    path::PathBuf,
    process::{Command, Stdio},
    str::FromStr,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::address::ContentAddress;
use crate::{
    git::CanonicalForm,
    storage::{DagPutOptions, DagStore},
};

/// Which generation of the `ipfs` command line to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CliFlavor {
    /// Current kubo: `--input-codec` / `--store-codec` / `--hash`
    #[default]
    Kubo,
    /// go-ipfs before 0.10: `--input-enc` / `--format`
    Legacy,
}

impl FromStr for CliFlavor {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kubo" => Ok(CliFlavor::Kubo),
            "legacy" => Ok(CliFlavor::Legacy),
            other => anyhow::bail!("Unknown ipfs CLI flavor: {} (expected kubo or legacy)", other),
        }
    }
}

impl fmt::Display for CliFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliFlavor::Kubo => write!(f, "kubo"),
            CliFlavor::Legacy => write!(f, "legacy"),
        }
    }
}

/// DAG store backed by the `ipfs` command line
pub struct IpfsCli {
    binary: PathBuf,
    api: Option<String>,
    flavor: CliFlavor,
}

impl IpfsCli {
    pub fn new(binary: PathBuf, api: Option<String>, flavor: CliFlavor) -> Self {
        Self {
            binary,
            api,
            flavor,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        if let Some(api) = &self.api {
            cmd.arg("--api").arg(api);
        }
        cmd
    }

    /// Arguments after `dag put` for this flavor
    fn dag_put_args(&self, options: &DagPutOptions) -> Vec<String> {
        match self.flavor {
            CliFlavor::Kubo => {
                // kubo names the codec after the serialization: git + raw -> git-raw
                let codec = format!("{}-{}", options.codec, options.format);
                vec![
                    "--input-codec".to_string(),
                    codec.clone(),
                    "--store-codec".to_string(),
                    codec,
                    "--hash".to_string(),
                    "sha1".to_string(),
                ]
            }
            CliFlavor::Legacy => vec![
                "--input-enc".to_string(),
                options.format.to_string(),
                "--format".to_string(),
                options.codec.to_string(),
            ],
        }
    }
}

impl DagStore for IpfsCli {
    fn put(&self, form: &CanonicalForm, options: &DagPutOptions) -> Result<ContentAddress> {
        let mut cmd = self.command();
        cmd.arg("dag")
            .arg("put")
            .args(self.dag_put_args(options))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!("Running {:?} with {} bytes on stdin", cmd, form.len());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to execute {:?} dag put", self.binary))?;

        // Dropping stdin after the write closes the pipe. A child that exits
        // without reading fails the write; its stderr says why.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(form.as_bytes()),
            None => Ok(()),
        };

        let output = child
            .wait_with_output()
            .context("Failed to wait for ipfs dag put")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ipfs dag put failed ({}): {}", output.status, stderr.trim());
        }
        written.context("Failed to write object to ipfs dag put")?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let address: ContentAddress = stdout
            .trim()
            .parse()
            .with_context(|| format!("Failed to parse CID from ipfs output: {:?}", stdout))?;

        Ok(address)
    }
}
