//! Reading objects out of a local git repository

use std::{
    cell::RefCell,
    io::{BufRead, BufReader, Read, Write},
    path::{Path, PathBuf},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
};

use anyhow::{Context, Result};

use super::{
    canonical::{parse_kind, CanonicalForm},
    objects::{ObjectId, RawObject},
};
use crate::storage::ObjectSource;

/// Reads loose objects straight from `<git-dir>/objects/ab/cdef...`.
///
/// Packed objects are not visible to this source; use [`CatFileSource`]
/// for repositories that have been gc'd or cloned.
pub struct LooseObjectSource {
    objects_dir: PathBuf,
}

impl LooseObjectSource {
    pub fn new<P: AsRef<Path>>(git_dir: P) -> Self {
        Self {
            objects_dir: git_dir.as_ref().join("objects"),
        }
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        let (dir, file) = hex.split_at(2);
        self.objects_dir.join(dir).join(file)
    }
}

impl ObjectSource for LooseObjectSource {
    fn read(&self, id: &ObjectId) -> Result<RawObject> {
        let path = self.object_path(id);
        // Loose objects are zlib compressed canonical forms
        let file = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open object file: {}", path.display()))?;
        let mut decoder = flate2::read::ZlibDecoder::new(file);
        let mut content = Vec::new();
        decoder
            .read_to_end(&mut content)
            .with_context(|| format!("Failed to decompress object {}", id))?;

        let form = CanonicalForm::from_bytes(content)
            .with_context(|| format!("Failed to parse loose object {}", id))?;
        Ok(form.to_raw())
    }
}

/// Reads objects through one long-lived `git cat-file --batch` process, so
/// packed objects work too.
pub struct CatFileSource {
    git_dir: PathBuf,
    child: Child,
    io: RefCell<BatchIo>,
}

struct BatchIo {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl CatFileSource {
    /// Start `git cat-file --batch` against `git_dir`
    pub fn open<P: AsRef<Path>>(git_dir: P) -> Result<Self> {
        let git_dir = git_dir.as_ref().to_path_buf();
        let mut child = Command::new("git")
            .arg("--git-dir")
            .arg(&git_dir)
            .arg("cat-file")
            .arg("--batch")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .context("Failed to spawn git cat-file --batch")?;

        let stdin = child
            .stdin
            .take()
            .context("git cat-file stdin was not captured")?;
        let stdout = child
            .stdout
            .take()
            .context("git cat-file stdout was not captured")?;

        tracing::debug!("Started git cat-file --batch for {:?}", git_dir);

        Ok(Self {
            git_dir,
            child,
            io: RefCell::new(BatchIo {
                stdin,
                stdout: BufReader::new(stdout),
            }),
        })
    }
}

impl ObjectSource for CatFileSource {
    fn read(&self, id: &ObjectId) -> Result<RawObject> {
        let mut io = self.io.borrow_mut();
        let BatchIo { stdin, stdout } = &mut *io;

        writeln!(stdin, "{}", id).context("Failed to write to git cat-file")?;
        stdin.flush().context("Failed to flush git cat-file stdin")?;

        // "<id> <type> <size>" or "<id> missing"
        let mut header = String::new();
        let read = stdout
            .read_line(&mut header)
            .context("Failed to read git cat-file header")?;
        if read == 0 {
            anyhow::bail!("git cat-file exited unexpectedly while reading {}", id);
        }

        let parts: Vec<&str> = header.split_whitespace().collect();
        match parts.as_slice() {
            [_, "missing"] => anyhow::bail!("Object {} not found in {:?}", id, self.git_dir),
            [_, kind, size] => {
                let kind = parse_kind(kind.as_bytes())?;
                let size: u64 = size
                    .parse()
                    .with_context(|| format!("Invalid object size in {:?}", header.trim()))?;

                let mut data = vec![0u8; size as usize];
                stdout
                    .read_exact(&mut data)
                    .with_context(|| format!("Failed to read {} bytes of {}", size, id))?;

                // Each object is followed by a newline
                let mut newline = [0u8; 1];
                stdout
                    .read_exact(&mut newline)
                    .context("Failed to read git cat-file object terminator")?;

                Ok(RawObject { kind, size, data })
            }
            _ => anyhow::bail!("Unexpected git cat-file header: {:?}", header.trim()),
        }
    }
}

impl Drop for CatFileSource {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
