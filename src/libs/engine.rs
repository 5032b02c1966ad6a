use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// The closed set of tree-search backends. Selection is by tag string at
/// construction time; every variant honors the same create/configure/run/
/// cleanup contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Raxml,
    Examl,
    Exabayes,
    Phyml,
}

pub const ENGINE_TAGS: [&str; 4] = ["raxml", "examl", "exabayes", "phyml"];

impl EngineKind {
    pub fn from_tag(tag: &str) -> anyhow::Result<EngineKind> {
        match tag.to_ascii_lowercase().as_str() {
            "raxml" => Ok(EngineKind::Raxml),
            "examl" => Ok(EngineKind::Examl),
            "exabayes" => Ok(EngineKind::Exabayes),
            "phyml" => Ok(EngineKind::Phyml),
            _ => Err(anyhow::anyhow!(
                "Unknown inference tool {}. Valid tags: {}",
                tag,
                ENGINE_TAGS.join("|")
            )),
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            EngineKind::Raxml => "raxml",
            EngineKind::Examl => "examl",
            EngineKind::Exabayes => "exabayes",
            EngineKind::Phyml => "phyml",
        }
    }

    /// Sampling-based methods already produce a posterior sample, so
    /// post-hoc bootstrap resampling is meaningless for them.
    pub fn is_bayesian(&self) -> bool {
        matches!(self, EngineKind::Exabayes)
    }

    /// Executable names to probe on PATH, in order of preference.
    fn executables(&self) -> &'static [&'static str] {
        match self {
            EngineKind::Raxml => &[
                "raxmlHPC-PTHREADS-SSE3",
                "raxmlHPC-PTHREADS",
                "raxmlHPC",
                "raxml",
            ],
            EngineKind::Examl => &["examl", "examl-AVX"],
            EngineKind::Exabayes => &["exabayes", "yggdrasil"],
            EngineKind::Phyml => &["phyml"],
        }
    }
}

/// Numeric knobs shared by all engine variants. Which ones a given backend
/// consumes depends on the variant; the seed is threaded into every
/// invocation that accepts one, for reproducibility.
#[derive(Debug, Clone)]
pub struct EngineConf {
    pub model: String,
    pub generations: usize,
    pub sample_freq: usize,
    pub log_freq: usize,
    pub threads: usize,
    pub seed: u64,
}

impl Default for EngineConf {
    fn default() -> Self {
        Self {
            model: "GTRGAMMA".to_string(),
            generations: 100_000,
            sample_freq: 100,
            log_freq: 1000,
            threads: 1,
            seed: 42,
        }
    }
}

#[derive(Debug)]
pub enum InferError {
    MissingExecutable {
        tag: &'static str,
        candidates: Vec<&'static str>,
    },
    LaunchFailed {
        program: String,
        message: String,
    },
    Failed {
        program: String,
        status: Option<i32>,
    },
    MissingOutput {
        program: String,
        path: PathBuf,
    },
}

impl fmt::Display for InferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferError::MissingExecutable { tag, candidates } => write!(
                f,
                "No executable found for {} (tried: {})",
                tag,
                candidates.join(", ")
            ),
            InferError::LaunchFailed { program, message } => {
                write!(f, "Could not launch {}: {}", program, message)
            }
            InferError::Failed { program, status } => match status {
                Some(code) => write!(f, "{} exited with status {}", program, code),
                None => write!(f, "{} was terminated by a signal", program),
            },
            InferError::MissingOutput { program, path } => write!(
                f,
                "{} exited successfully but produced no output at {}",
                program,
                path.display()
            ),
        }
    }
}

impl std::error::Error for InferError {}

/// A configured engine bound to a scratch directory. `run` may be invoked
/// multiple times with distinct run ids (replicate indices); each writes
/// to its own output namespace so replicates can run concurrently.
#[derive(Debug)]
pub struct Engine {
    pub kind: EngineKind,
    pub conf: EngineConf,
    workdir: PathBuf,
}

impl Engine {
    /// Locate the backend executable and set up scratch space.
    pub fn create(kind: EngineKind, conf: EngineConf, workdir: &Path) -> anyhow::Result<Engine> {
        std::fs::create_dir_all(workdir)?;
        let engine = Engine {
            kind,
            conf,
            // Engines run inside the scratch dir; paths must stay valid there
            workdir: std::fs::canonicalize(workdir)?,
        };
        engine.find_executable()?;
        Ok(engine)
    }

    fn find_executable(&self) -> Result<PathBuf, InferError> {
        for candidate in self.kind.executables() {
            if let Ok(path) = which::which(candidate) {
                return Ok(path);
            }
        }
        Err(InferError::MissingExecutable {
            tag: self.kind.tag(),
            candidates: self.kind.executables().to_vec(),
        })
    }

    /// Run one tree search. Returns the path of the produced tree file, or
    /// fails carrying the backend's exit status. Never returns a path to a
    /// missing or empty file.
    pub fn run(
        &self,
        matrix: &Path,
        starting_tree: Option<&Path>,
        run_id: &str,
    ) -> Result<PathBuf, InferError> {
        let exe = self.find_executable()?;

        let matrix = std::fs::canonicalize(matrix).unwrap_or_else(|_| matrix.to_path_buf());
        let starting_tree = starting_tree
            .map(|t| std::fs::canonicalize(t).unwrap_or_else(|_| t.to_path_buf()));
        let starting_tree = starting_tree.as_deref();

        let output = match self.kind {
            EngineKind::Raxml => self.run_raxml(&exe, &matrix, starting_tree, run_id)?,
            EngineKind::Examl => self.run_examl(&exe, &matrix, starting_tree, run_id)?,
            EngineKind::Exabayes => self.run_exabayes(&exe, &matrix, run_id)?,
            EngineKind::Phyml => self.run_phyml(&exe, &matrix, run_id)?,
        };

        let ok = std::fs::metadata(&output).map(|m| m.len() > 0).unwrap_or(false);
        if !ok {
            return Err(InferError::MissingOutput {
                program: exe.display().to_string(),
                path: output,
            });
        }

        Ok(output)
    }

    /// Remove the scratch directory, success or failure. Callers copy the
    /// tree they want to keep before cleaning up.
    pub fn cleanup(&self) {
        if let Err(e) = std::fs::remove_dir_all(&self.workdir) {
            eprintln!(
                "Warning: could not remove scratch dir {}: {}",
                self.workdir.display(),
                e
            );
        }
    }

    fn invoke(&self, program: &Path, args: &[String]) -> Result<(), InferError> {
        let status = Command::new(program)
            .args(args)
            .current_dir(&self.workdir)
            .status()
            .map_err(|e| InferError::LaunchFailed {
                program: program.display().to_string(),
                message: e.to_string(),
            })?;

        if !status.success() {
            return Err(InferError::Failed {
                program: program.display().to_string(),
                status: status.code(),
            });
        }
        Ok(())
    }

    fn run_raxml(
        &self,
        exe: &Path,
        matrix: &Path,
        starting_tree: Option<&Path>,
        run_id: &str,
    ) -> Result<PathBuf, InferError> {
        let mut args = vec![
            "-s".to_string(),
            matrix.display().to_string(),
            "-n".to_string(),
            run_id.to_string(),
            "-m".to_string(),
            self.conf.model.clone(),
            "-p".to_string(),
            self.conf.seed.to_string(),
            "-w".to_string(),
            self.workdir.display().to_string(),
        ];
        if self.conf.threads > 1 {
            args.push("-T".to_string());
            args.push(self.conf.threads.to_string());
        }
        if let Some(tree) = starting_tree {
            args.push("-t".to_string());
            args.push(tree.display().to_string());
        }

        self.invoke(exe, &args)?;
        Ok(self.workdir.join(format!("RAxML_bestTree.{}", run_id)))
    }

    fn run_examl(
        &self,
        exe: &Path,
        matrix: &Path,
        starting_tree: Option<&Path>,
        run_id: &str,
    ) -> Result<PathBuf, InferError> {
        let starting_tree = starting_tree.ok_or_else(|| InferError::LaunchFailed {
            program: exe.display().to_string(),
            message: "examl requires a starting tree".to_string(),
        })?;

        // Binary conversion step first
        let parser = which::which("parse-examl").map_err(|_| InferError::MissingExecutable {
            tag: "examl",
            candidates: vec!["parse-examl"],
        })?;

        let binary_name = format!("{}.binary", run_id);
        self.invoke(
            &parser,
            &[
                "-s".to_string(),
                matrix.display().to_string(),
                "-n".to_string(),
                run_id.to_string(),
                "-m".to_string(),
                "DNA".to_string(),
            ],
        )?;

        self.invoke(
            exe,
            &[
                "-s".to_string(),
                self.workdir.join(binary_name).display().to_string(),
                "-t".to_string(),
                starting_tree.display().to_string(),
                "-n".to_string(),
                run_id.to_string(),
                "-m".to_string(),
                "GAMMA".to_string(),
            ],
        )?;
        Ok(self.workdir.join(format!("ExaML_result.{}", run_id)))
    }

    fn run_exabayes(&self, exe: &Path, matrix: &Path, run_id: &str) -> Result<PathBuf, InferError> {
        // MCMC parameters go through a generated config block
        let config = self.workdir.join(format!("{}.config.nex", run_id));
        let content = format!(
            "#NEXUS\nbegin run;\n numRuns 1\n numGen {}\n samplingFreq {}\n diagFreq {}\nend;\n",
            self.conf.generations, self.conf.sample_freq, self.conf.log_freq
        );
        std::fs::write(&config, content).map_err(|e| InferError::LaunchFailed {
            program: exe.display().to_string(),
            message: e.to_string(),
        })?;

        self.invoke(
            exe,
            &[
                "-f".to_string(),
                matrix.display().to_string(),
                "-n".to_string(),
                run_id.to_string(),
                "-s".to_string(),
                self.conf.seed.to_string(),
                "-c".to_string(),
                config.display().to_string(),
                "-w".to_string(),
                self.workdir.display().to_string(),
            ],
        )?;
        Ok(self
            .workdir
            .join(format!("ExaBayes_topologies.{}.0", run_id)))
    }

    fn run_phyml(&self, exe: &Path, matrix: &Path, run_id: &str) -> Result<PathBuf, InferError> {
        // phyml writes next to its input, so work on a scratch copy
        let copy = self.workdir.join(format!("{}.phy", run_id));
        std::fs::copy(matrix, &copy).map_err(|e| InferError::LaunchFailed {
            program: exe.display().to_string(),
            message: e.to_string(),
        })?;

        self.invoke(
            exe,
            &[
                "--input".to_string(),
                copy.display().to_string(),
                "--datatype".to_string(),
                "nt".to_string(),
                "--model".to_string(),
                "GTR".to_string(),
                "-b".to_string(),
                "0".to_string(),
                "--r_seed".to_string(),
                self.conf.seed.to_string(),
                "--no_memory_check".to_string(),
            ],
        )?;
        Ok(self.workdir.join(format!("{}.phy_phyml_tree.txt", run_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_dispatch() {
        assert_eq!(EngineKind::from_tag("RAxML").unwrap(), EngineKind::Raxml);
        assert_eq!(
            EngineKind::from_tag("exabayes").unwrap(),
            EngineKind::Exabayes
        );

        let err = EngineKind::from_tag("iqtree").unwrap_err();
        assert!(err.to_string().contains("raxml|examl|exabayes|phyml"));
    }

    #[test]
    fn bayesian_flag() {
        assert!(EngineKind::Exabayes.is_bayesian());
        assert!(!EngineKind::Raxml.is_bayesian());
        assert!(!EngineKind::Phyml.is_bayesian());
    }

    #[test]
    fn error_messages() {
        let err = InferError::MissingOutput {
            program: "raxml".to_string(),
            path: PathBuf::from("out/RAxML_bestTree.run0"),
        };
        assert!(err.to_string().contains("produced no output"));

        let err = InferError::Failed {
            program: "phyml".to_string(),
            status: Some(134),
        };
        assert!(err.to_string().contains("134"));
    }
}
