//! Toolchain backed by child processes

use super::{Execution, Toolchain, OBJECT_EXTENSION};
use crate::classify::Mode;
use crate::config::HarnessConfig;
use crate::error::{Error, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::Instant;
use tracing::{debug, info};

/// Variables through which test binaries find the support libraries
const LIBRARY_PATH_VARS: [&str; 2] = ["LD_LIBRARY_PATH", "DYLD_LIBRARY_PATH"];

/// Exit status of a finished child; signal deaths map to the negated signal
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

/// Ask pkg-config for `flag` (`--cflags` or `--libs`) of `packages`
fn pkg_config(flag: &str, packages: &[String]) -> Result<Vec<String>> {
    if packages.is_empty() {
        return Ok(Vec::new());
    }
    let joined = packages.join(" ");
    let output = Command::new("pkg-config")
        .arg(flag)
        .args(packages)
        .output()
        .map_err(|e| Error::spawn("pkg-config", e))?;
    if !output.status.success() {
        return Err(Error::PkgConfig {
            packages: joined,
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout)
        .split_whitespace()
        .map(str::to_string)
        .collect())
}

/// Runs the real front-end, compiler and test binaries
#[derive(Debug, Clone)]
pub struct ProcessToolchain {
    frontend: PathBuf,
    evaluator: PathBuf,
    compiler: PathBuf,
    compile_args: Vec<OsString>,
    link_args: Vec<OsString>,
    harness_main: Option<PathBuf>,
    library_env: Vec<(&'static str, OsString)>,
}

impl ProcessToolchain {
    /// Build the toolchain for `mode`, checking that the tools it needs exist
    pub fn from_config(config: &HarnessConfig, mode: Mode) -> Result<Self> {
        let frontend = config.resolve(&config.frontend);
        let evaluator = config.resolve(&config.evaluator);
        let library_dirs: Vec<PathBuf> =
            config.library_dirs.iter().map(|d| config.resolve(d)).collect();

        let mut toolchain = Self {
            frontend,
            evaluator,
            compiler: config.compiler.clone(),
            compile_args: Vec::new(),
            link_args: Vec::new(),
            harness_main: None,
            library_env: library_env(&library_dirs)?,
        };

        match mode {
            Mode::Evaluate => {
                if !toolchain.evaluator.is_file() {
                    return Err(Error::ToolMissing {
                        tool: "evaluator",
                        path: toolchain.evaluator,
                    });
                }
            }
            Mode::CompileAndRun => {
                if !toolchain.frontend.is_file() {
                    return Err(Error::ToolMissing {
                        tool: "front-end",
                        path: toolchain.frontend,
                    });
                }
                toolchain.compile_args = compile_args(config)?;
                toolchain.link_args = link_args(config, &library_dirs)?;
                toolchain.harness_main = config.harness_main.as_ref().map(|p| config.resolve(p));
            }
        }

        Ok(toolchain)
    }

    fn harness_object(&self) -> Option<PathBuf> {
        self.harness_main
            .as_ref()
            .map(|main| main.with_extension(OBJECT_EXTENSION))
    }

    /// Compile the harness entry point shared by every test binary
    pub fn prepare(&self) -> Result<()> {
        let (Some(main), Some(object)) = (self.harness_main.as_ref(), self.harness_object()) else {
            return Ok(());
        };
        info!(source = %main.display(), "compiling harness entry point");
        let mut cmd = self.command(&self.compiler, true);
        cmd.args(&self.compile_args).arg(main).arg("-o").arg(&object);
        let status = self.status(&mut cmd, &self.compiler)?;
        if status != 0 {
            return Err(Error::HarnessBuild {
                source_path: main.clone(),
                status,
            });
        }
        Ok(())
    }

    fn command(&self, program: &Path, verbose: bool) -> Command {
        let mut cmd = Command::new(program);
        for (var, value) in &self.library_env {
            cmd.env(var, value);
        }
        if !verbose {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        cmd
    }

    fn status(&self, cmd: &mut Command, program: &Path) -> Result<i32> {
        debug!(command = ?cmd, "spawning");
        cmd.status()
            .map(exit_code)
            .map_err(|e| Error::spawn(program.display().to_string(), e))
    }
}

/// Library search variables with the configured directories prepended
fn library_env(dirs: &[PathBuf]) -> Result<Vec<(&'static str, OsString)>> {
    LIBRARY_PATH_VARS
        .iter()
        .map(|var| {
            let inherited = std::env::var_os(var);
            let paths = dirs
                .iter()
                .cloned()
                .chain(inherited.iter().flat_map(std::env::split_paths));
            let joined = std::env::join_paths(paths).map_err(|e| {
                Error::io(
                    var.to_string(),
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
                )
            })?;
            Ok((*var, joined))
        })
        .collect()
}

fn compile_args(config: &HarnessConfig) -> Result<Vec<OsString>> {
    let mut args: Vec<OsString> = vec![config.std_flag.clone().into()];
    args.extend(config.compile_flags.iter().map(OsString::from));
    for dir in &config.include_paths {
        let mut flag = OsString::from("-I");
        flag.push(config.resolve(dir));
        args.push(flag);
    }
    if let Some(define) = HarnessConfig::platform_define() {
        args.push(define.into());
    }
    args.extend(
        pkg_config("--cflags", &config.pkg_config_packages)?
            .into_iter()
            .map(OsString::from),
    );
    args.push("-c".into());
    Ok(args)
}

fn link_args(config: &HarnessConfig, library_dirs: &[PathBuf]) -> Result<Vec<OsString>> {
    let mut args = Vec::new();
    for dir in library_dirs {
        let mut flag = OsString::from("-L");
        flag.push(dir);
        args.push(flag);
    }
    args.extend(config.libraries.iter().map(|lib| OsString::from(format!("-l{}", lib))));
    args.extend(
        pkg_config("--libs", &config.pkg_config_packages)?
            .into_iter()
            .map(OsString::from),
    );
    Ok(args)
}

impl Toolchain for ProcessToolchain {
    fn translate(&self, source: &Path, unit: &Path, verbose: bool) -> Result<i32> {
        let mut cmd = self.command(&self.frontend, verbose);
        cmd.arg(source).arg("-o").arg(unit);
        self.status(&mut cmd, &self.frontend)
    }

    fn compile(&self, unit: &Path, object: &Path, verbose: bool) -> Result<i32> {
        let mut cmd = self.command(&self.compiler, verbose);
        cmd.args(&self.compile_args).arg(unit).arg("-o").arg(object);
        self.status(&mut cmd, &self.compiler)
    }

    fn link(&self, object: &Path, binary: &Path, verbose: bool) -> Result<i32> {
        let mut cmd = self.command(&self.compiler, verbose);
        if let Some(harness) = self.harness_object() {
            cmd.arg(harness);
        }
        cmd.arg(object).arg("-o").arg(binary).args(&self.link_args);
        self.status(&mut cmd, &self.compiler)
    }

    fn execute(&self, binary: &Path, verbose: bool) -> Result<Execution> {
        let mut cmd = self.command(binary, verbose);
        let start = Instant::now();
        let code = self.status(&mut cmd, binary)?;
        Ok(Execution {
            code,
            elapsed: start.elapsed(),
        })
    }

    fn evaluate(&self, source: &Path, verbose: bool) -> Result<i32> {
        let mut cmd = self.command(&self.evaluator, verbose);
        cmd.arg(source);
        self.status(&mut cmd, &self.evaluator)
    }
}
