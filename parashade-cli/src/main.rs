use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use parashade_core::{codegen_nasm, compiler, meta};

/// Parashade compiler and VM. Source is read from standard input.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(long, help = "Execute on the bytecode VM and print the integer result")]
    run: bool,

    #[arg(long, help = "Print the hex IR dump and metadata JSON")]
    emit: bool,

    #[arg(
        long,
        value_name = "OUTDIR",
        help = "Write NASM assembly and a Windows build script to OUTDIR"
    )]
    emit_nasm: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Run,
    Emit,
    EmitNasm(PathBuf),
}

impl Cli {
    /// Modes are mutually exclusive; the first one wins.
    fn mode(self) -> Option<Mode> {
        if self.run {
            Some(Mode::Run)
        } else if self.emit {
            Some(Mode::Emit)
        } else {
            self.emit_nasm.map(Mode::EmitNasm)
        }
    }
}

fn main() -> ExitCode {
    let Some(mode) = Cli::parse().mode() else {
        eprintln!("Usage: --run | --emit | --emit-nasm <outdir> (reads source from stdin)");
        return ExitCode::from(1);
    };

    let mut source = String::new();
    if let Err(error) = io::stdin().read_to_string(&mut source) {
        eprintln!("Compile/Run error: {error}");
        return ExitCode::from(2);
    }

    match execute(&mode, &source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Compile/Run error: {error:#}");
            ExitCode::from(2)
        }
    }
}

fn execute(mode: &Mode, source: &str) -> Result<()> {
    match mode {
        Mode::Run => {
            let result = compiler::run(source)?;
            println!("{result}");
        }
        Mode::Emit => {
            let artifact = compiler::compile(source)?;
            print!("{}", meta::emit_report(&artifact));
        }
        Mode::EmitNasm(outdir) => {
            let artifact = compiler::compile(source)?;
            let asm = codegen_nasm::emit_nasm(&artifact.code, artifact.locals.len());
            write_nasm_outputs(outdir, &asm)?;
            println!(
                "Wrote {}/parashade_main.asm and build.bat",
                outdir.display()
            );
        }
    }
    Ok(())
}

fn write_nasm_outputs(outdir: &Path, asm: &str) -> Result<()> {
    fs::create_dir_all(outdir)
        .with_context(|| format!("failed to create directory {outdir:?}"))?;
    let asm_path = outdir.join("parashade_main.asm");
    fs::write(&asm_path, asm).with_context(|| format!("failed to write {asm_path:?}"))?;
    let bat_path = outdir.join("build.bat");
    fs::write(&bat_path, BUILD_BAT).with_context(|| format!("failed to write {bat_path:?}"))?;
    Ok(())
}

const BUILD_BAT: &str = r#"REM Build PE from NASM with MSVC LINK
@echo off
setlocal
if "%VSCMD_ARG_TGT_ARCH%"=="" (
  echo (Tip) Run from "x64 Native Tools Command Prompt for VS" so link.exe is on PATH.
)
if "%1"=="" ( set OUT=parashade.exe ) else ( set OUT=%1 )
echo Assembling...
nasm -f win64 parashade_main.asm -o parashade_main.obj || exit /b 1
echo Linking...
link /subsystem:console /entry:main parashade_main.obj kernel32.lib /out:%OUT% || exit /b 1
echo Done: %OUT%
"#;
