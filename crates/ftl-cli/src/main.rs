//! `ftl`: the interactive/script front end for the core library.
//!
//! Argument parsing is hand-rolled against `std::env::args()`, matching the
//! rest of this stack's front ends rather than reaching for an argument
//! parsing crate.

use std::env;
use std::fs;
use std::io;
use std::process::ExitCode;

use ftl::{Limits, ReadSource, Runtime};

const USAGE: &str = "\
usage: ftl [options] [file ...] [-- args...]
  -c CMDS        evaluate CMDS before reading any file or stdin
  -f FILE        read and evaluate FILE (same as naming it positionally)
  -r SEED        seed the runtime's random number generator
  -e, --echo     echo top-level results (default when reading a terminal)
  -ne, --noecho  do not echo top-level results
  -q, --quiet    suppress echoing and rc-file loading
  -h, --help     print this message and exit
  --             end option parsing; remaining args are the script's argv";

struct Options {
    cmds: Vec<String>,
    files: Vec<String>,
    seed: Option<u64>,
    echo: Option<bool>,
    quiet: bool,
    script_args: Vec<String>,
}

enum ParseOutcome {
    Run(Options),
    Help,
}

fn parse_args(argv: &[String]) -> Result<ParseOutcome, String> {
    let mut opts =
        Options { cmds: Vec::new(), files: Vec::new(), seed: None, echo: None, quiet: false, script_args: Vec::new() };
    let mut i = 0;
    while i < argv.len() {
        match argv[i].as_str() {
            "-h" | "--help" => return Ok(ParseOutcome::Help),
            "-c" => {
                i += 1;
                let v = argv.get(i).ok_or("-c requires an argument")?;
                opts.cmds.push(v.clone());
            }
            "-f" => {
                i += 1;
                let v = argv.get(i).ok_or("-f requires an argument")?;
                opts.files.push(v.clone());
            }
            "-r" => {
                i += 1;
                let v = argv.get(i).ok_or("-r requires an argument")?;
                opts.seed = Some(v.parse::<u64>().map_err(|_| format!("-r: not a valid seed: {v}"))?);
            }
            "-e" | "--echo" => opts.echo = Some(true),
            "-ne" | "--noecho" => opts.echo = Some(false),
            "-q" | "--quiet" => opts.quiet = true,
            "--" => {
                opts.script_args = argv[i + 1..].to_vec();
                i = argv.len();
                continue;
            }
            arg if arg.starts_with('-') && arg.len() > 1 => {
                return Err(format!("unknown option: {arg}"));
            }
            other => opts.files.push(other.to_string()),
        }
        i += 1;
    }
    Ok(ParseOutcome::Run(opts))
}

/// Locates an rc file named `{name}rc` on the colon-separated `FTL_PATH`
/// directories, falling back to the current directory.
fn find_rc_file(name: &str) -> Option<String> {
    let filename = format!("{name}rc");
    let path_var = env::var("FTL_PATH").unwrap_or_default();
    let mut dirs: Vec<&str> = path_var.split(':').filter(|s| !s.is_empty()).collect();
    dirs.push(".");
    for dir in dirs {
        let candidate = format!("{dir}/{filename}");
        if fs::metadata(&candidate).is_ok() {
            return Some(candidate);
        }
    }
    None
}

fn main() -> ExitCode {
    let argv: Vec<String> = env::args().skip(1).collect();
    let opts = match parse_args(&argv) {
        Ok(ParseOutcome::Run(opts)) => opts,
        Ok(ParseOutcome::Help) => {
            println!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(msg) => {
            eprintln!("ftl: {msg}");
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    let limits = Limits::default();
    let mut rt = match opts.seed {
        Some(seed) => Runtime::with_seed(limits, seed),
        None => Runtime::new(limits),
    };
    let co_id = rt.spawn_coroutine();

    let interactive = opts.cmds.is_empty() && opts.files.is_empty();
    let echo = opts.echo.unwrap_or(interactive) && !opts.quiet;
    rt.coroutine_mut(co_id).set_echo(echo);

    let argv_value = rt.make_string_vector(co_id, &opts.script_args);
    rt.bind_global("argv", argv_value);

    // The underlying source stack is LIFO (`next_line` reads the most
    // recently pushed level first, falling through to earlier ones once
    // exhausted), so levels are pushed in the REVERSE of their intended
    // read order: stdin at the bottom, the rc file on top.
    if interactive {
        rt.coroutine_mut(co_id).push_source(Box::new(ReadSource::new(io::stdin())), "<stdin>");
    }

    for file in opts.files.iter().rev() {
        match fs::read_to_string(file) {
            Ok(text) => rt.coroutine_mut(co_id).push_string(text, file.clone()),
            Err(e) => {
                eprintln!("ftl: cannot read {file}: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    for cmd in opts.cmds.iter().rev() {
        rt.coroutine_mut(co_id).push_string(cmd.clone(), "<-c>");
    }

    if !opts.quiet {
        if let Some(path) = find_rc_file("ftl") {
            match fs::read_to_string(&path) {
                Ok(text) => rt.coroutine_mut(co_id).push_string(text, path),
                Err(e) => eprintln!("ftl: warning: could not read {path}: {e}"),
            }
        }
    }

    let mut had_error = false;
    loop {
        let Some(line) = rt.coroutine_mut(co_id).next_line() else { break };
        match rt.eval_line(co_id, &line) {
            Ok(v) => {
                if rt.coroutine_mut(co_id).echo() {
                    println!("{}", rt.print_value(v));
                }
            }
            Err(e) => {
                rt.coroutine_mut(co_id).echo_sink_mut().write_diagnostic(&format!("ftl: {e}"));
                had_error = true;
            }
        }
    }

    if had_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
